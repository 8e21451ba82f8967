//! Typed view of the settings the security bot reads.

use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ConfigError;

use super::Settings;

pub const DEFAULT_HEARTBEAT: Duration = Duration::from_secs(15);
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_DEVICE_TIMEOUT: Duration = Duration::from_secs(60);

/// Host and port of an auxiliary UDP collector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub server: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(server: impl Into<String>, port: u16) -> Self {
        Self {
            server: server.into(),
            port,
        }
    }

    pub fn statsd_default() -> Self {
        Self::new("127.0.0.1", 8125)
    }

    pub fn log_server_default() -> Self {
        Self::new("127.0.0.1", 10518)
    }

    /// Resolve to the first address the host name maps to.
    pub fn resolve(&self) -> Result<SocketAddr, ConfigError> {
        let invalid = |message: String| ConfigError::InvalidEndpoint {
            endpoint: format!("{}:{}", self.server, self.port),
            message,
        };

        (self.server.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| invalid(e.to_string()))?
            .next()
            .ok_or_else(|| invalid("no addresses".to_string()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BotConfig {
    pub heartbeat: Duration,
    pub ping_interval: Duration,
    pub device_timeout: Duration,
    pub report_recovery: bool,
    pub statsd: Endpoint,
    pub log_server: Endpoint,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            heartbeat: DEFAULT_HEARTBEAT,
            ping_interval: DEFAULT_PING_INTERVAL,
            device_timeout: DEFAULT_DEVICE_TIMEOUT,
            report_recovery: true,
            statsd: Endpoint::statsd_default(),
            log_server: Endpoint::log_server_default(),
        }
    }
}

impl BotConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        let defaults = Self::default();

        Self {
            heartbeat: seconds(settings, &["general", "heartbeat"], defaults.heartbeat),
            ping_interval: seconds(settings, &["monitor", "ping"], defaults.ping_interval),
            device_timeout: seconds(settings, &["monitor", "device-timeout"], defaults.device_timeout),
            report_recovery: settings.get(&["monitor", "report-recovery"], defaults.report_recovery),
            statsd: settings.get(&["logging", "statsd"], defaults.statsd),
            log_server: settings.get(&["logging", "logs"], defaults.log_server),
        }
    }
}

/// Read a duration given in (possibly fractional) seconds.
fn seconds(settings: &Settings, path: &[&str], default: Duration) -> Duration {
    let secs: f64 = settings.get(path, default.as_secs_f64());
    Duration::try_from_secs_f64(secs).unwrap_or_else(|_| {
        warn!(key = %path.join("."), value = secs, "Invalid duration, using default");
        default
    })
}
