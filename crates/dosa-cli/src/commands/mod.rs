//! Command implementations.

pub mod monitor;
pub mod ping;
pub mod play;
pub mod secbot;
pub mod signal;

pub use monitor::run_monitor;
pub use ping::run_ping;
pub use play::run_play;
pub use secbot::run_secbot;
pub use signal::{run_flush, run_ota, run_trigger};

use std::net::{IpAddr, SocketAddr};

use dosa_core::transport::{Transport, TransportConfig, DOSA_PORT};

use crate::error::CliError;

/// Header name used by the one-shot tools.
pub const TOOLS_NAME: &str = "DOSA Network Tools";

/// Header name used by the security bot.
pub const SECBOT_NAME: &str = "DOSA Security Bot";

/// Bind a transport under `name`, or `default` when none was given.
pub async fn open_transport(name: Option<&str>, default: &str) -> Result<Transport, CliError> {
    let config = TransportConfig::new(name.unwrap_or(default));
    Ok(Transport::bind(config).await?)
}

/// Parse `ip` or `ip:port`; the port defaults to the DOSA port.
pub fn parse_target(target: &str) -> Result<SocketAddr, CliError> {
    if let Ok(addr) = target.parse::<SocketAddr>() {
        return Ok(addr);
    }

    target
        .parse::<IpAddr>()
        .map(|ip| SocketAddr::new(ip, DOSA_PORT))
        .map_err(|_| CliError::InvalidArgument(format!("Invalid device address: {}", target)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_target() {
        assert_eq!(
            parse_target("10.0.0.5").unwrap(),
            "10.0.0.5:6901".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(
            parse_target("10.0.0.5:7000").unwrap(),
            "10.0.0.5:7000".parse::<SocketAddr>().unwrap()
        );
        assert!(matches!(
            parse_target("gate"),
            Err(CliError::InvalidArgument(_))
        ));
    }
}
