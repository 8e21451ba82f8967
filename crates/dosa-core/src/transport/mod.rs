//! Packet transport.
//!
//! [`PacketTransport`] is the seam the monitor loop and playbook engine talk
//! to; [`Transport`] is the UDP multicast implementation.

pub mod udp;

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::error::Result;
use crate::protocol::{ack_body, encode, log_body, LogLevel, MessageCode, Packet};

pub use udp::{Transport, TransportConfig};

/// Multicast group every device listens on.
pub const MULTICAST_GROUP: Ipv4Addr = Ipv4Addr::new(239, 1, 1, 69);

/// Port used for both group and direct traffic.
pub const DOSA_PORT: u16 = 6901;

/// Multicast TTL / hop limit.
pub const MULTICAST_TTL: u32 = 32;

/// Granularity of the receive loop.
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How long to listen for an ack before resending.
pub const RETRY_INTERVAL: Duration = Duration::from_millis(100);

/// Default ack-wait budget.
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(3);

#[async_trait]
pub trait PacketTransport: Send + Sync {
    /// Name written into the header of every packet we build.
    fn device_name(&self) -> &str;

    /// Send raw bytes to a single address.
    async fn send(&self, payload: &[u8], target: SocketAddr) -> Result<()>;

    /// Send to the multicast group.
    async fn broadcast(&self, payload: &[u8]) -> Result<()>;

    /// Send and resend `payload` until a matching ack arrives or `timeout`
    /// elapses. Returns whether the ack was seen.
    async fn send_and_await_ack(
        &self,
        payload: &[u8],
        target: SocketAddr,
        timeout: Duration,
    ) -> Result<bool>;

    /// Wait up to `timeout` for a valid packet. `None` waits indefinitely.
    async fn receive(&self, timeout: Option<Duration>) -> Result<Option<Packet>>;

    fn build(&self, code: MessageCode, aux: &[u8]) -> Result<Vec<u8>> {
        Ok(encode(code, self.device_name(), aux)?)
    }

    async fn send_ack(&self, message_id: u16, target: SocketAddr) -> Result<()> {
        let payload = self.build(MessageCode::Ack, &ack_body(message_id))?;
        self.send(&payload, target).await
    }

    /// Broadcast a `log` packet.
    async fn net_log(&self, level: LogLevel, message: &str) -> Result<()> {
        let payload = self.build(MessageCode::Log, &log_body(level, message))?;
        self.broadcast(&payload).await
    }
}

/// Network log that never fails the caller.
pub async fn net_log_best_effort<T>(transport: &T, level: LogLevel, message: &str)
where
    T: PacketTransport + ?Sized,
{
    if let Err(e) = transport.net_log(level, message).await {
        warn!(error = %e, %level, text = message, "Failed to send network log");
    }
}
