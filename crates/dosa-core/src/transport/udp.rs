//! UDP multicast transport.
//!
//! Two sockets: one joined to the multicast group (held for its membership)
//! and one bound to the DOSA port on all interfaces, used for every send and
//! for receiving both group and direct traffic.

use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use async_trait::async_trait;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};

use crate::error::{MalformedPacket, Result};
use crate::protocol::{decode, message_id_of, validate_device_name, MessageCode, Packet, HEADER_SIZE};

use super::{PacketTransport, DOSA_PORT, MULTICAST_GROUP, MULTICAST_TTL, POLL_INTERVAL, RETRY_INTERVAL};

/// Largest datagram accepted.
const MAX_DATAGRAM: usize = 10240;

/// Socket layout for a [`Transport`].
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Name stamped into outgoing headers (at most 20 bytes).
    pub device_name: String,
    /// Address of the send/receive socket.
    pub bind_addr: SocketAddrV4,
    /// Group to join. `None` skips membership entirely.
    pub group: Option<Ipv4Addr>,
    /// Destination used by `broadcast`.
    pub broadcast_addr: SocketAddr,
    pub ttl: u32,
}

impl TransportConfig {
    pub fn new(device_name: impl Into<String>) -> Self {
        Self {
            device_name: device_name.into(),
            bind_addr: SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, DOSA_PORT),
            group: Some(MULTICAST_GROUP),
            broadcast_addr: SocketAddr::V4(SocketAddrV4::new(MULTICAST_GROUP, DOSA_PORT)),
            ttl: MULTICAST_TTL,
        }
    }
}

/// Create the socket that holds the multicast group membership.
fn create_group_socket(group: Ipv4Addr, port: u16) -> io::Result<std::net::UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;

    socket.set_reuse_address(true)?;

    #[cfg(unix)]
    socket.set_reuse_port(true)?;

    #[cfg(unix)]
    let bind_ip = group;
    #[cfg(not(unix))]
    let bind_ip = Ipv4Addr::UNSPECIFIED;

    socket.bind(&SocketAddr::V4(SocketAddrV4::new(bind_ip, port)).into())?;
    socket.join_multicast_v4(&group, &Ipv4Addr::UNSPECIFIED)?;

    socket.set_nonblocking(true)?;

    Ok(socket.into())
}

/// Create the send socket. Address reuse lets several tools share the port.
fn create_send_socket(bind: SocketAddrV4, ttl: u32) -> io::Result<std::net::UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;

    socket.set_reuse_address(true)?;
    socket.set_multicast_ttl_v4(ttl)?;

    socket.bind(&SocketAddr::V4(bind).into())?;

    socket.set_nonblocking(true)?;

    Ok(socket.into())
}

/// UDP transport owning both protocol sockets.
pub struct Transport {
    config: TransportConfig,
    socket: UdpSocket,
    _membership: Option<std::net::UdpSocket>,
}

impl Transport {
    /// Bind both sockets. Failure here is fatal for the caller.
    pub async fn bind(config: TransportConfig) -> Result<Self> {
        validate_device_name(&config.device_name)?;

        let membership = match config.group {
            Some(group) => Some(create_group_socket(group, config.bind_addr.port())?),
            None => None,
        };
        let socket = UdpSocket::from_std(create_send_socket(config.bind_addr, config.ttl)?)?;

        info!(
            bind = %socket.local_addr()?,
            group = ?config.group,
            name = %config.device_name,
            "Transport bound"
        );

        Ok(Self {
            config,
            socket,
            _membership: membership,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }
}

#[async_trait]
impl PacketTransport for Transport {
    fn device_name(&self) -> &str {
        &self.config.device_name
    }

    async fn send(&self, payload: &[u8], target: SocketAddr) -> Result<()> {
        self.socket.send_to(payload, target).await?;
        Ok(())
    }

    async fn broadcast(&self, payload: &[u8]) -> Result<()> {
        self.send(payload, self.config.broadcast_addr).await
    }

    async fn send_and_await_ack(
        &self,
        payload: &[u8],
        target: SocketAddr,
        timeout: Duration,
    ) -> Result<bool> {
        let message_id = match message_id_of(payload) {
            Some(id) if payload.len() >= HEADER_SIZE => id,
            _ => {
                return Err(MalformedPacket::TooShort {
                    addr: target,
                    len: payload.len(),
                    min: HEADER_SIZE,
                }
                .into())
            }
        };

        let deadline = Instant::now() + timeout;
        self.send(payload, target).await?;

        while Instant::now() < deadline {
            let wait = deadline.saturating_duration_since(Instant::now()).min(RETRY_INTERVAL);

            // Anything other than our ack is dropped while waiting.
            if let Some(packet) = self.receive(Some(wait)).await? {
                if packet.code() == MessageCode::Ack && packet.acked_id().ok() == Some(message_id) {
                    debug!(message_id, %target, "Ack received");
                    return Ok(true);
                }
            }

            if Instant::now() < deadline {
                self.send(payload, target).await?;
            }
        }

        debug!(message_id, %target, "No ack before deadline");
        Ok(false)
    }

    async fn receive(&self, timeout_budget: Option<Duration>) -> Result<Option<Packet>> {
        let deadline = timeout_budget.map(|t| Instant::now() + t);
        let mut buf = vec![0u8; MAX_DATAGRAM];

        loop {
            let wait = match deadline {
                Some(deadline) => deadline
                    .saturating_duration_since(Instant::now())
                    .min(POLL_INTERVAL),
                None => POLL_INTERVAL,
            };

            match timeout(wait, self.socket.recv_from(&mut buf)).await {
                Ok(Ok((len, addr))) => match decode(&buf[..len], addr) {
                    Ok(packet) => return Ok(Some(packet)),
                    Err(e) => debug!(error = %e, "Dropping foreign datagram"),
                },
                Ok(Err(e)) => warn!(error = %e, "UDP receive error"),
                Err(_) => {}
            }

            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return Ok(None);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ack_body, encode};

    async fn loopback(name: &str) -> Transport {
        Transport::bind(TransportConfig {
            device_name: name.to_string(),
            bind_addr: SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0),
            group: None,
            broadcast_addr: "127.0.0.1:9".parse().unwrap(),
            ttl: 1,
        })
        .await
        .unwrap()
    }

    async fn peer() -> UdpSocket {
        UdpSocket::bind("127.0.0.1:0").await.unwrap()
    }

    #[tokio::test]
    async fn test_bind_rejects_long_name() {
        let result = Transport::bind(TransportConfig {
            device_name: "a name that is far too long".to_string(),
            bind_addr: SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0),
            group: None,
            broadcast_addr: "127.0.0.1:9".parse().unwrap(),
            ttl: 1,
        })
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_receive_skips_malformed() {
        let transport = loopback("Bot").await;
        let target = transport.local_addr().unwrap();
        let peer = peer().await;

        peer.send_to(&[1, 2, 3], target).await.unwrap();
        let bytes = encode(MessageCode::Online, "Door1", &[]).unwrap();
        peer.send_to(&bytes, target).await.unwrap();

        let packet = transport
            .receive(Some(Duration::from_secs(2)))
            .await
            .unwrap()
            .expect("valid packet after the malformed one");
        assert_eq!(packet.code(), MessageCode::Online);
        assert_eq!(packet.origin_name(), "Door1");
        assert_eq!(packet.origin(), peer.local_addr().unwrap());
    }

    #[tokio::test]
    async fn test_receive_respects_timeout_under_garbage() {
        let transport = loopback("Bot").await;
        let target = transport.local_addr().unwrap();
        let peer = peer().await;

        for _ in 0..50 {
            peer.send_to(&[0u8; 10], target).await.unwrap();
        }

        let start = std::time::Instant::now();
        let result = transport.receive(Some(Duration::from_millis(200))).await.unwrap();
        assert!(result.is_none());
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_zero_timeout_returns_promptly() {
        let transport = loopback("Bot").await;
        let start = std::time::Instant::now();
        assert!(transport.receive(Some(Duration::ZERO)).await.unwrap().is_none());
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_ack_wait_succeeds() {
        let transport = loopback("Bot").await;
        let peer = peer().await;
        let peer_addr = peer.local_addr().unwrap();

        let responder = tokio::spawn(async move {
            let mut buf = [0u8; 1024];
            let (len, from) = peer.recv_from(&mut buf).await.unwrap();
            let packet = decode(&buf[..len], from).unwrap();
            let ack = encode(MessageCode::Ack, "Gate", &ack_body(packet.message_id())).unwrap();
            peer.send_to(&ack, from).await.unwrap();
        });

        let payload = transport.build(MessageCode::ConfigSetting, &[6, 1]).unwrap();
        let acked = transport
            .send_and_await_ack(&payload, peer_addr, Duration::from_secs(2))
            .await
            .unwrap();
        assert!(acked);
        responder.await.unwrap();
    }

    #[tokio::test]
    async fn test_ack_wait_ignores_wrong_id() {
        let transport = loopback("Bot").await;
        let peer = peer().await;
        let peer_addr = peer.local_addr().unwrap();

        let responder = tokio::spawn(async move {
            let mut buf = [0u8; 1024];
            let (len, from) = peer.recv_from(&mut buf).await.unwrap();
            let packet = decode(&buf[..len], from).unwrap();
            let wrong = packet.message_id().wrapping_add(1);
            let ack = encode(MessageCode::Ack, "Gate", &ack_body(wrong)).unwrap();
            peer.send_to(&ack, from).await.unwrap();
        });

        let payload = transport.build(MessageCode::ConfigSetting, &[6, 1]).unwrap();
        let acked = transport
            .send_and_await_ack(&payload, peer_addr, Duration::from_millis(300))
            .await
            .unwrap();
        assert!(!acked);
        responder.await.unwrap();
    }

    #[tokio::test]
    async fn test_ack_wait_resends_identical_payload() {
        let transport = loopback("Bot").await;
        let peer = peer().await;
        let peer_addr = peer.local_addr().unwrap();

        let payload = transport.build(MessageCode::Play, b"lockdown").unwrap();
        let acked = transport
            .send_and_await_ack(&payload, peer_addr, Duration::from_millis(350))
            .await
            .unwrap();
        assert!(!acked);

        let mut copies = Vec::new();
        let mut buf = [0u8; 1024];
        while let Ok(Ok((len, _))) =
            timeout(Duration::from_millis(100), peer.recv_from(&mut buf)).await
        {
            copies.push(buf[..len].to_vec());
        }
        assert!(copies.len() >= 2, "expected retries, got {}", copies.len());
        assert!(copies.iter().all(|c| *c == payload));
    }

    #[tokio::test]
    async fn test_ack_wait_rejects_headerless_payload() {
        let transport = loopback("Bot").await;
        let result = transport
            .send_and_await_ack(&[1, 2], "127.0.0.1:9".parse().unwrap(), Duration::from_millis(10))
            .await;
        assert!(result.is_err());
    }
}
