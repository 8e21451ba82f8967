//! In-memory doubles for the transport, alert and voice seams.

use std::collections::{BTreeMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::alert::AlertSink;
use crate::error::{DeliveryError, Result};
use crate::protocol::{decode, encode_with_id, LogLevel, MessageCode, Packet};
use crate::transport::PacketTransport;
use crate::voice::VoiceSink;

/// Build a decoded packet as if it arrived from `origin`.
pub(crate) fn packet(id: u16, code: MessageCode, name: &str, aux: &[u8], origin: &str) -> Packet {
    let origin: SocketAddr = origin.parse().unwrap();
    decode(&encode_with_id(id, code, name, aux).unwrap(), origin).unwrap()
}

pub(crate) struct MockTransport {
    name: String,
    ack_result: bool,
    inbound: Mutex<VecDeque<Packet>>,
    sent: Mutex<Vec<(Vec<u8>, SocketAddr)>>,
    broadcasts: Mutex<Vec<Vec<u8>>>,
    ack_waits: Mutex<Vec<(Vec<u8>, SocketAddr)>>,
}

impl MockTransport {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ack_result: true,
            inbound: Mutex::new(VecDeque::new()),
            sent: Mutex::new(Vec::new()),
            broadcasts: Mutex::new(Vec::new()),
            ack_waits: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_ack_result(mut self, acked: bool) -> Self {
        self.ack_result = acked;
        self
    }

    pub(crate) fn push_inbound(&self, packet: Packet) {
        self.inbound.lock().unwrap().push_back(packet);
    }

    pub(crate) fn sent(&self) -> Vec<(Vec<u8>, SocketAddr)> {
        self.sent.lock().unwrap().clone()
    }

    pub(crate) fn broadcasts(&self) -> Vec<Vec<u8>> {
        self.broadcasts.lock().unwrap().clone()
    }

    pub(crate) fn ack_waits(&self) -> Vec<(Vec<u8>, SocketAddr)> {
        self.ack_waits.lock().unwrap().clone()
    }

    /// Codes of every broadcast packet, in order.
    pub(crate) fn broadcast_codes(&self) -> Vec<MessageCode> {
        self.broadcasts()
            .iter()
            .map(|b| decode(b, "0.0.0.0:0".parse().unwrap()).unwrap().code())
            .collect()
    }

    /// Level and text of every broadcast `log` packet.
    pub(crate) fn net_logs(&self) -> Vec<(LogLevel, String)> {
        self.broadcasts()
            .iter()
            .map(|b| decode(b, "0.0.0.0:0".parse().unwrap()).unwrap())
            .filter(|p| p.code() == MessageCode::Log)
            .map(|p| {
                let entry = p.log_entry().unwrap();
                (entry.level, entry.message)
            })
            .collect()
    }

    /// Message ids acked to `target`.
    pub(crate) fn acks_to(&self, target: &str) -> Vec<u16> {
        let target: SocketAddr = target.parse().unwrap();
        self.sent()
            .iter()
            .filter(|(_, to)| *to == target)
            .filter_map(|(bytes, to)| decode(bytes, *to).ok())
            .filter(|p| p.code() == MessageCode::Ack)
            .map(|p| p.acked_id().unwrap())
            .collect()
    }

    /// Raw datagrams sent to `target`, as text.
    pub(crate) fn lines_to(&self, target: &str) -> Vec<String> {
        let target: SocketAddr = target.parse().unwrap();
        self.sent()
            .iter()
            .filter(|(_, to)| *to == target)
            .map(|(bytes, _)| String::from_utf8_lossy(bytes).into_owned())
            .collect()
    }
}

#[async_trait]
impl PacketTransport for MockTransport {
    fn device_name(&self) -> &str {
        &self.name
    }

    async fn send(&self, payload: &[u8], target: SocketAddr) -> Result<()> {
        self.sent.lock().unwrap().push((payload.to_vec(), target));
        Ok(())
    }

    async fn broadcast(&self, payload: &[u8]) -> Result<()> {
        self.broadcasts.lock().unwrap().push(payload.to_vec());
        Ok(())
    }

    async fn send_and_await_ack(
        &self,
        payload: &[u8],
        target: SocketAddr,
        _timeout: Duration,
    ) -> Result<bool> {
        self.ack_waits.lock().unwrap().push((payload.to_vec(), target));
        Ok(self.ack_result)
    }

    async fn receive(&self, _timeout: Option<Duration>) -> Result<Option<Packet>> {
        Ok(self.inbound.lock().unwrap().pop_front())
    }
}

type Published = (String, String, BTreeMap<String, String>);

#[derive(Clone, Default)]
pub(crate) struct RecordingSink {
    published: Arc<Mutex<Vec<Published>>>,
    failing: Vec<String>,
}

impl RecordingSink {
    pub(crate) fn failing_on(targets: &[&str]) -> Self {
        Self {
            published: Arc::default(),
            failing: targets.iter().map(|t| t.to_string()).collect(),
        }
    }

    pub(crate) fn published(&self) -> Vec<Published> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl AlertSink for RecordingSink {
    async fn publish(
        &self,
        target: &str,
        message: &str,
        attributes: &BTreeMap<String, String>,
    ) -> std::result::Result<(), DeliveryError> {
        if self.failing.iter().any(|t| t == target) {
            return Err(DeliveryError::Sink {
                target: target.to_string(),
                message: "rejected".to_string(),
            });
        }
        self.published
            .lock()
            .unwrap()
            .push((target.to_string(), message.to_string(), attributes.clone()));
        Ok(())
    }
}

#[derive(Clone, Default)]
pub(crate) struct RecordingVoice {
    spoken: Arc<Mutex<Vec<String>>>,
}

impl RecordingVoice {
    pub(crate) fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }
}

#[async_trait]
impl VoiceSink for RecordingVoice {
    async fn announce(&self, text: &str) {
        self.spoken.lock().unwrap().push(text.to_string());
    }
}
