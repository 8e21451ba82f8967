//! The security bot's control loop.
//!
//! Each tick sends a statsd heartbeat and a liveness ping when they are due,
//! flags devices that stopped answering pings, then handles at most one
//! inbound packet.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use chrono::{Local, NaiveTime};
use tracing::{debug, info, warn};

use crate::alert::{dispatch_and_report, AlertCategory, AlertDispatcher, AlertEvent};
use crate::config::{BotConfig, Endpoint};
use crate::dedup::{DeduplicationLog, Delivery};
use crate::device::{Device, DeviceRegistry, PongOutcome};
use crate::error::Result;
use crate::playbook::{PlaybookContext, PlaybookEngine};
use crate::protocol::{LogLevel, MessageCode, Packet, SecurityLevel, TriggerDetail};
use crate::transport::{net_log_best_effort, PacketTransport};
use crate::voice::VoiceSink;

/// Receive budget per tick.
pub const RECEIVE_SLICE: Duration = Duration::from_millis(100);

/// Counter sent to statsd on every heartbeat.
pub const HEARTBEAT_METRIC: &str = "dosa.secbot.heartbeat:1|c";

pub const ONLINE_ANNOUNCEMENT: &str = "DOSA Security Bot online";

/// Log server line: `HH:MM:SS [   id] ip:port (name): CODE<aux>`.
pub fn format_log_line(packet: &Packet, aux: &str, time: NaiveTime) -> String {
    let origin = packet.origin();
    format!(
        "{} [{:>5}] {}:{} ({}): {}{}",
        time.format("%H:%M:%S"),
        packet.message_id(),
        origin.ip(),
        origin.port(),
        packet.origin_name(),
        packet.code().to_string().to_uppercase(),
        aux
    )
}

fn resolve_or_warn(endpoint: &Endpoint, purpose: &str) -> Option<SocketAddr> {
    match endpoint.resolve() {
        Ok(addr) => Some(addr),
        Err(e) => {
            warn!(error = %e, purpose, "Endpoint unavailable, disabled");
            None
        }
    }
}

fn security_text(level: SecurityLevel, device: &str) -> String {
    match level {
        SecurityLevel::Alert => format!("Security alert, {}, activity", device),
        SecurityLevel::Breach => format!("Security alert, {}, breach", device),
        SecurityLevel::Tamper => format!("Security alert, {}, tamper warning", device),
        SecurityLevel::Panic => format!("Security alert, {}, panic alarm triggered", device),
        SecurityLevel::Unknown(_) => format!("Security alert, {}", device),
    }
}

fn trigger_aux(detail: &TriggerDetail) -> String {
    match detail {
        TriggerDetail::Ranging { previous, current } => {
            format!(" | {} | {} | {}", detail.label(), previous, current)
        }
        _ => format!(" | {}", detail.label()),
    }
}

pub struct MonitorLoop<T: PacketTransport> {
    transport: T,
    config: BotConfig,
    registry: DeviceRegistry,
    dedup: DeduplicationLog,
    alerts: AlertDispatcher,
    playbooks: PlaybookEngine,
    voice: Box<dyn VoiceSink>,
    statsd_addr: Option<SocketAddr>,
    log_server_addr: Option<SocketAddr>,
    last_heartbeat: Option<Instant>,
    last_ping: Option<Instant>,
}

impl<T: PacketTransport> MonitorLoop<T> {
    pub fn new(
        transport: T,
        config: BotConfig,
        alerts: AlertDispatcher,
        playbooks: PlaybookEngine,
        voice: Box<dyn VoiceSink>,
    ) -> Self {
        let statsd_addr = resolve_or_warn(&config.statsd, "statsd");
        let log_server_addr = resolve_or_warn(&config.log_server, "log server");

        Self {
            transport,
            config,
            registry: DeviceRegistry::new(),
            dedup: DeduplicationLog::new(),
            alerts,
            playbooks,
            voice,
            statsd_addr,
            log_server_addr,
            last_heartbeat: None,
            last_ping: None,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    /// Announce ourselves, then tick until a transport error.
    pub async fn run(&mut self, announce: bool) -> Result<()> {
        self.startup(announce).await?;
        loop {
            self.tick().await?;
        }
    }

    async fn startup(&mut self, announce: bool) -> Result<()> {
        let online = self.transport.build(MessageCode::Online, &[])?;
        self.transport.broadcast(&online).await?;

        info!(
            name = self.transport.device_name(),
            statsd = ?self.statsd_addr,
            log_server = ?self.log_server_addr,
            "Security bot online"
        );

        if announce {
            self.voice.announce(ONLINE_ANNOUNCEMENT).await;
        }
        Ok(())
    }

    pub async fn tick(&mut self) -> Result<()> {
        self.housekeeping(Instant::now()).await?;

        if let Some(packet) = self.transport.receive(Some(RECEIVE_SLICE)).await? {
            self.handle_packet(&packet).await;
        }
        Ok(())
    }

    /// Heartbeat, ping and stale sweep, evaluated at `now`.
    async fn housekeeping(&mut self, now: Instant) -> Result<()> {
        if is_due(self.last_heartbeat, self.config.heartbeat, now) {
            if let Some(addr) = self.statsd_addr {
                if let Err(e) = self.transport.send(HEARTBEAT_METRIC.as_bytes(), addr).await {
                    warn!(error = %e, "Heartbeat not sent");
                }
            }
            self.last_heartbeat = Some(now);
        }

        if is_due(self.last_ping, self.config.ping_interval, now) {
            let ping = self.transport.build(MessageCode::Ping, &[])?;
            self.transport.broadcast(&ping).await?;
            self.last_ping = Some(now);
        }

        for device in self.registry.sweep_stale_at(self.config.device_timeout, now) {
            self.report_unresponsive(&device).await;
        }
        Ok(())
    }

    async fn report_unresponsive(&self, device: &Device) {
        warn!(device = %device.name, address = %device.address, "Device unresponsive");

        let text = format!("Device unresponsive: {} at {}", device.name, device.address);
        net_log_best_effort(&self.transport, LogLevel::Error, &text).await;

        self.voice
            .announce(&format!("Alert, {} is not responding", device.name))
            .await;

        let event = AlertEvent::new(
            AlertCategory::Network,
            device.name.as_str(),
            format!("{} is not responding", device.name),
            LogLevel::Error.as_str(),
        );
        self.raise(&event).await;
    }

    /// Route one inbound packet.
    pub async fn handle_packet(&mut self, packet: &Packet) {
        let code = packet.code();

        if self.dedup.classify(packet.origin(), packet.message_id()) == Delivery::Retry {
            debug!(id = packet.message_id(), %code, origin = %packet.origin(), "Retry");
            // The sender missed our ack; answer again without repeating the work.
            if code.expects_ack() {
                self.ack(packet).await;
            }
            return;
        }

        match code {
            MessageCode::Begin | MessageCode::End | MessageCode::Unrecognized(_) => {
                self.ack(packet).await;
                self.forward(packet, "").await;
            }
            MessageCode::Log => self.on_log(packet).await,
            MessageCode::Security => self.on_security(packet).await,
            MessageCode::Flush => self.on_flush(packet).await,
            MessageCode::Trigger => {
                let aux = match packet.trigger() {
                    Ok(detail) => trigger_aux(&detail),
                    Err(e) => {
                        debug!(error = %e, "Trigger without detail");
                        String::new()
                    }
                };
                self.forward(packet, &aux).await;
            }
            MessageCode::Play => self.on_play(packet).await,
            MessageCode::Pong => self.on_pong(packet).await,
            MessageCode::Ping | MessageCode::Ack => {}
            MessageCode::Online
            | MessageCode::Ota
            | MessageCode::Debug
            | MessageCode::BluetoothConfig
            | MessageCode::ConfigSetting => self.forward(packet, "").await,
        }
    }

    async fn on_log(&mut self, packet: &Packet) {
        self.ack(packet).await;

        let entry = match packet.log_entry() {
            Ok(entry) => entry,
            Err(e) => {
                debug!(error = %e, "Dropping log packet");
                return;
            }
        };

        if entry.level == LogLevel::Debug {
            return;
        }

        let aux = format!(" | {} | {}", entry.level.as_str(), entry.message);
        self.forward(packet, &aux).await;

        // Our own errors are already handled where they were raised.
        if packet.origin_name() == self.transport.device_name() {
            return;
        }

        let device = packet.origin_name();
        let label = match entry.level {
            LogLevel::Critical => "critical",
            LogLevel::Error => "error",
            _ => return,
        };

        self.voice
            .announce(&format!("Warning, {} {}. {}.", device, label, entry.message))
            .await;

        let event = AlertEvent::new(
            AlertCategory::Network,
            device,
            format!("{} {}: {}", device, label, entry.message),
            entry.level.as_str(),
        );
        self.raise(&event).await;
    }

    async fn on_security(&mut self, packet: &Packet) {
        let level = match packet.security_level() {
            Ok(level) => level,
            Err(e) => {
                debug!(error = %e, "Dropping security packet");
                return;
            }
        };

        self.forward(packet, &format!(" | {}", level.as_str())).await;
        self.ack(packet).await;

        let text = security_text(level, packet.origin_name());
        warn!(device = packet.origin_name(), level = level.as_str(), "Security event");
        self.voice.announce(&text).await;

        let event = AlertEvent::new(
            AlertCategory::Security,
            packet.origin_name(),
            text,
            level.as_str(),
        );
        self.raise(&event).await;
    }

    async fn on_flush(&mut self, packet: &Packet) {
        info!(origin = packet.origin_name(), devices = self.registry.len(), "Network flush");
        self.forward(packet, "").await;

        self.registry.clear_all();
        self.last_ping = None;

        self.voice
            .announce(&format!("Network flush initiated by {}", packet.origin_name()))
            .await;
    }

    async fn on_play(&mut self, packet: &Packet) {
        self.ack(packet).await;

        let name = packet.play_name();
        self.forward(packet, &format!(" | {}", name)).await;

        let ctx = PlaybookContext {
            registry: &self.registry,
            transport: &self.transport,
            alerts: &self.alerts,
            voice: self.voice.as_ref(),
        };
        if let Some(report) = self.playbooks.run(&name, &ctx).await {
            debug!(play = %name, ?report, "Play finished");
        }
    }

    async fn on_pong(&mut self, packet: &Packet) {
        let device = match Device::from_pong(packet, Instant::now()) {
            Ok(device) => device,
            Err(e) => {
                debug!(error = %e, "Dropping pong");
                return;
            }
        };
        let name = device.name.clone();

        match self.registry.observe_pong(device) {
            PongOutcome::Discovered => {
                info!(device = %name, address = %packet.origin(), "Found device");
            }
            PongOutcome::Refreshed => {}
            PongOutcome::Recovered => {
                info!(device = %name, "Device recovered");
                net_log_best_effort(
                    &self.transport,
                    LogLevel::Warning,
                    &format!("Device recovery: {}", name),
                )
                .await;

                if self.config.report_recovery {
                    self.voice
                        .announce(&format!("Notice, {} is back online", name))
                        .await;
                    let event = AlertEvent::new(
                        AlertCategory::Network,
                        name.as_str(),
                        format!("{} is back online", name),
                        LogLevel::Info.as_str(),
                    );
                    self.raise(&event).await;
                }
            }
        }
    }

    async fn ack(&self, packet: &Packet) {
        if let Err(e) = self
            .transport
            .send_ack(packet.message_id(), packet.origin())
            .await
        {
            warn!(error = %e, origin = %packet.origin(), "Ack not sent");
        }
    }

    /// Send a line describing `packet` to the log server.
    async fn forward(&self, packet: &Packet, aux: &str) {
        let Some(addr) = self.log_server_addr else {
            return;
        };

        let line = format_log_line(packet, aux, Local::now().time());
        if let Err(e) = self.transport.send(line.as_bytes(), addr).await {
            warn!(error = %e, "Log line not forwarded");
        }
    }

    async fn raise(&self, event: &AlertEvent) {
        dispatch_and_report(&self.alerts, &self.transport, event).await;
    }
}

fn is_due(last: Option<Instant>, interval: Duration, now: Instant) -> bool {
    match last {
        None => true,
        Some(last) => now.saturating_duration_since(last) >= interval,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::AlertRoutes;
    use crate::device::{DeviceState, DeviceType};
    use crate::playbook::{Playbook, PlaybookAction, PlaybookLibrary};
    use crate::protocol::{log_body, pong_body, TriggerDetail};
    use crate::testing::{packet, MockTransport, RecordingSink, RecordingVoice};
    use std::collections::HashMap;

    const DOOR: &str = "10.0.0.5:6901";
    const GATE: &str = "10.0.0.7:6901";
    const LOG_SERVER: &str = "127.0.0.1:10518";
    const STATSD: &str = "127.0.0.1:8125";

    struct Harness {
        monitor: MonitorLoop<MockTransport>,
        sink: RecordingSink,
        voice: RecordingVoice,
    }

    fn harness() -> Harness {
        let sink = RecordingSink::default();
        let voice = RecordingVoice::default();

        let mut routes = HashMap::new();
        routes.insert(AlertCategory::Security, vec!["sec".to_string()]);
        routes.insert(AlertCategory::Network, vec!["ops".to_string()]);
        let alerts = AlertDispatcher::new(AlertRoutes::new(routes), Box::new(sink.clone()));

        let playbooks = PlaybookEngine::new(PlaybookLibrary::new([Playbook {
            name: "welcome".to_string(),
            actions: vec![PlaybookAction::Announce("Welcome home".to_string())],
        }]));

        let monitor = MonitorLoop::new(
            MockTransport::new("DOSA Security Bot"),
            BotConfig::default(),
            alerts,
            playbooks,
            Box::new(voice.clone()),
        );

        Harness {
            monitor,
            sink,
            voice,
        }
    }

    fn pong(id: u16, name: &str, origin: &str) -> Packet {
        packet(
            id,
            MessageCode::Pong,
            name,
            &pong_body(DeviceType::Toggle, DeviceState::Ok),
            origin,
        )
    }

    #[test]
    fn test_format_log_line() {
        let p = packet(42, MessageCode::Security, "Door1", &[1], DOOR);
        let time = NaiveTime::from_hms_opt(9, 5, 3).unwrap();
        assert_eq!(
            format_log_line(&p, " | BREACH", time),
            "09:05:03 [   42] 10.0.0.5:6901 (Door1): SEC | BREACH"
        );
    }

    #[tokio::test]
    async fn test_startup_broadcasts_online() {
        let mut h = harness();
        h.monitor.startup(true).await.unwrap();
        assert_eq!(h.monitor.transport().broadcast_codes(), vec![MessageCode::Online]);
        assert_eq!(h.voice.spoken(), vec![ONLINE_ANNOUNCEMENT.to_string()]);

        let mut h = harness();
        h.monitor.startup(false).await.unwrap();
        assert!(h.voice.spoken().is_empty());
    }

    #[tokio::test]
    async fn test_heartbeat_and_ping_when_due() {
        let mut h = harness();
        let start = Instant::now();

        h.monitor.housekeeping(start).await.unwrap();
        h.monitor.housekeeping(start + Duration::from_secs(5)).await.unwrap();

        let t = h.monitor.transport();
        assert_eq!(t.lines_to(STATSD), vec![HEARTBEAT_METRIC.to_string()]);
        assert_eq!(t.broadcast_codes(), vec![MessageCode::Ping]);

        h.monitor.housekeeping(start + Duration::from_secs(16)).await.unwrap();
        let t = h.monitor.transport();
        assert_eq!(t.lines_to(STATSD).len(), 2);
        assert_eq!(t.broadcast_codes(), vec![MessageCode::Ping, MessageCode::Ping]);
    }

    #[tokio::test]
    async fn test_unresponsive_then_recovered() {
        let mut h = harness();
        let start = Instant::now();

        h.monitor.handle_packet(&pong(1, "Gate", GATE)).await;
        assert_eq!(h.monitor.registry().len(), 1);

        h.monitor.housekeeping(start + Duration::from_secs(61)).await.unwrap();
        h.monitor.housekeeping(start + Duration::from_secs(62)).await.unwrap();

        assert_eq!(h.voice.spoken(), vec!["Alert, Gate is not responding".to_string()]);
        let published = h.sink.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, "ops");
        assert_eq!(published[0].1, "Gate is not responding");
        assert!(h
            .monitor
            .transport()
            .net_logs()
            .contains(&(LogLevel::Error, format!("Device unresponsive: Gate at {}", GATE))));

        h.monitor.handle_packet(&pong(2, "Gate", GATE)).await;
        assert_eq!(
            h.voice.spoken().last().map(String::as_str),
            Some("Notice, Gate is back online")
        );
        assert!(h
            .monitor
            .transport()
            .net_logs()
            .contains(&(LogLevel::Warning, "Device recovery: Gate".to_string())));
        assert_eq!(h.sink.published().len(), 2);
        assert_eq!(h.sink.published()[1].2["level"], "INFO");
    }

    #[tokio::test]
    async fn test_error_log_alerts() {
        let mut h = harness();
        let p = packet(9, MessageCode::Log, "Door1", &log_body(LogLevel::Error, "Jammed"), DOOR);
        h.monitor.handle_packet(&p).await;

        let t = h.monitor.transport();
        assert_eq!(t.acks_to(DOOR), vec![9]);
        let lines = t.lines_to(LOG_SERVER);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with("(Door1): LOG | ERROR | Jammed"));

        assert_eq!(h.voice.spoken(), vec!["Warning, Door1 error. Jammed.".to_string()]);
        let published = h.sink.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].1, "Door1 error: Jammed");
        assert_eq!(published[0].2["level"], "ERROR");
    }

    #[tokio::test]
    async fn test_own_and_debug_logs_are_quiet() {
        let mut h = harness();
        let own = packet(
            1,
            MessageCode::Log,
            "DOSA Security Bot",
            &log_body(LogLevel::Critical, "boom"),
            "10.0.0.2:6901",
        );
        let debug = packet(2, MessageCode::Log, "Door1", &log_body(LogLevel::Debug, "noise"), DOOR);
        h.monitor.handle_packet(&own).await;
        h.monitor.handle_packet(&debug).await;

        let t = h.monitor.transport();
        assert_eq!(t.acks_to("10.0.0.2:6901"), vec![1]);
        assert_eq!(t.acks_to(DOOR), vec![2]);
        // only the non-debug one is forwarded
        assert_eq!(t.lines_to(LOG_SERVER).len(), 1);
        assert!(h.voice.spoken().is_empty());
        assert!(h.sink.published().is_empty());
    }

    #[tokio::test]
    async fn test_security_retry_reacks_without_realerting() {
        let mut h = harness();
        let p = packet(77, MessageCode::Security, "Door1", &[2], DOOR);

        h.monitor.handle_packet(&p).await;
        h.monitor.handle_packet(&p).await;

        let t = h.monitor.transport();
        assert_eq!(t.acks_to(DOOR), vec![77, 77]);
        assert_eq!(t.lines_to(LOG_SERVER).len(), 1);
        assert_eq!(
            h.voice.spoken(),
            vec!["Security alert, Door1, tamper warning".to_string()]
        );
        let published = h.sink.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, "sec");
        assert_eq!(published[0].2["level"], "TAMPER");
        assert!(t
            .net_logs()
            .contains(&(LogLevel::Warning, "Security alert dispatched to sec".to_string())));
    }

    #[tokio::test]
    async fn test_trigger_forwarded_once_without_ack() {
        let mut h = harness();
        let detail = TriggerDetail::Ranging {
            previous: 120,
            current: 80,
        };
        let p = packet(5, MessageCode::Trigger, "Hall", &detail.to_body(), DOOR);

        h.monitor.handle_packet(&p).await;
        h.monitor.handle_packet(&p).await;

        let t = h.monitor.transport();
        assert!(t.acks_to(DOOR).is_empty());
        let lines = t.lines_to(LOG_SERVER);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with("(Hall): TRG | RANGE | 120 | 80"));
    }

    #[tokio::test]
    async fn test_flush_clears_registry() {
        let mut h = harness();
        h.monitor.handle_packet(&pong(1, "Gate", GATE)).await;
        h.monitor.housekeeping(Instant::now()).await.unwrap();

        h.monitor
            .handle_packet(&packet(3, MessageCode::Flush, "Panel", &[], DOOR))
            .await;

        assert!(h.monitor.registry().is_empty());
        assert!(h.monitor.transport().acks_to(DOOR).is_empty());
        assert_eq!(h.voice.spoken(), vec!["Network flush initiated by Panel".to_string()]);

        // the ping timer was reset
        h.monitor.housekeeping(Instant::now()).await.unwrap();
        assert_eq!(
            h.monitor.transport().broadcast_codes(),
            vec![MessageCode::Ping, MessageCode::Ping]
        );
    }

    #[tokio::test]
    async fn test_play_runs_playbook() {
        let mut h = harness();
        h.monitor
            .handle_packet(&packet(11, MessageCode::Play, "Panel", b"welcome", DOOR))
            .await;

        let t = h.monitor.transport();
        assert_eq!(t.acks_to(DOOR), vec![11]);
        assert!(t.lines_to(LOG_SERVER)[0].ends_with("(Panel): PLA | welcome"));
        assert_eq!(h.voice.spoken(), vec!["Welcome home".to_string()]);
    }

    #[tokio::test]
    async fn test_unrecognized_code_acked_and_forwarded() {
        let mut h = harness();
        h.monitor
            .handle_packet(&packet(4, MessageCode::Unrecognized(*b"zzz"), "Odd", &[], DOOR))
            .await;
        h.monitor
            .handle_packet(&packet(5, MessageCode::Ping, "Odd", &[], DOOR))
            .await;

        let t = h.monitor.transport();
        assert_eq!(t.acks_to(DOOR), vec![4]);
        let lines = t.lines_to(LOG_SERVER);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with("(Odd): ZZZ"));
    }

    #[tokio::test]
    async fn test_tick_handles_queued_packet() {
        let mut h = harness();
        h.monitor.transport().push_inbound(pong(1, "Gate", GATE));

        h.monitor.tick().await.unwrap();
        assert_eq!(h.monitor.registry().len(), 1);

        // empty queue is fine
        h.monitor.tick().await.unwrap();
    }
}
