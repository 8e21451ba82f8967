//! Named, configured action sequences ("plays").
//!
//! Plays come from the `plays` configuration section:
//!
//! ```json
//! { "plays": { "lockdown": { "actions": [
//!     { "action": "set-lock", "devices": ["Gate"], "value": 1 },
//!     { "action": "announce", "value": "Lockdown engaged" }
//! ] } } }
//! ```

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::alert::{dispatch_and_report, AlertCategory, AlertDispatcher, AlertEvent};
use crate::config::Settings;
use crate::device::{Device, DeviceRegistry};
use crate::error::{ConfigError, CoreError, DeliveryError, Result};
use crate::protocol::{lock_state_body, LockState, LogLevel, MessageCode};
use crate::transport::{net_log_best_effort, PacketTransport, DEFAULT_ACK_TIMEOUT};
use crate::voice::VoiceSink;

/// Action as written in configuration.
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
enum RawAction {
    Announce { value: String },
    SetLock { devices: Vec<String>, value: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybookAction {
    Announce(String),
    /// The requested state is kept raw; it is range-checked when run.
    SetLockState { devices: Vec<String>, state: i64 },
}

impl From<RawAction> for PlaybookAction {
    fn from(raw: RawAction) -> Self {
        match raw {
            RawAction::Announce { value } => PlaybookAction::Announce(value),
            RawAction::SetLock { devices, value } => PlaybookAction::SetLockState {
                devices,
                state: value,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Playbook {
    pub name: String,
    pub actions: Vec<PlaybookAction>,
}

#[derive(Debug, Clone, Default)]
pub struct PlaybookLibrary {
    plays: HashMap<String, Playbook>,
}

impl PlaybookLibrary {
    pub fn new(plays: impl IntoIterator<Item = Playbook>) -> Self {
        Self {
            plays: plays.into_iter().map(|p| (p.name.clone(), p)).collect(),
        }
    }

    /// Load every play from `plays.<name>.actions`.
    ///
    /// Plays without an `actions` list are skipped, as are individual actions
    /// that do not parse.
    pub fn from_settings(settings: &Settings) -> Self {
        let Some(plays) = settings.node(&["plays"]).and_then(|v| v.as_object()) else {
            return Self::default();
        };

        let mut library = Self::default();
        for (name, play) in plays {
            match parse_playbook(name, play) {
                Ok(playbook) => {
                    library.plays.insert(name.clone(), playbook);
                }
                Err(e) => warn!(error = %e, "Skipping play"),
            }
        }
        library
    }

    pub fn get(&self, name: &str) -> Option<&Playbook> {
        self.plays.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.plays.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.plays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plays.is_empty()
    }
}

fn parse_playbook(name: &str, play: &serde_json::Value) -> std::result::Result<Playbook, ConfigError> {
    let invalid = |message: &str| ConfigError::InvalidPlaybook {
        name: name.to_string(),
        message: message.to_string(),
    };

    let entries = play
        .get("actions")
        .ok_or_else(|| invalid("no actions"))?
        .as_array()
        .ok_or_else(|| invalid("actions is not a list"))?;

    let actions = entries
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| match RawAction::deserialize(entry) {
            Ok(raw) => Some(PlaybookAction::from(raw)),
            Err(e) => {
                warn!(play = name, index, error = %e, "Skipping malformed action");
                None
            }
        })
        .collect();

    Ok(Playbook {
        name: name.to_string(),
        actions,
    })
}

/// Collaborators a play acts through.
pub struct PlaybookContext<'a, T: PacketTransport + ?Sized> {
    pub registry: &'a DeviceRegistry,
    pub transport: &'a T,
    pub alerts: &'a AlertDispatcher,
    pub voice: &'a dyn VoiceSink,
}

/// What a run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybookReport {
    pub actions_run: usize,
    pub announcements: usize,
    pub locks_set: Vec<String>,
    pub locks_failed: Vec<String>,
    pub unknown_devices: Vec<String>,
    pub rejected_states: Vec<i64>,
}

pub struct PlaybookEngine {
    library: PlaybookLibrary,
    ack_timeout: Duration,
}

impl PlaybookEngine {
    pub fn new(library: PlaybookLibrary) -> Self {
        Self {
            library,
            ack_timeout: DEFAULT_ACK_TIMEOUT,
        }
    }

    pub fn with_ack_timeout(mut self, ack_timeout: Duration) -> Self {
        self.ack_timeout = ack_timeout;
        self
    }

    pub fn library(&self) -> &PlaybookLibrary {
        &self.library
    }

    /// Run the named play. Returns `None` when no such play is configured.
    ///
    /// Actions run in order; a failing action never stops the ones after it.
    pub async fn run<T>(&self, name: &str, ctx: &PlaybookContext<'_, T>) -> Option<PlaybookReport>
    where
        T: PacketTransport + ?Sized,
    {
        let Some(playbook) = self.library.get(name) else {
            info!(play = name, "No such play configured");
            return None;
        };

        info!(play = name, actions = playbook.actions.len(), "Running play");
        let mut report = PlaybookReport::default();

        for action in &playbook.actions {
            report.actions_run += 1;
            match action {
                PlaybookAction::Announce(text) => {
                    ctx.voice.announce(text).await;
                    report.announcements += 1;
                }
                PlaybookAction::SetLockState { devices, state } => {
                    self.set_lock_state(devices, *state, ctx, &mut report).await;
                }
            }
        }

        Some(report)
    }

    async fn set_lock_state<T>(
        &self,
        devices: &[String],
        requested: i64,
        ctx: &PlaybookContext<'_, T>,
        report: &mut PlaybookReport,
    ) where
        T: PacketTransport + ?Sized,
    {
        let state = match LockState::try_from(requested) {
            Ok(state) => state,
            Err(value) => {
                warn!(value, "Bad lock state in play");
                report.rejected_states.push(value);
                return;
            }
        };

        for name in devices {
            let targets: Vec<&Device> = ctx.registry.named(name).collect();

            if targets.is_empty() {
                let err = CoreError::UnknownTarget(name.clone());
                warn!(error = %err, "Unknown device in play");
                let text = format!("Unknown device in play: {}", name);
                net_log_best_effort(ctx.transport, LogLevel::Warning, &text).await;
                ctx.voice.announce(&text).await;
                report.unknown_devices.push(name.clone());
                continue;
            }

            for device in targets {
                match self.send_lock_state(device, state, ctx.transport).await {
                    Ok(()) => {
                        let text = format!("Set {} to lock state {}", name, state.as_str());
                        info!(device = %name, address = %device.address, state = state.as_str(), "Lock state set");
                        net_log_best_effort(ctx.transport, LogLevel::Info, &text).await;
                        report.locks_set.push(name.clone());
                    }
                    Err(e) => {
                        let text = format!("Failed to set {} to lock state {}", name, state.as_str());
                        warn!(device = %name, error = %e, "Lock state not acknowledged");
                        net_log_best_effort(ctx.transport, LogLevel::Error, &text).await;
                        ctx.voice.announce(&format!("Error executing play: {}", text)).await;

                        let event = AlertEvent::new(
                            AlertCategory::Network,
                            name.as_str(),
                            text,
                            LogLevel::Error.as_str(),
                        );
                        dispatch_and_report(ctx.alerts, ctx.transport, &event).await;
                        report.locks_failed.push(name.clone());
                    }
                }
            }
        }
    }

    async fn send_lock_state<T>(&self, device: &Device, state: LockState, transport: &T) -> Result<()>
    where
        T: PacketTransport + ?Sized,
    {
        let payload = transport.build(MessageCode::ConfigSetting, &lock_state_body(state))?;
        debug!(device = %device.name, address = %device.address, "Sending lock state");

        if transport
            .send_and_await_ack(&payload, device.address, self.ack_timeout)
            .await?
        {
            Ok(())
        } else {
            Err(DeliveryError::AckTimeout {
                target: device.address,
                waited_ms: self.ack_timeout.as_millis() as u64,
            }
            .into())
        }
    }
}
