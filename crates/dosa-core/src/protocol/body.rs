//! Per-code body layouts.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::device::{DeviceState, DeviceType};
use crate::error::MalformedPacket;

use super::packet::Packet;

/// Number of cells in an IR grid trigger map (8x8, row-major).
pub const IR_GRID_CELLS: usize = 64;

/// Config setting id for a lock state change.
pub const SETTING_LOCK_STATE: u8 = 6;

/// Severity carried by `log` packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Debug,
    Info,
    Status,
    Warning,
    Error,
    Critical,
    Unknown(u8),
}

impl LogLevel {
    pub fn from_u8(value: u8) -> Self {
        match value {
            10 => LogLevel::Debug,
            20 => LogLevel::Info,
            30 => LogLevel::Status,
            40 => LogLevel::Warning,
            50 => LogLevel::Error,
            60 => LogLevel::Critical,
            other => LogLevel::Unknown(other),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            LogLevel::Debug => 10,
            LogLevel::Info => 20,
            LogLevel::Status => 30,
            LogLevel::Warning => 40,
            LogLevel::Error => 50,
            LogLevel::Critical => 60,
            LogLevel::Unknown(v) => *v,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Status => "STATUS",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Critical => "CRITICAL",
            LogLevel::Unknown(_) => "UNKNOWN",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Level carried by `sec` packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecurityLevel {
    Alert,
    Breach,
    Tamper,
    Panic,
    Unknown(u8),
}

impl SecurityLevel {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => SecurityLevel::Alert,
            1 => SecurityLevel::Breach,
            2 => SecurityLevel::Tamper,
            3 => SecurityLevel::Panic,
            other => SecurityLevel::Unknown(other),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityLevel::Alert => "ALERT",
            SecurityLevel::Breach => "BREACH",
            SecurityLevel::Tamper => "TAMPER",
            SecurityLevel::Panic => "PANIC",
            SecurityLevel::Unknown(_) => "UNKNOWN",
        }
    }
}

/// Two-bit lock state sent with a `cfg` lock setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockState {
    Unlocked,
    Locked,
    Alert,
    Breach,
}

impl LockState {
    pub fn as_u8(&self) -> u8 {
        match self {
            LockState::Unlocked => 0,
            LockState::Locked => 1,
            LockState::Alert => 2,
            LockState::Breach => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LockState::Unlocked => "UNLOCKED",
            LockState::Locked => "LOCKED",
            LockState::Alert => "ALERT",
            LockState::Breach => "BREACH",
        }
    }
}

impl TryFrom<i64> for LockState {
    type Error = i64;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(LockState::Unlocked),
            1 => Ok(LockState::Locked),
            2 => Ok(LockState::Alert),
            3 => Ok(LockState::Breach),
            other => Err(other),
        }
    }
}

/// Decoded `trg` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerDetail {
    Unknown,
    Button,
    Sensor,
    /// Ranging sensor, previous and new distance.
    Ranging { previous: u16, current: u16 },
    /// 8x8 infrared grid, row-major.
    IrGrid(Vec<u8>),
    Auto,
    Other(u8),
}

impl TriggerDetail {
    pub fn subtype(&self) -> u8 {
        match self {
            TriggerDetail::Unknown => 0,
            TriggerDetail::Button => 1,
            TriggerDetail::Sensor => 2,
            TriggerDetail::Ranging { .. } => 3,
            TriggerDetail::IrGrid(_) => 4,
            TriggerDetail::Auto => 100,
            TriggerDetail::Other(v) => *v,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TriggerDetail::Unknown => "UNKNOWN",
            TriggerDetail::Button => "BUTTON",
            TriggerDetail::Sensor => "SENSOR",
            TriggerDetail::Ranging { .. } => "RANGE",
            TriggerDetail::IrGrid(_) => "MAP",
            TriggerDetail::Auto => "AUTO",
            TriggerDetail::Other(_) => "OTHER",
        }
    }

    pub fn to_body(&self) -> Vec<u8> {
        let mut body = vec![self.subtype()];
        match self {
            TriggerDetail::Ranging { previous, current } => {
                body.extend_from_slice(&previous.to_le_bytes());
                body.extend_from_slice(&current.to_le_bytes());
            }
            TriggerDetail::IrGrid(cells) => body.extend_from_slice(cells),
            _ => {}
        }
        body
    }
}

/// Severity and text of a `log` packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
}

/// Declared type and state carried by a `pon` packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PongBody {
    pub device_type: DeviceType,
    pub state: DeviceState,
}

impl Packet {
    pub fn log_entry(&self) -> Result<LogEntry, MalformedPacket> {
        self.require_body(1)?;
        let text = self.declared_body().get(1..).unwrap_or_default();
        Ok(LogEntry {
            level: LogLevel::from_u8(self.body()[0]),
            message: String::from_utf8_lossy(text).into_owned(),
        })
    }

    pub fn security_level(&self) -> Result<SecurityLevel, MalformedPacket> {
        self.require_body(1)?;
        Ok(SecurityLevel::from_u8(self.body()[0]))
    }

    pub fn trigger(&self) -> Result<TriggerDetail, MalformedPacket> {
        self.require_body(1)?;
        let body = self.body();
        let detail = match body[0] {
            0 => TriggerDetail::Unknown,
            1 => TriggerDetail::Button,
            2 => TriggerDetail::Sensor,
            3 => {
                self.require_body(5)?;
                TriggerDetail::Ranging {
                    previous: u16::from_le_bytes([body[1], body[2]]),
                    current: u16::from_le_bytes([body[3], body[4]]),
                }
            }
            4 => {
                self.require_body(1 + IR_GRID_CELLS)?;
                TriggerDetail::IrGrid(body[1..1 + IR_GRID_CELLS].to_vec())
            }
            100 => TriggerDetail::Auto,
            other => TriggerDetail::Other(other),
        };
        Ok(detail)
    }

    pub fn play_name(&self) -> String {
        String::from_utf8_lossy(self.declared_body()).into_owned()
    }

    pub fn pong(&self) -> Result<PongBody, MalformedPacket> {
        self.require_body(2)?;
        Ok(PongBody {
            device_type: DeviceType::from_u8(self.body()[0]),
            state: DeviceState::from_u8(self.body()[1]),
        })
    }

    /// Message id echoed by an `ack`.
    pub fn acked_id(&self) -> Result<u16, MalformedPacket> {
        self.require_body(2)?;
        Ok(u16::from_le_bytes([self.body()[0], self.body()[1]]))
    }
}

pub fn log_body(level: LogLevel, message: &str) -> Vec<u8> {
    let mut body = vec![level.as_u8()];
    body.extend_from_slice(message.as_bytes());
    body
}

pub fn ack_body(message_id: u16) -> Vec<u8> {
    message_id.to_le_bytes().to_vec()
}

pub fn lock_state_body(state: LockState) -> Vec<u8> {
    vec![SETTING_LOCK_STATE, state.as_u8()]
}

pub fn pong_body(device_type: DeviceType, state: DeviceState) -> Vec<u8> {
    vec![device_type.as_u8(), state.as_u8()]
}
