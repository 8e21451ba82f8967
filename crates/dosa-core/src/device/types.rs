//! Device records and declared type/state enumerations.

use std::fmt;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use crate::error::MalformedPacket;
use crate::protocol::{MessageCode, Packet};

/// Device type declared in a pong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceType {
    Unknown,
    Monitor,
    Utility,
    Alarm,
    PassiveIr,
    ActiveIr,
    Optical,
    Sonar,
    Button,
    Toggle,
    PowerToggle,
    Motor,
    Light,
    Other(u8),
}

impl DeviceType {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => DeviceType::Unknown,
            1 => DeviceType::Monitor,
            2 => DeviceType::Utility,
            3 => DeviceType::Alarm,
            10 => DeviceType::PassiveIr,
            11 => DeviceType::ActiveIr,
            12 => DeviceType::Optical,
            20 => DeviceType::Sonar,
            40 => DeviceType::Button,
            41 => DeviceType::Toggle,
            110 => DeviceType::PowerToggle,
            112 => DeviceType::Motor,
            113 => DeviceType::Light,
            other => DeviceType::Other(other),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            DeviceType::Unknown => 0,
            DeviceType::Monitor => 1,
            DeviceType::Utility => 2,
            DeviceType::Alarm => 3,
            DeviceType::PassiveIr => 10,
            DeviceType::ActiveIr => 11,
            DeviceType::Optical => 12,
            DeviceType::Sonar => 20,
            DeviceType::Button => 40,
            DeviceType::Toggle => 41,
            DeviceType::PowerToggle => 110,
            DeviceType::Motor => 112,
            DeviceType::Light => 113,
            DeviceType::Other(v) => *v,
        }
    }

    /// Human-readable name for display.
    pub fn display_name(&self) -> String {
        match self {
            DeviceType::Unknown => "Unknown".to_string(),
            DeviceType::Monitor => "Monitor".to_string(),
            DeviceType::Utility => "Utility".to_string(),
            DeviceType::Alarm => "Alarm".to_string(),
            DeviceType::PassiveIr => "PIR Sensor".to_string(),
            DeviceType::ActiveIr => "Laser Sensor".to_string(),
            DeviceType::Optical => "Optical Sensor".to_string(),
            DeviceType::Sonar => "Sonar Sensor".to_string(),
            DeviceType::Button => "Push Button".to_string(),
            DeviceType::Toggle => "Toggle Switch".to_string(),
            DeviceType::PowerToggle => "Power Toggle".to_string(),
            DeviceType::Motor => "Motorised Winch".to_string(),
            DeviceType::Light => "Light Controller".to_string(),
            DeviceType::Other(v) => format!("Unknown ({})", v),
        }
    }
}

/// Device state declared in a pong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceState {
    Ok,
    Active,
    MinorFault,
    MajorFault,
    Critical,
    Other(u8),
}

impl DeviceState {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => DeviceState::Ok,
            1 => DeviceState::Active,
            10 => DeviceState::MinorFault,
            11 => DeviceState::MajorFault,
            12 => DeviceState::Critical,
            other => DeviceState::Other(other),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            DeviceState::Ok => 0,
            DeviceState::Active => 1,
            DeviceState::MinorFault => 10,
            DeviceState::MajorFault => 11,
            DeviceState::Critical => 12,
            DeviceState::Other(v) => *v,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceState::Ok => "OK",
            DeviceState::Active => "ACTIVE",
            DeviceState::MinorFault => "MINOR FAULT",
            DeviceState::MajorFault => "MAJOR FAULT",
            DeviceState::Critical => "CRITICAL",
            DeviceState::Other(_) => "UNKNOWN STATE",
        }
    }

    pub fn is_fault(&self) -> bool {
        matches!(
            self,
            DeviceState::MinorFault | DeviceState::MajorFault | DeviceState::Critical
        )
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A device seen on the network, keyed by its address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub name: String,
    pub address: SocketAddr,
    pub device_type: DeviceType,
    pub state: DeviceState,
    pub last_seen: Instant,
    pub unresponsive: bool,
}

impl Device {
    pub fn new(
        name: impl Into<String>,
        address: SocketAddr,
        device_type: DeviceType,
        state: DeviceState,
        last_seen: Instant,
    ) -> Self {
        Self {
            name: name.into(),
            address,
            device_type,
            state,
            last_seen,
            unresponsive: false,
        }
    }

    /// Build a device record from a pong packet.
    pub fn from_pong(packet: &Packet, now: Instant) -> Result<Self, MalformedPacket> {
        debug_assert_eq!(packet.code(), MessageCode::Pong);
        let pong = packet.pong()?;
        Ok(Self::new(
            packet.origin_name(),
            packet.origin(),
            pong.device_type,
            pong.state,
            now,
        ))
    }

    /// True when the device has been silent for longer than `timeout`.
    pub fn is_stale(&self, timeout: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.last_seen) > timeout
    }
}
