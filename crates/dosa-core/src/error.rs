//! Error types for DOSA core.

use std::net::SocketAddr;

use thiserror::Error;

/// Core error type for shared operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Malformed packet: {0}")]
    Malformed(#[from] MalformedPacket),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Delivery failure: {0}")]
    Delivery(#[from] DeliveryError),

    #[error("Unknown target: {0}")]
    UnknownTarget(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A datagram or body that does not follow the wire format.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MalformedPacket {
    #[error("{len} bytes from {addr} is shorter than the {min} byte header")]
    TooShort {
        addr: SocketAddr,
        len: usize,
        min: usize,
    },

    #[error("'{code}' body from {addr} needs {needed} bytes, got {len}")]
    BodyTooShort {
        code: String,
        addr: SocketAddr,
        needed: usize,
        len: usize,
    },
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Device name '{name}' is {len} bytes, maximum is {max}")]
    NameTooLong { name: String, len: usize, max: usize },

    #[error("Payload of {len} bytes exceeds the maximum packet size")]
    PayloadTooLarge { len: usize },

    #[error("Invalid playbook '{name}': {message}")]
    InvalidPlaybook { name: String, message: String },

    #[error("Invalid endpoint {endpoint}: {message}")]
    InvalidEndpoint { endpoint: String, message: String },

    #[error("Invalid config file {path}: {message}")]
    InvalidFile { path: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures to get a message or alert to its destination.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("No ack from {target} within {waited_ms} ms")]
    AckTimeout { target: SocketAddr, waited_ms: u64 },

    #[error("Sink {target} rejected alert: {message}")]
    Sink { target: String, message: String },
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
