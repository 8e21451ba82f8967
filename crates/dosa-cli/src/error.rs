//! Error types for the DOSA CLI.
//!
//! CliError wraps CoreError from the shared library and adds CLI-specific variants.

use dosa_core::error::CoreError;
use thiserror::Error;

// Re-export core error types so command modules can use them via crate::error
pub use dosa_core::error::{ConfigError, DeliveryError};

/// Exit codes for the CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL_ERROR: i32 = 1;
    pub const NETWORK_ERROR: i32 = 2;
    pub const DEVICE_ERROR: i32 = 3;
    pub const INVALID_ARGS: i32 = 4;
}

/// Main error type for the CLI
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("No reply from {0}")]
    NoReply(String),

    #[error("{0} was not acknowledged")]
    NotAcknowledged(String),
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Core(e) => match e {
                CoreError::Malformed(_) => exit_codes::DEVICE_ERROR,
                CoreError::Config(_) => exit_codes::INVALID_ARGS,
                CoreError::Delivery(_) => exit_codes::NETWORK_ERROR,
                CoreError::UnknownTarget(_) => exit_codes::DEVICE_ERROR,
                CoreError::Io(_) => exit_codes::NETWORK_ERROR,
            },
            CliError::Io(_) => exit_codes::GENERAL_ERROR,
            CliError::InvalidArgument(_) => exit_codes::INVALID_ARGS,
            CliError::NoReply(_) => exit_codes::NETWORK_ERROR,
            CliError::NotAcknowledged(_) => exit_codes::NETWORK_ERROR,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Core(CoreError::Config(e))
    }
}

impl From<DeliveryError> for CliError {
    fn from(e: DeliveryError) -> Self {
        CliError::Core(CoreError::Delivery(e))
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(
            CliError::NoReply("10.0.0.5".to_string()).exit_code(),
            exit_codes::NETWORK_ERROR
        );
        assert_eq!(
            CliError::InvalidArgument("x".to_string()).exit_code(),
            exit_codes::INVALID_ARGS
        );

        let err: CliError = ConfigError::NameTooLong {
            name: "n".repeat(30),
            len: 30,
            max: 20,
        }
        .into();
        assert_eq!(err.exit_code(), exit_codes::INVALID_ARGS);
    }
}
