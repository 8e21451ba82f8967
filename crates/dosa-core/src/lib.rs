//! DOSA core library.
//!
//! Wire codec, multicast transport and the security bot engine shared by the
//! `dosa` command-line tools.

pub mod alert;
pub mod config;
pub mod dedup;
pub mod device;
pub mod error;
pub mod monitor;
pub mod playbook;
pub mod protocol;
pub mod transport;
pub mod voice;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{CoreError, Result};
