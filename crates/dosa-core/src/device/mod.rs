//! Device records and the liveness registry.

pub mod registry;
pub mod types;

pub use registry::{DeviceRegistry, PongOutcome};
pub use types::{Device, DeviceState, DeviceType};
