//! Registry of devices discovered through pongs.
//!
//! Owned by the monitor loop; nothing else mutates it.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use super::types::Device;

/// Result of feeding a pong into the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PongOutcome {
    /// First pong from this address.
    Discovered,
    /// Known, responsive device; timestamp bumped.
    Refreshed,
    /// Device had been flagged unresponsive and is back.
    Recovered,
}

#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: HashMap<SocketAddr, Device>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe_pong(&mut self, device: Device) -> PongOutcome {
        self.observe_pong_at(device, Instant::now())
    }

    pub fn observe_pong_at(&mut self, device: Device, now: Instant) -> PongOutcome {
        match self.devices.get_mut(&device.address) {
            Some(known) => {
                known.last_seen = now;
                if known.unresponsive {
                    known.unresponsive = false;
                    PongOutcome::Recovered
                } else {
                    PongOutcome::Refreshed
                }
            }
            None => {
                let mut device = device;
                device.last_seen = now;
                device.unresponsive = false;
                self.devices.insert(device.address, device);
                PongOutcome::Discovered
            }
        }
    }

    /// Flag devices silent for longer than `timeout`.
    ///
    /// Only devices that were responsive are returned; a flagged device is
    /// not reported again until a pong clears it.
    pub fn sweep_stale(&mut self, timeout: Duration) -> Vec<Device> {
        self.sweep_stale_at(timeout, Instant::now())
    }

    pub fn sweep_stale_at(&mut self, timeout: Duration, now: Instant) -> Vec<Device> {
        let mut stale: Vec<Device> = self
            .devices
            .values_mut()
            .filter(|d| !d.unresponsive && d.is_stale(timeout, now))
            .map(|d| {
                d.unresponsive = true;
                d.clone()
            })
            .collect();
        stale.sort_by(|a, b| a.name.cmp(&b.name));
        stale
    }

    /// Drop every record (network flush).
    pub fn clear_all(&mut self) {
        self.devices.clear();
    }

    pub fn get(&self, address: &SocketAddr) -> Option<&Device> {
        self.devices.get(address)
    }

    /// Devices announcing the given name. Names are not unique on the wire.
    pub fn named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Device> + 'a {
        self.devices.values().filter(move |d| d.name == name)
    }

    /// All devices, sorted by name then address.
    pub fn devices(&self) -> Vec<&Device> {
        let mut list: Vec<&Device> = self.devices.values().collect();
        list.sort_by(|a, b| a.name.cmp(&b.name).then(a.address.cmp(&b.address)));
        list
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
