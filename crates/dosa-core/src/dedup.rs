//! Bounded history of seen messages, used to spot retransmissions.

use std::collections::VecDeque;
use std::net::SocketAddr;

/// Default number of (sender, id) pairs remembered.
pub const DEFAULT_HISTORY: usize = 25;

/// Classification of an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    FirstSeen,
    Retry,
}

/// FIFO window of (sender address, message id) pairs.
///
/// Eviction is by insertion order across all senders, so a chatty device can
/// push another device's entries out early. Once evicted, a message is
/// treated as new again.
#[derive(Debug)]
pub struct DeduplicationLog {
    history: VecDeque<(SocketAddr, u16)>,
    capacity: usize,
}

impl DeduplicationLog {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_HISTORY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            history: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn classify(&mut self, key: SocketAddr, message_id: u16) -> Delivery {
        // Nothing to key on for an unbound sender.
        if key.ip().is_unspecified() || key.port() == 0 {
            return Delivery::FirstSeen;
        }

        if self.history.contains(&(key, message_id)) {
            return Delivery::Retry;
        }

        if self.capacity > 0 {
            if self.history.len() == self.capacity {
                self.history.pop_front();
            }
            self.history.push_back((key, message_id));
        }

        Delivery::FirstSeen
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}

impl Default for DeduplicationLog {
    fn default() -> Self {
        Self::new()
    }
}
