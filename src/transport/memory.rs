//! In-memory channel implementation.
//!
//! Models the replication primitive as a shared cell: every handle cloned
//! from a channel sees the latest written value and the current owner.
//! Replication lag is not simulated; last-write-wins loss still is, because
//! observers only see whatever value is current when they poll.

use std::sync::{Arc, Mutex};

use super::{ChannelTransport, PlayerId};

#[derive(Debug)]
struct ChannelCell {
    value: Option<String>,
    owner: PlayerId,
}

/// A shared-cell channel for tests and local simulation.
///
/// # Example
///
/// ```
/// use slotwire::transport::{ChannelTransport, MemoryChannel};
///
/// let mut local = MemoryChannel::new(1);
/// let remote = local.handle();
///
/// local.write_value("hello");
/// assert_eq!(remote.read_value(), Some("hello".to_string()));
/// ```
#[derive(Debug, Clone)]
pub struct MemoryChannel {
    cell: Arc<Mutex<ChannelCell>>,
}

impl MemoryChannel {
    /// Create a channel owned by `owner`, with no value written yet.
    pub fn new(owner: PlayerId) -> Self {
        Self {
            cell: Arc::new(Mutex::new(ChannelCell {
                value: None,
                owner,
            })),
        }
    }

    /// Another handle onto the same replicated cell, as another peer would
    /// observe it.
    pub fn handle(&self) -> MemoryChannel {
        self.clone()
    }
}

impl ChannelTransport for MemoryChannel {
    fn owner(&self) -> PlayerId {
        self.cell.lock().expect("channel cell poisoned").owner
    }

    fn transfer_ownership(&mut self, to: PlayerId) {
        self.cell.lock().expect("channel cell poisoned").owner = to;
    }

    fn write_value(&mut self, value: &str) {
        self.cell.lock().expect("channel cell poisoned").value = Some(value.to_string());
    }

    fn read_value(&self) -> Option<String> {
        self.cell.lock().expect("channel cell poisoned").value.clone()
    }
}
