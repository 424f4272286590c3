//! Acknowledgement tracking for lossless packets.
//!
//! A lossless packet is registered here when it is drained from the transmit
//! queue, and stays until the matching acknowledgement arrives or the retry
//! budget runs out. There is no blocking anywhere: "waiting" is a timestamp
//! and a counter inspected by [`AckTable::sweep`] on the scheduler tick.
//!
//! The table is a bounded array. When it is full, the packet is still sent
//! once, untracked: degraded service, not an error that stops the tick.

use std::time::{Duration, Instant};

use bytes::Bytes;

use crate::error::SlotwireError;

/// One in-flight lossless frame awaiting acknowledgement.
#[derive(Debug, Clone)]
pub struct AckWaitEntry {
    /// Event id the acknowledgement must carry.
    pub event_id: u32,
    /// The encoded frame, kept for resends.
    pub frame: Bytes,
    /// Time of the most recent (re)send.
    pub sent_at: Instant,
    /// Resends performed so far.
    pub retries: u32,
}

/// Action produced by a timeout sweep.
#[derive(Debug, Clone)]
pub enum SweepAction {
    /// Re-enqueue this frame for another transmission. The wait entry stays
    /// registered; the resend must not create a second one.
    Resend { event_id: u32, frame: Bytes },
    /// Retry budget exhausted; the packet is permanently dropped.
    Failed { event_id: u32, retries: u32 },
}

/// Bounded table of in-flight lossless packets.
pub struct AckTable {
    entries: Vec<Option<AckWaitEntry>>,
    timeout: Duration,
    max_retries: u32,
}

impl AckTable {
    /// Create a table with the given capacity, timeout and retry ceiling.
    pub fn new(capacity: usize, timeout: Duration, max_retries: u32) -> Self {
        assert!(capacity > 0, "ack table capacity must be at least 1");
        Self {
            entries: (0..capacity).map(|_| None).collect(),
            timeout,
            max_retries,
        }
    }

    /// Register a wait for `event_id`, starting its timeout at `now`.
    ///
    /// Returns `false` when the table is full; the caller sends the frame
    /// once, un-acknowledged.
    pub fn register_wait(&mut self, event_id: u32, frame: Bytes, now: Instant) -> bool {
        let Some(free) = self.entries.iter_mut().find(|e| e.is_none()) else {
            tracing::warn!(
                event_id,
                capacity = self.entries.len(),
                "{}, sending without delivery tracking",
                SlotwireError::AckTableFull
            );
            return false;
        };
        *free = Some(AckWaitEntry {
            event_id,
            frame,
            sent_at: now,
            retries: 0,
        });
        true
    }

    /// Clear the wait for `event_id`. Returns whether a match existed.
    ///
    /// With segmented lossless packets several entries can share an event
    /// id; each acknowledgement clears one, in registration order.
    pub fn clear_wait(&mut self, event_id: u32) -> bool {
        for slot in self.entries.iter_mut() {
            if slot.as_ref().is_some_and(|e| e.event_id == event_id) {
                *slot = None;
                return true;
            }
        }
        false
    }

    /// Check every occupied entry against the timeout.
    ///
    /// Entries past the timeout either get a [`SweepAction::Resend`]
    /// (retry incremented, timestamp refreshed) or, once the ceiling is
    /// reached, are removed with a [`SweepAction::Failed`].
    pub fn sweep(&mut self, now: Instant) -> Vec<SweepAction> {
        let mut actions = Vec::new();

        for slot in self.entries.iter_mut() {
            let Some(entry) = slot.as_mut() else {
                continue;
            };
            if now.duration_since(entry.sent_at) < self.timeout {
                continue;
            }

            if entry.retries >= self.max_retries {
                tracing::error!(
                    "{}",
                    SlotwireError::RetryExhausted {
                        event_id: entry.event_id,
                        retries: entry.retries,
                    }
                );
                actions.push(SweepAction::Failed {
                    event_id: entry.event_id,
                    retries: entry.retries,
                });
                *slot = None;
            } else {
                entry.retries += 1;
                entry.sent_at = now;
                actions.push(SweepAction::Resend {
                    event_id: entry.event_id,
                    frame: entry.frame.clone(),
                });
            }
        }

        actions
    }

    /// Number of occupied entries.
    pub fn occupied(&self) -> usize {
        self.entries.iter().filter(|e| e.is_some()).count()
    }

    /// Check if a wait is registered for `event_id`.
    pub fn is_waiting(&self, event_id: u32) -> bool {
        self.entries
            .iter()
            .any(|e| e.as_ref().is_some_and(|e| e.event_id == event_id))
    }
}
