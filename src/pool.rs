//! Fixed-size pool mapping peers to channel slots.
//!
//! The pool is built once at startup from pre-existing transports. Slot 0
//! belongs to the pool authority permanently; slots `1..N` are handed to
//! peers as they join, by transferring ownership of the slot's transport.
//! Slots are reassigned over the lifetime of the pool, never destroyed.

use std::time::Instant;

use crate::config::NodeConfig;
use crate::slot::Slot;
use crate::transport::{ChannelTransport, PlayerId};

/// Pool of channel slots keyed by transport ownership.
pub struct SlotPool {
    slots: Vec<Slot>,
    local_player: PlayerId,
    authority: PlayerId,
}

impl SlotPool {
    /// Build the pool from the startup set of transports.
    ///
    /// The owner of the first transport is the pool authority; slot 0 is its
    /// permanent slot.
    pub fn new(
        transports: Vec<Box<dyn ChannelTransport>>,
        local_player: PlayerId,
        config: &NodeConfig,
    ) -> Self {
        assert!(!transports.is_empty(), "pool needs at least the authority slot");
        let authority = transports[0].owner();
        let slots = transports
            .into_iter()
            .map(|transport| Slot::new(transport, local_player, config))
            .collect();
        Self {
            slots,
            local_player,
            authority,
        }
    }

    /// The peer this pool runs on behalf of.
    pub fn local_player(&self) -> PlayerId {
        self.local_player
    }

    /// The pool authority (owner of slot 0).
    pub fn authority(&self) -> PlayerId {
        self.authority
    }

    /// Check if the local peer is the pool authority.
    pub fn local_is_authority(&self) -> bool {
        self.local_player == self.authority
    }

    /// Number of slots, including slot 0.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check if the pool holds no slots.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Find the slot assigned to a peer.
    ///
    /// Slot 0 is returned only when the caller is both the authority and the
    /// local peer; otherwise slots `1..N` are scanned for one owned by
    /// `peer`. `None` means the peer has no slot yet (pool exhausted, or an
    /// assignment still propagating).
    pub fn lookup(&self, peer: PlayerId) -> Option<usize> {
        if self.local_is_authority() && peer == self.local_player {
            return Some(0);
        }
        (1..self.slots.len()).find(|&i| self.slots[i].owner() == peer)
    }

    /// The local peer's own slot, if any.
    pub fn local_slot_index(&self) -> Option<usize> {
        self.lookup(self.local_player)
    }

    /// Access the local peer's slot mutably (for sends).
    pub fn local_slot_mut(&mut self) -> Option<&mut Slot> {
        let index = self.local_slot_index()?;
        Some(&mut self.slots[index])
    }

    /// Access a slot by index.
    pub fn slot(&self, index: usize) -> Option<&Slot> {
        self.slots.get(index)
    }

    /// Access a slot by index, mutably.
    pub fn slot_mut(&mut self, index: usize) -> Option<&mut Slot> {
        self.slots.get_mut(index)
    }

    /// Assign a slot to a joining peer.
    ///
    /// Only the authority assigns. Scans slots `1..N` for the first one the
    /// authority still owns and transfers it; when none is free the join is
    /// rejected with a warning and the peer cannot send protocol messages.
    ///
    /// Returns the assigned slot index.
    pub fn handle_player_joined(&mut self, peer: PlayerId) -> Option<usize> {
        if !self.local_is_authority() {
            return None;
        }

        for index in 1..self.slots.len() {
            if self.slots[index].owner() == self.authority {
                self.slots[index].transfer_ownership(peer);
                tracing::info!(peer, slot = index, "assigned pool slot to joining peer");
                return Some(index);
            }
        }

        tracing::warn!(
            peer,
            pool_size = self.slots.len(),
            "pool is full, joining peer cannot send protocol messages"
        );
        None
    }

    /// Tick every locally owned slot's send side.
    ///
    /// Returns event ids whose lossless delivery failed permanently.
    pub fn tick_sends(&mut self, now: Instant) -> Vec<u32> {
        let mut failed = Vec::new();
        for slot in self.slots.iter_mut() {
            failed.extend(slot.tick(now));
        }
        failed
    }

    /// Poll every remote-owned slot for one incoming value change.
    ///
    /// Yields `(sender, decode result)` pairs in slot order.
    pub fn poll_receives(&mut self) -> Vec<(PlayerId, crate::error::Result<crate::protocol::Packet>)> {
        let mut received = Vec::new();
        for slot in self.slots.iter_mut() {
            let sender = slot.owner();
            if let Some(result) = slot.poll_receive() {
                received.push((sender, result));
            }
        }
        received
    }
}
