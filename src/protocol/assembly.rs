//! Reassembly of segmented payloads.
//!
//! Segments of one logical packet share an event id and arrive as
//! independent frames, each carrying one window of the full payload. The
//! assembler buffers them per `(sender, event id)` until the `FINISH`
//! segment arrives and every index below it is present, then emits the
//! reassembled packet. A fresh `SYNCHRONIZE_SEQUENCE_NUMBER` segment for an
//! event id already in progress discards the stale partial buffer first:
//! the transport can drop arbitrary frames, so a half-assembled payload
//! whose sender has moved on is garbage, not data.

use std::collections::{BTreeMap, HashMap};

use bytes::Bytes;

use super::packet::Packet;
use super::wire_format::flags;
use crate::transport::PlayerId;

/// Maximum in-progress reassemblies before new ones are dropped.
pub const MAX_PENDING_MESSAGES: usize = 64;

struct PartialMessage {
    parts: BTreeMap<u8, Bytes>,
    final_index: Option<u8>,
    flags: u8,
    target_player: Option<PlayerId>,
}

/// Buffer for accumulating segments and extracting complete packets.
pub struct SegmentAssembler {
    pending: HashMap<(PlayerId, u32), PartialMessage>,
    max_pending: usize,
}

impl SegmentAssembler {
    /// Create an assembler with the default pending-message limit.
    pub fn new() -> Self {
        Self::with_max_pending(MAX_PENDING_MESSAGES)
    }

    /// Create an assembler with a custom pending-message limit.
    pub fn with_max_pending(max_pending: usize) -> Self {
        Self {
            pending: HashMap::new(),
            max_pending,
        }
    }

    /// Feed one decoded packet through the assembler.
    ///
    /// Non-segmented packets pass through unchanged. Segments are buffered;
    /// the reassembled packet (markers cleared, payload concatenated in
    /// ascending index order) is returned once complete.
    pub fn accept(&mut self, sender: PlayerId, packet: Packet) -> Option<Packet> {
        if !packet.is_segmented() {
            return Some(packet);
        }

        let Some(index) = packet.segment_index else {
            tracing::warn!(
                sender,
                event_id = packet.event_id,
                "segmented packet without a segment index, dropping"
            );
            return None;
        };

        let key = (sender, packet.event_id);

        if packet.is_first_segment() && self.pending.contains_key(&key) {
            tracing::debug!(
                sender,
                event_id = packet.event_id,
                "new first segment for an in-progress event id, discarding stale buffer"
            );
            self.pending.remove(&key);
        }

        if !self.pending.contains_key(&key) {
            if self.pending.len() >= self.max_pending {
                tracing::warn!(
                    sender,
                    event_id = packet.event_id,
                    max = self.max_pending,
                    "reassembly buffer full, dropping segment"
                );
                return None;
            }
            self.pending.insert(
                key,
                PartialMessage {
                    parts: BTreeMap::new(),
                    final_index: None,
                    flags: packet.flags,
                    target_player: packet.target_player,
                },
            );
        }

        let partial = self.pending.get_mut(&key).expect("entry inserted above");
        if packet.is_final_segment() {
            partial.final_index = Some(index);
        }
        partial.parts.insert(index, packet.payload);

        let complete = match partial.final_index {
            Some(last) => {
                partial.parts.len() == last as usize + 1
                    && partial.parts.keys().next_back() == Some(&last)
            }
            None => false,
        };
        if !complete {
            return None;
        }

        let partial = self.pending.remove(&key).expect("entry checked above");
        let mut payload = Vec::new();
        for part in partial.parts.values() {
            payload.extend_from_slice(part);
        }

        Some(Packet {
            event_id: key.1,
            flags: partial.flags
                & !(flags::SEGMENTED | flags::SYNCHRONIZE_SEQUENCE_NUMBER | flags::FINISH),
            target_player: partial.target_player,
            segment_index: None,
            payload: Bytes::from(payload),
        })
    }

    /// Number of in-progress reassemblies.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

impl Default for SegmentAssembler {
    fn default() -> Self {
        Self::new()
    }
}
