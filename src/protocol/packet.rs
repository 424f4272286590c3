//! Packet struct with typed accessors.
//!
//! A `Packet` is the logical unit of the protocol: what a caller asks to
//! send before framing, and what the dispatcher hands out after decoding.
//! Uses `bytes::Bytes` for cheap payload sharing.
//!
//! # Example
//!
//! ```
//! use slotwire::protocol::{flags, Packet};
//! use bytes::Bytes;
//!
//! let packet = Packet::to_player(1, flags::LOSSLESS, 42, Bytes::from_static(b"ok"));
//!
//! assert!(packet.is_lossless());
//! assert!(packet.is_targeted());
//! assert_eq!(packet.target_player, Some(42));
//! ```

use bytes::Bytes;

use super::wire_format::flags;
use crate::buffer;
use crate::transport::PlayerId;

/// A logical protocol packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Per-slot event counter value. Never 0 on the wire.
    pub event_id: u32,
    /// Flags byte (see [`flags`]).
    pub flags: u8,
    /// Target peer, present when the `TARGETED_PLAYER` flag is set.
    pub target_player: Option<PlayerId>,
    /// Segment index, filled in by the decoder for `SEGMENTED` frames.
    pub segment_index: Option<u8>,
    /// Payload bytes. For a decoded segmented frame this is one window of
    /// the full payload; otherwise the whole payload.
    pub payload: Bytes,
}

impl Packet {
    /// Create a broadcast packet.
    pub fn broadcast(event_id: u32, packet_flags: u8, payload: Bytes) -> Self {
        Self {
            event_id,
            flags: packet_flags & !flags::TARGETED_PLAYER,
            target_player: None,
            segment_index: None,
            payload,
        }
    }

    /// Create a packet addressed to one peer. Sets `TARGETED_PLAYER`.
    pub fn to_player(event_id: u32, packet_flags: u8, target: PlayerId, payload: Bytes) -> Self {
        Self {
            event_id,
            flags: packet_flags | flags::TARGETED_PLAYER,
            target_player: Some(target),
            segment_index: None,
            payload,
        }
    }

    /// Get a reference to the payload bytes.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Get the payload length.
    #[inline]
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    /// Check if acknowledgement-and-retry delivery was requested.
    #[inline]
    pub fn is_lossless(&self) -> bool {
        flags::has_flag(self.flags, flags::LOSSLESS)
    }

    /// Check if the packet is addressed to a single peer.
    #[inline]
    pub fn is_targeted(&self) -> bool {
        flags::has_flag(self.flags, flags::TARGETED_PLAYER)
    }

    /// Check if the packet is one segment of a larger payload.
    #[inline]
    pub fn is_segmented(&self) -> bool {
        flags::has_flag(self.flags, flags::SEGMENTED)
    }

    /// Check if the payload is an ASCII string.
    #[inline]
    pub fn is_string(&self) -> bool {
        flags::has_flag(self.flags, flags::DATA_TYPE_STRING)
    }

    /// Check if this is a protocol version enquiry.
    #[inline]
    pub fn is_enquiry(&self) -> bool {
        flags::has_flag(self.flags, flags::ENQUIRY)
    }

    /// Check if this is an acknowledgement.
    #[inline]
    pub fn is_ack(&self) -> bool {
        flags::has_flag(self.flags, flags::ACKNOWLEDGEMENT)
    }

    /// Check if this is the first segment of a segmented payload.
    #[inline]
    pub fn is_first_segment(&self) -> bool {
        flags::has_flag(self.flags, flags::SYNCHRONIZE_SEQUENCE_NUMBER)
    }

    /// Check if this is the final segment of a segmented payload.
    #[inline]
    pub fn is_final_segment(&self) -> bool {
        flags::has_flag(self.flags, flags::FINISH)
    }

    /// Decode the payload as an ASCII string (stops at the first NUL).
    ///
    /// Returns `None` unless the `DATA_TYPE_STRING` flag is set.
    pub fn string_data(&self) -> Option<String> {
        if !self.is_string() {
            return None;
        }
        Some(buffer::bytes_to_string(&self.payload))
    }
}
