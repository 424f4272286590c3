//! Listener capability for receiving dispatched packets.
//!
//! Hosts register implementations of [`PacketListener`] with the node. For
//! every data packet the dispatcher invokes either the targeted or the
//! broadcast entry point, then the generic one, on every listener in
//! registration order.

use bytes::Bytes;

use crate::buffer;
use crate::protocol::wire_format::flags;
use crate::transport::PlayerId;

/// A decoded data packet as delivered to listeners.
#[derive(Debug, Clone)]
pub struct PacketEvent {
    /// Event id assigned by the sender's slot.
    pub event_id: u32,
    /// Flags byte of the packet.
    pub flags: u8,
    /// The peer that sent the packet.
    pub sender: PlayerId,
    /// Target peer for targeted packets.
    pub target: Option<PlayerId>,
    /// Raw payload bytes.
    pub payload: Bytes,
}

impl PacketEvent {
    /// Payload as an ASCII string, when the sender flagged it as one.
    pub fn string_data(&self) -> Option<String> {
        if flags::has_flag(self.flags, flags::DATA_TYPE_STRING) {
            Some(buffer::bytes_to_string(&self.payload))
        } else {
            None
        }
    }
}

/// Receiver capability with the three handler entry points.
///
/// All methods have empty default bodies; implement only what you need.
pub trait PacketListener: Send {
    /// A packet addressed to a single peer was received.
    fn on_player_packet(&mut self, event: &PacketEvent) {
        let _ = event;
    }

    /// A broadcast packet was received.
    fn on_broadcast_packet(&mut self, event: &PacketEvent) {
        let _ = event;
    }

    /// Any data packet was received. Invoked after the specific handler.
    fn on_packet(&mut self, event: &PacketEvent) {
        let _ = event;
    }

    /// A locally sent lossless packet exhausted its retries.
    fn on_send_failed(&mut self, event_id: u32) {
        let _ = event_id;
    }
}
