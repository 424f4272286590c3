//! Wire format encoding and decoding.
//!
//! A frame is a fixed-length byte buffer of `frame_size` bytes, written to a
//! channel as Base64 text. Layout, all multi-byte integers Big Endian:
//!
//! ```text
//! ┌──────────┬───────┬────────────────┬───────────────┬──────────┬─────────┐
//! │ Event ID │ Flags │ Target Player  │ Segment Index │ Length   │ Payload │
//! │ 4 bytes  │ 1 byte│ 4 bytes        │ 1 byte        │ 2 bytes  │ ≤ rest  │
//! │ u32 BE   │       │ i32 BE, opt.   │ optional      │ u16 BE   │         │
//! └──────────┴───────┴────────────────┴───────────────┴──────────┴─────────┘
//! ```
//!
//! The target-player field is present only when `TARGETED_PLAYER` is set,
//! the segment-index byte only when `SEGMENTED` is set. The flags byte is
//! always at offset 4; every later offset is derived from the flags actually
//! present, and the encoder and decoder share that derivation.

use bytes::Bytes;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use super::packet::Packet;
use crate::buffer;
use crate::error::{Result, SlotwireError};

/// Protocol version reported in enquiry replies.
pub const PROTOCOL_VERSION: u16 = 2;

/// Oldest protocol version this implementation can talk to.
pub const COMPAT_PROTOCOL_VERSION: u16 = 2;

/// Offset of the flags byte within any frame.
pub const FLAGS_OFFSET: usize = 4;

/// Smallest legal frame size: the largest possible header plus one payload
/// byte (4 + 1 + 4 + 1 + 2 + 1).
pub const MIN_FRAME_SIZE: usize = 13;

/// A segment index is one byte, so a payload can span at most 256 frames.
pub const MAX_SEGMENTS: usize = 256;

/// Flag constants for the protocol. Bit-independent and combinable; stable
/// across a deployment.
pub mod flags {
    /// Acknowledgement-and-retry delivery requested for this packet.
    pub const LOSSLESS: u8 = 0x01;
    /// Packet is addressed to a single peer (target field present).
    pub const TARGETED_PLAYER: u8 = 0x02;
    /// Packet is one segment of a larger payload (index byte present).
    pub const SEGMENTED: u8 = 0x04;
    /// Payload is an ASCII string.
    pub const DATA_TYPE_STRING: u8 = 0x08;
    /// Protocol version enquiry.
    pub const ENQUIRY: u8 = 0x10;
    /// Acknowledgement; payload carries the acknowledged event id.
    pub const ACKNOWLEDGEMENT: u8 = 0x20;
    /// First segment of a segmented payload.
    pub const SYNCHRONIZE_SEQUENCE_NUMBER: u8 = 0x40;
    /// Final segment of a segmented payload.
    pub const FINISH: u8 = 0x80;

    /// Check if a specific flag is set.
    #[inline]
    pub fn has_flag(flags: u8, flag: u8) -> bool {
        flags & flag != 0
    }
}

/// Header size in bytes for a given flags byte.
///
/// Event id (4) + flags (1) + optional target (4) + optional segment
/// index (1) + payload length (2). The segment marker bits
/// (`SYNCHRONIZE_SEQUENCE_NUMBER`, `FINISH`) do not affect the layout.
pub fn header_size(packet_flags: u8) -> usize {
    let mut size = FLAGS_OFFSET + 1 + 2;
    if flags::has_flag(packet_flags, flags::TARGETED_PLAYER) {
        size += 4;
    }
    if flags::has_flag(packet_flags, flags::SEGMENTED) {
        size += 1;
    }
    size
}

/// Stateless encoder/decoder for one deployment-wide frame size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCodec {
    frame_size: usize,
}

impl FrameCodec {
    /// Create a codec for the given frame size.
    ///
    /// Sizes below [`MIN_FRAME_SIZE`] cannot hold every header layout; they
    /// are rejected up front by [`NodeConfig::validate`](crate::config::NodeConfig::validate).
    pub fn new(frame_size: usize) -> Self {
        debug_assert!(frame_size >= MIN_FRAME_SIZE);
        Self { frame_size }
    }

    /// The configured frame size in bytes.
    #[inline]
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Payload bytes available in one frame for the given flags.
    #[inline]
    pub fn available_size(&self, packet_flags: u8) -> usize {
        self.frame_size.saturating_sub(header_size(packet_flags))
    }

    /// Number of frames needed to carry `payload_len` bytes as segments.
    ///
    /// Uses the same per-segment window as [`encode`](Self::encode), so the
    /// count and the windowing can never disagree.
    pub fn segments_count(&self, packet_flags: u8, payload_len: usize) -> usize {
        let available = self.available_size(packet_flags | flags::SEGMENTED);
        payload_len.div_ceil(available)
    }

    /// Encode one frame for `packet`.
    ///
    /// For segmented packets, `packet.payload` is the full payload and
    /// `segment_index` selects the window; segment 0 gets the
    /// `SYNCHRONIZE_SEQUENCE_NUMBER` bit, the terminal segment `FINISH`.
    /// For non-segmented packets `segment_index` is ignored.
    ///
    /// # Errors
    ///
    /// [`SlotwireError::SegmentOutOfRange`] when `segment_index` falls
    /// outside the computed segment count;
    /// [`SlotwireError::PayloadTooLarge`] when a non-segmented payload does
    /// not fit the frame after headers.
    pub fn encode(&self, packet: &Packet, segment_index: u8) -> Result<Vec<u8>> {
        let mut packet_flags = packet.flags;
        let mut frame = vec![0u8; self.frame_size];

        buffer::write_u32(&mut frame, 0, packet.event_id)
            .ok_or(SlotwireError::Truncated("event id"))?;
        let mut offset = FLAGS_OFFSET + 1;

        if flags::has_flag(packet_flags, flags::TARGETED_PLAYER) {
            let target = packet.target_player.unwrap_or(0);
            buffer::write_i32(&mut frame, offset, target)
                .ok_or(SlotwireError::Truncated("target player"))?;
            offset += 4;
        }

        if flags::has_flag(packet_flags, flags::SEGMENTED) {
            let count = self.segments_count(packet_flags, packet.payload.len());
            if segment_index as usize >= count {
                return Err(SlotwireError::SegmentOutOfRange {
                    index: segment_index,
                    count,
                });
            }

            frame[offset] = segment_index;
            offset += 1;

            let window = self.available_size(packet_flags);
            let start = window * segment_index as usize;
            let segment_len = window.min(packet.payload.len() - start);

            if segment_index == 0 {
                packet_flags |= flags::SYNCHRONIZE_SEQUENCE_NUMBER;
            }
            if start + segment_len == packet.payload.len() {
                packet_flags |= flags::FINISH;
            }

            buffer::write_u16(&mut frame, offset, segment_len as u16)
                .ok_or(SlotwireError::Truncated("payload length"))?;
            offset += 2;
            frame[offset..offset + segment_len]
                .copy_from_slice(&packet.payload[start..start + segment_len]);
        } else {
            let available = self.available_size(packet_flags);
            if packet.payload.len() > available {
                return Err(SlotwireError::PayloadTooLarge {
                    len: packet.payload.len(),
                    available,
                });
            }

            buffer::write_u16(&mut frame, offset, packet.payload.len() as u16)
                .ok_or(SlotwireError::Truncated("payload length"))?;
            offset += 2;
            frame[offset..offset + packet.payload.len()].copy_from_slice(&packet.payload);
        }

        frame[FLAGS_OFFSET] = packet_flags;
        Ok(frame)
    }

    /// Decode a frame back into a [`Packet`].
    ///
    /// Symmetric with [`encode`](Self::encode): any frame the encoder emits
    /// decodes to a semantically identical packet, modulo reassembly of
    /// segmented payloads.
    pub fn decode(&self, frame: &[u8]) -> Result<Packet> {
        if frame.len() != self.frame_size {
            return Err(SlotwireError::FrameSizeMismatch {
                expected: self.frame_size,
                actual: frame.len(),
            });
        }

        let event_id =
            buffer::read_u32(frame, 0).ok_or(SlotwireError::Truncated("event id"))?;
        let packet_flags = frame[FLAGS_OFFSET];
        let mut offset = FLAGS_OFFSET + 1;

        let target_player = if flags::has_flag(packet_flags, flags::TARGETED_PLAYER) {
            let target = buffer::read_i32(frame, offset)
                .ok_or(SlotwireError::Truncated("target player"))?;
            offset += 4;
            Some(target)
        } else {
            None
        };

        let segment_index = if flags::has_flag(packet_flags, flags::SEGMENTED) {
            let index = buffer::read_u8(frame, offset)
                .ok_or(SlotwireError::Truncated("segment index"))?;
            offset += 1;
            Some(index)
        } else {
            None
        };

        let payload_len = buffer::read_u16(frame, offset)
            .ok_or(SlotwireError::Truncated("payload length"))? as usize;
        offset += 2;

        let available = self.frame_size - offset;
        if payload_len > available {
            return Err(SlotwireError::PayloadLengthOutOfBounds {
                len: payload_len,
                available,
            });
        }

        Ok(Packet {
            event_id,
            flags: packet_flags,
            target_player,
            segment_index,
            payload: Bytes::copy_from_slice(&frame[offset..offset + payload_len]),
        })
    }

    /// Encode one frame directly to its channel-value text form.
    pub fn encode_value(&self, packet: &Packet, segment_index: u8) -> Result<String> {
        Ok(self.frame_to_value(&self.encode(packet, segment_index)?))
    }

    /// Decode a channel value back into a [`Packet`].
    pub fn decode_value(&self, value: &str) -> Result<Packet> {
        let frame = BASE64.decode(value)?;
        self.decode(&frame)
    }

    /// Base64 text form of an already-encoded frame.
    pub fn frame_to_value(&self, frame: &[u8]) -> String {
        BASE64.encode(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> FrameCodec {
        FrameCodec::new(37)
    }

    #[test]
    fn test_header_size_by_flags() {
        assert_eq!(header_size(0), 7);
        assert_eq!(header_size(flags::TARGETED_PLAYER), 11);
        assert_eq!(header_size(flags::SEGMENTED), 8);
        assert_eq!(header_size(flags::TARGETED_PLAYER | flags::SEGMENTED), 12);
        // marker bits do not change the layout
        assert_eq!(
            header_size(flags::SYNCHRONIZE_SEQUENCE_NUMBER | flags::FINISH),
            7
        );
    }

    #[test]
    fn test_encode_decode_roundtrip_broadcast() {
        let packet = Packet::broadcast(42, flags::DATA_TYPE_STRING, Bytes::from_static(b"hello"));
        let frame = codec().encode(&packet, 0).unwrap();
        assert_eq!(frame.len(), 37);

        let decoded = codec().decode(&frame).unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn test_encode_decode_roundtrip_targeted() {
        let packet = Packet::to_player(7, flags::LOSSLESS, -3, Bytes::from_static(b"ok"));
        let decoded = codec().decode(&codec().encode(&packet, 0).unwrap()).unwrap();
        assert_eq!(decoded.event_id, 7);
        assert_eq!(decoded.target_player, Some(-3));
        assert!(decoded.is_lossless());
        assert_eq!(decoded.payload(), b"ok");
    }

    #[test]
    fn test_big_endian_field_layout() {
        let packet = Packet::to_player(0x01020304, 0, 0x05060708, Bytes::from_static(b"z"));
        let frame = codec().encode(&packet, 0).unwrap();

        assert_eq!(&frame[0..4], &[0x01, 0x02, 0x03, 0x04]);
        assert_eq!(frame[4], flags::TARGETED_PLAYER);
        assert_eq!(&frame[5..9], &[0x05, 0x06, 0x07, 0x08]);
        assert_eq!(&frame[9..11], &[0x00, 0x01]);
        assert_eq!(frame[11], b'z');
    }

    #[test]
    fn test_encode_rejects_oversized_payload() {
        // 37-byte frame, targeted: header is 11 bytes, 26 available.
        let payload = Bytes::from(vec![b'x'; 34]);
        let packet = Packet::to_player(1, 0, 5, payload);
        let result = codec().encode(&packet, 0);
        assert!(matches!(
            result,
            Err(SlotwireError::PayloadTooLarge { len: 34, available: 26 })
        ));
    }

    #[test]
    fn test_encode_payload_at_exact_capacity() {
        let packet = Packet::broadcast(1, 0, Bytes::from(vec![0xAB; 30]));
        let frame = codec().encode(&packet, 0).unwrap();
        let decoded = codec().decode(&frame).unwrap();
        assert_eq!(decoded.payload_len(), 30);
    }

    #[test]
    fn test_segments_count_matches_windowing() {
        let c = codec();
        // segmented broadcast header is 8 bytes, 29 available per frame
        assert_eq!(c.available_size(flags::SEGMENTED), 29);
        assert_eq!(c.segments_count(flags::SEGMENTED, 29), 1);
        assert_eq!(c.segments_count(flags::SEGMENTED, 30), 2);
        assert_eq!(c.segments_count(flags::SEGMENTED, 58), 2);
        assert_eq!(c.segments_count(0, 59), 3);
    }

    #[test]
    fn test_segment_windows_cover_payload_exactly() {
        let c = codec();
        let payload: Vec<u8> = (0..100u8).collect();
        let packet = Packet::broadcast(9, flags::SEGMENTED, Bytes::from(payload.clone()));
        let count = c.segments_count(packet.flags, payload.len());

        let mut reassembled = Vec::new();
        for index in 0..count {
            let decoded = c
                .decode(&c.encode(&packet, index as u8).unwrap())
                .unwrap();
            assert_eq!(decoded.segment_index, Some(index as u8));
            assert_eq!(decoded.is_first_segment(), index == 0);
            assert_eq!(decoded.is_final_segment(), index == count - 1);
            reassembled.extend_from_slice(decoded.payload());
        }
        assert_eq!(reassembled, payload);
    }

    #[test]
    fn test_segment_index_out_of_range() {
        let packet = Packet::broadcast(1, flags::SEGMENTED, Bytes::from(vec![0u8; 40]));
        let count = codec().segments_count(packet.flags, 40);
        let result = codec().encode(&packet, count as u8);
        assert!(matches!(
            result,
            Err(SlotwireError::SegmentOutOfRange { .. })
        ));
    }

    #[test]
    fn test_segmented_empty_payload_rejected() {
        let packet = Packet::broadcast(1, flags::SEGMENTED, Bytes::new());
        assert!(codec().encode(&packet, 0).is_err());
    }

    #[test]
    fn test_decode_wrong_frame_size() {
        let result = codec().decode(&[0u8; 36]);
        assert!(matches!(
            result,
            Err(SlotwireError::FrameSizeMismatch { expected: 37, actual: 36 })
        ));
    }

    #[test]
    fn test_decode_payload_length_out_of_bounds() {
        let mut frame = vec![0u8; 37];
        frame[0..4].copy_from_slice(&1u32.to_be_bytes());
        // no optional fields: length field at offset 5, 30 bytes available
        frame[5..7].copy_from_slice(&31u16.to_be_bytes());
        let result = codec().decode(&frame);
        assert!(matches!(
            result,
            Err(SlotwireError::PayloadLengthOutOfBounds { len: 31, .. })
        ));
    }

    #[test]
    fn test_value_roundtrip() {
        let packet = Packet::broadcast(3, flags::DATA_TYPE_STRING, Bytes::from_static(b"hey"));
        let value = codec().encode_value(&packet, 0).unwrap();
        let decoded = codec().decode_value(&value).unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn test_decode_value_rejects_garbage() {
        assert!(codec().decode_value("not base64!!!").is_err());
    }

    #[test]
    fn test_empty_payload_roundtrip() {
        let packet = Packet::broadcast(1, flags::ENQUIRY, Bytes::new());
        let decoded = codec().decode(&codec().encode(&packet, 0).unwrap()).unwrap();
        assert!(decoded.is_enquiry());
        assert_eq!(decoded.payload_len(), 0);
    }
}
