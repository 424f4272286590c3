//! Protocol types: wire format, packets, segmentation and reassembly.

pub mod assembly;
pub mod packet;
pub mod wire_format;

pub use assembly::SegmentAssembler;
pub use packet::Packet;
pub use wire_format::{flags, FrameCodec, COMPAT_PROTOCOL_VERSION, PROTOCOL_VERSION};
