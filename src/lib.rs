//! # slotwire
//!
//! Reliable-ish messaging over a transport that can only carry a single
//! mutable string value per channel, replicated last-write-wins, with no
//! delivery or ordering guarantees.
//!
//! The crate layers the usual protocol machinery on top of that primitive:
//!
//! - **Framing**: a fixed-size, bit-packed wire format ([`protocol`])
//! - **Segmentation**: payloads larger than one frame are split and
//!   reassembled ([`protocol::assembly`])
//! - **Pacing**: a bounded per-slot queue drained no faster than the
//!   transport replicates ([`queue`])
//! - **Reliability**: opt-in acknowledgement and retry per packet
//!   ([`reliability`])
//! - **Slot pool**: a fixed set of channels assigned to peers by ownership
//!   transfer ([`pool`])
//!
//! Everything is tick-driven and single-threaded; [`Node::run`] is an
//! optional async driver around the same synchronous [`Node::tick`].
//!
//! ## Example
//!
//! ```
//! use slotwire::{Node, NodeConfig};
//! use slotwire::transport::MemoryChannel;
//! use std::time::Instant;
//!
//! let mut node = Node::builder(1)
//!     .config(NodeConfig::default())
//!     .channel(Box::new(MemoryChannel::new(1)))
//!     .channel(Box::new(MemoryChannel::new(1)))
//!     .build()
//!     .unwrap();
//!
//! node.handle_player_joined(2);
//! assert!(node.send_string_to_player(2, "hello"));
//! node.tick(Instant::now());
//! ```

pub mod buffer;
pub mod config;
pub mod error;
pub mod listener;
pub mod node;
pub mod pool;
pub mod protocol;
pub mod queue;
pub mod reliability;
pub mod slot;
pub mod transport;

pub use config::NodeConfig;
pub use error::{Result, SlotwireError};
pub use listener::{PacketEvent, PacketListener};
pub use node::{Node, NodeBuilder};
pub use pool::SlotPool;
pub use protocol::{flags, FrameCodec, Packet, PROTOCOL_VERSION};
pub use slot::Slot;
pub use transport::{ChannelTransport, PlayerId};
