//! Node: dispatcher, tick orchestration and the public send surface.
//!
//! The [`NodeBuilder`] provides a fluent API for wiring up transports and
//! listeners. The [`Node`] owns the slot pool and drives all protocol work
//! from [`tick`](Node::tick): paced transmissions and reliability sweeps on
//! locally owned slots, value-diff polling on remote slots, and dispatch of
//! decoded packets.
//!
//! # Example
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
//! assert!(node.broadcast_string("hello"));
//! node.tick(Instant::now());
//! ```

use std::time::Instant;

use tokio::sync::oneshot;
use tokio::time::MissedTickBehavior;

use crate::buffer;
use crate::config::NodeConfig;
use crate::error::{Result, SlotwireError};
use crate::listener::{PacketEvent, PacketListener};
use crate::pool::SlotPool;
use crate::protocol::{Packet, SegmentAssembler};
use crate::transport::{ChannelTransport, PlayerId};

/// Builder for configuring and creating a [`Node`].
pub struct NodeBuilder {
    local_player: PlayerId,
    config: NodeConfig,
    transports: Vec<Box<dyn ChannelTransport>>,
    listeners: Vec<Box<dyn PacketListener>>,
}

impl NodeBuilder {
    /// Create a builder for the given local peer.
    pub fn new(local_player: PlayerId) -> Self {
        Self {
            local_player,
            config: NodeConfig::default(),
            transports: Vec::new(),
            listeners: Vec::new(),
        }
    }

    /// Set the configuration.
    pub fn config(mut self, config: NodeConfig) -> Self {
        self.config = config;
        self
    }

    /// Add one channel transport. The first one added becomes slot 0, the
    /// authority's permanent slot.
    pub fn channel(mut self, transport: Box<dyn ChannelTransport>) -> Self {
        self.transports.push(transport);
        self
    }

    /// Add a batch of channel transports in slot order.
    pub fn channels(mut self, transports: Vec<Box<dyn ChannelTransport>>) -> Self {
        self.transports.extend(transports);
        self
    }

    /// Register a packet listener.
    pub fn listener(mut self, listener: Box<dyn PacketListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Validate and build the node.
    pub fn build(self) -> Result<Node> {
        self.config.validate()?;
        if self.transports.is_empty() {
            return Err(SlotwireError::Config(
                "a node needs at least one channel transport".to_string(),
            ));
        }

        Ok(Node {
            pool: SlotPool::new(self.transports, self.local_player, &self.config),
            listeners: self.listeners,
            assembler: SegmentAssembler::new(),
            config: self.config,
        })
    }
}

/// The protocol engine for one peer.
pub struct Node {
    pool: SlotPool,
    listeners: Vec<Box<dyn PacketListener>>,
    assembler: SegmentAssembler,
    config: NodeConfig,
}

impl Node {
    /// Create a builder for the given local peer.
    pub fn builder(local_player: PlayerId) -> NodeBuilder {
        NodeBuilder::new(local_player)
    }

    /// The node's configuration.
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// The slot pool.
    pub fn pool(&self) -> &SlotPool {
        &self.pool
    }

    /// Notify the pool of a newly joined peer (authority only).
    pub fn handle_player_joined(&mut self, peer: PlayerId) -> Option<usize> {
        self.pool.handle_player_joined(peer)
    }

    // Send surface: forwarded to the local peer's slot. All calls return
    // whether the packet entered the local queue, not whether it was (or
    // will be) delivered.

    /// Send raw bytes to one peer.
    pub fn send_to_player(&mut self, target: PlayerId, data: &[u8]) -> bool {
        self.with_local_slot(|slot| slot.send_to_player(target, data))
    }

    /// Send raw bytes to one peer with acknowledgement and retry.
    pub fn send_to_player_lossless(&mut self, target: PlayerId, data: &[u8]) -> bool {
        self.with_local_slot(|slot| slot.send_to_player_lossless(target, data))
    }

    /// Send an ASCII string to one peer.
    pub fn send_string_to_player(&mut self, target: PlayerId, text: &str) -> bool {
        self.with_local_slot(|slot| slot.send_string_to_player(target, text))
    }

    /// Send an ASCII string to one peer with acknowledgement and retry.
    pub fn send_string_to_player_lossless(&mut self, target: PlayerId, text: &str) -> bool {
        self.with_local_slot(|slot| slot.send_string_to_player_lossless(target, text))
    }

    /// Broadcast raw bytes to every peer.
    pub fn broadcast(&mut self, data: &[u8]) -> bool {
        self.with_local_slot(|slot| slot.broadcast(data))
    }

    /// Broadcast raw bytes with acknowledgement and retry.
    pub fn broadcast_lossless(&mut self, data: &[u8]) -> bool {
        self.with_local_slot(|slot| slot.broadcast_lossless(data))
    }

    /// Broadcast an ASCII string to every peer.
    pub fn broadcast_string(&mut self, text: &str) -> bool {
        self.with_local_slot(|slot| slot.broadcast_string(text))
    }

    /// Broadcast an ASCII string with acknowledgement and retry.
    pub fn broadcast_string_lossless(&mut self, text: &str) -> bool {
        self.with_local_slot(|slot| slot.broadcast_string_lossless(text))
    }

    /// Ask a peer for its protocol version. Works without a slot-assignment
    /// handshake on the peer's side.
    pub fn send_version_enquiry(&mut self, target: PlayerId) -> bool {
        self.with_local_slot(|slot| slot.send_enquiry(target))
    }

    fn with_local_slot(&mut self, send: impl FnOnce(&mut crate::slot::Slot) -> bool) -> bool {
        match self.pool.local_slot_mut() {
            Some(slot) => send(slot),
            None => {
                tracing::warn!("send rejected: local peer has no assigned slot");
                false
            }
        }
    }

    /// Run one scheduler tick: transmit, sweep, poll, dispatch.
    pub fn tick(&mut self, now: Instant) {
        for event_id in self.pool.tick_sends(now) {
            for listener in self.listeners.iter_mut() {
                listener.on_send_failed(event_id);
            }
        }

        for (sender, result) in self.pool.poll_receives() {
            match result {
                Ok(packet) => self.handle_packet(sender, packet),
                Err(e) => {
                    tracing::warn!(sender, "discarding undecodable channel value: {e}");
                }
            }
        }
    }

    /// Demultiplex one decoded packet.
    fn handle_packet(&mut self, sender: PlayerId, packet: Packet) {
        let addressed_to_local = match packet.target_player {
            Some(target) => target == self.pool.local_player(),
            None => true,
        };

        if packet.is_enquiry() {
            if addressed_to_local {
                tracing::debug!(
                    sender,
                    version = crate::protocol::PROTOCOL_VERSION,
                    "protocol enquiry received, sending version"
                );
                self.with_local_slot(|slot| slot.send_version(sender));
            }
            return;
        }

        if packet.is_ack() {
            if !addressed_to_local {
                return;
            }
            let Some(acked_event_id) = buffer::read_u32(&packet.payload, 0) else {
                tracing::warn!(sender, "acknowledgement without an event id, ignoring");
                return;
            };
            let cleared = self.with_local_slot(|slot| slot.clear_wait(acked_event_id));
            if cleared {
                tracing::debug!(sender, event_id = acked_event_id, "wait ack cleared");
            } else {
                tracing::debug!(
                    sender,
                    event_id = acked_event_id,
                    "no wait entry for acknowledged event id (duplicate or late ack)"
                );
            }
            return;
        }

        // data packet: acknowledge each lossless frame (segments included),
        // dispatch once reassembly completes
        let frame_event_id = packet.event_id;
        let wants_ack = packet.is_lossless() && addressed_to_local;

        if let Some(complete) = self.assembler.accept(sender, packet) {
            let event = PacketEvent {
                event_id: complete.event_id,
                flags: complete.flags,
                sender,
                target: complete.target_player,
                payload: complete.payload,
            };
            let targeted = event.target.is_some();
            for listener in self.listeners.iter_mut() {
                if targeted {
                    listener.on_player_packet(&event);
                } else {
                    listener.on_broadcast_packet(&event);
                }
                listener.on_packet(&event);
            }
        }

        if wants_ack {
            self.with_local_slot(|slot| slot.send_ack(sender, frame_event_id));
        }
    }

    /// Drive the node on a fixed scheduler interval until `shutdown` fires.
    ///
    /// The node itself stays single-threaded: every tick runs the same
    /// synchronous [`tick`](Node::tick) the host could call directly.
    pub async fn run(mut self, mut shutdown: oneshot::Receiver<()>) -> Self {
        let mut ticker = tokio::time::interval(self.config.tick_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick(Instant::now());
                }
                _ = &mut shutdown => {
                    tracing::debug!("node driver shutting down");
                    return self;
                }
            }
        }
    }
}
