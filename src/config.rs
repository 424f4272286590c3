//! Node configuration.
//!
//! All settings are simple scalars. Only `frame_size` affects the wire
//! format; a deployment must use one value everywhere or peers cannot
//! decode each other's frames.

use std::time::Duration;

use serde::Deserialize;

use crate::error::{Result, SlotwireError};
use crate::protocol::wire_format::MIN_FRAME_SIZE;

/// Default frame size in bytes.
pub const DEFAULT_FRAME_SIZE: usize = 37;

/// Default pacing cooldown between transmissions on one slot.
pub const DEFAULT_COOLDOWN_MS: u64 = 1000;

/// Default transmit queue capacity per slot.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Default acknowledgement wait table capacity per slot.
pub const DEFAULT_ACK_CAPACITY: usize = 200;

/// Default acknowledgement timeout before a resend.
pub const DEFAULT_ACK_TIMEOUT_MS: u64 = 10_000;

/// Default maximum resend attempts for a lossless packet.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Default scheduler tick interval for the async driver.
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 50;

/// Configuration for a [`Node`](crate::node::Node) and its slots.
///
/// # Example
///
/// ```
/// use slotwire::NodeConfig;
///
/// let config = NodeConfig::from_json_str(r#"{ "frame_size": 48, "cooldown_ms": 250 }"#).unwrap();
/// assert_eq!(config.frame_size, 48);
/// assert_eq!(config.queue_capacity, 100);
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Frame size `F` in bytes. Deployment-wide constant.
    pub frame_size: usize,
    /// Minimum interval between two transmissions on one slot.
    pub cooldown_ms: u64,
    /// Transmit queue capacity per slot.
    pub queue_capacity: usize,
    /// Acknowledgement wait table capacity per slot.
    pub ack_capacity: usize,
    /// Time without an acknowledgement before a lossless packet is resent.
    pub ack_timeout_ms: u64,
    /// Resend attempts before a lossless packet is reported failed.
    pub max_retries: u32,
    /// Scheduler tick interval used by [`Node::run`](crate::node::Node::run).
    pub tick_interval_ms: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            frame_size: DEFAULT_FRAME_SIZE,
            cooldown_ms: DEFAULT_COOLDOWN_MS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            ack_capacity: DEFAULT_ACK_CAPACITY,
            ack_timeout_ms: DEFAULT_ACK_TIMEOUT_MS,
            max_retries: DEFAULT_MAX_RETRIES,
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
        }
    }
}

impl NodeConfig {
    /// Load a configuration from a JSON string. Missing fields take defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Pacing cooldown as a [`Duration`].
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    /// Acknowledgement timeout as a [`Duration`].
    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }

    /// Scheduler tick interval as a [`Duration`].
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.frame_size < MIN_FRAME_SIZE {
            return Err(SlotwireError::Config(format!(
                "frame_size {} is below the minimum {}",
                self.frame_size, MIN_FRAME_SIZE
            )));
        }
        if self.queue_capacity == 0 {
            return Err(SlotwireError::Config(
                "queue_capacity must be at least 1".to_string(),
            ));
        }
        if self.ack_capacity == 0 {
            return Err(SlotwireError::Config(
                "ack_capacity must be at least 1".to_string(),
            ));
        }
        if self.tick_interval_ms == 0 {
            return Err(SlotwireError::Config(
                "tick_interval_ms must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
