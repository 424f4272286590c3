//! Error types for slotwire.

use thiserror::Error;

/// Main error type for all slotwire operations.
#[derive(Debug, Error)]
pub enum SlotwireError {
    /// Non-segmented payload does not fit the frame after headers.
    #[error("payload of {len} bytes does not fit frame ({available} bytes available)")]
    PayloadTooLarge { len: usize, available: usize },

    /// Segment index outside the computed segment count.
    #[error("segment index {index} out of range (0..{count})")]
    SegmentOutOfRange { index: u8, count: usize },

    /// Received frame length does not match the configured frame size.
    #[error("frame is {actual} bytes, expected {expected}")]
    FrameSizeMismatch { expected: usize, actual: usize },

    /// Frame too short for its declared header layout.
    #[error("frame truncated while reading {0}")]
    Truncated(&'static str),

    /// Declared payload length exceeds the bytes remaining in the frame.
    #[error("declared payload length {len} exceeds frame capacity {available}")]
    PayloadLengthOutOfBounds { len: usize, available: usize },

    /// Channel value is not valid Base64.
    #[error("channel value decode error: {0}")]
    Value(#[from] base64::DecodeError),

    /// Send attempted on a slot the local peer does not own.
    #[error("send rejected: local peer does not own this slot")]
    NotOwner,

    /// Transmit queue is at capacity.
    #[error("packet queue is full")]
    QueueFull,

    /// Acknowledgement wait table is at capacity.
    #[error("acknowledgement table is full")]
    AckTableFull,

    /// A lossless packet exhausted its retry budget.
    #[error("delivery of event {event_id} failed after {retries} retries")]
    RetryExhausted { event_id: u32, retries: u32 },

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// JSON error while loading configuration.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias using SlotwireError.
pub type Result<T> = std::result::Result<T, SlotwireError>;
