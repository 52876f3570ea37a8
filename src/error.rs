//! Error types for the frame codec, serial links, and control engine.
//!
//! Follows the teacher crate's split: one `thiserror` enum per failure
//! domain rather than a single kitchen-sink error, so callers can match on
//! the kind of failure without string parsing.

use thiserror::Error;

use crate::addr::Peer;

/// Errors arising from frame encoding and decoding.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("payload too long ({words} words, maximum 255)")]
    PayloadTooLong { words: usize },

    #[error("frame too short ({len} bytes, minimum 7)")]
    FrameTooShort { len: usize },

    #[error("missing header (expected 0x24 0x24)")]
    MissingHeader,

    #[error("checksum mismatch (expected 0x{expected:02X}, computed 0x{computed:02X})")]
    ChecksumMismatch { expected: u8, computed: u8 },

    #[error("missing footer (expected 0x23 0x23)")]
    MissingFooter,

    #[error("unknown data type 0x{data_type:02X}")]
    UnknownDataType { data_type: u8 },

    #[error("unexpected payload length for {what}: expected {expected} words, got {got}")]
    UnexpectedLength {
        what: &'static str,
        expected: usize,
        got: usize,
    },
}

/// Errors from a serial link's transport or framing layer.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("{peer} link disconnected")]
    Disconnected { peer: Peer },

    #[error("write to {peer} link failed: {source}")]
    WriteFailed {
        peer: Peer,
        #[source]
        source: std::io::Error,
    },

    #[error("read from {peer} link failed: {source}")]
    ReadFailed {
        peer: Peer,
        #[source]
        source: std::io::Error,
    },

    #[error("decode error on {peer} link: {source}")]
    Decode {
        peer: Peer,
        #[source]
        source: FrameError,
    },

    #[error("failed to encode outbound command for {peer}: {source}")]
    EncodeFailed {
        peer: Peer,
        #[source]
        source: FrameError,
    },

    #[error("event bus is full and did not drain within the backpressure window")]
    BusFull,
}

/// Errors surfaced to the control state machine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("command {command_id} to {peer} timed out after {retries} retries")]
    CommandTimeout {
        command_id: u32,
        peer: Peer,
        retries: u8,
    },

    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
}

/// Invalid configuration; refuses to start the engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FatalConfigError {
    #[error("center band low ({low}) must be less than center band high ({high})")]
    InvalidCenterBand { low: f32, high: f32 },

    #[error("timer period for {name} must be nonzero")]
    ZeroTimerPeriod { name: &'static str },

    #[error("bus capacity must be nonzero")]
    ZeroBusCapacity,

    #[error("obstacle distance threshold must be nonzero")]
    ZeroObstacleThreshold,
}

pub type FrameResult<T> = std::result::Result<T, FrameError>;
pub type LinkResult<T> = std::result::Result<T, LinkError>;
pub type EngineResult<T> = std::result::Result<T, EngineError>;
