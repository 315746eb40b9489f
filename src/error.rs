//! # Error Types
//!
//! Comprehensive error handling for the handshake protocol.
//!
//! This module defines all error variants that can occur during a handshake
//! attempt, from low-level I/O failures to frame-level protocol violations.
//!
//! ## Error Categories
//! - **I/O Errors**: dial, read and write failures on the peer stream
//! - **Frame Errors**: bad magic, bad checksum, malformed or unknown payloads
//! - **Handshake Errors**: deadline expiry, writes on a dead connection
//!
//! Frame errors observed by the receive loop are classified, logged and
//! swallowed — a single corrupt frame never tears the stream down. Send
//! failures and timeouts inside the handshake engine propagate to the caller
//! verbatim.

use std::io;
use thiserror::Error;

/// Primary error type for all handshake operations.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("connection to node is closed")]
    NotConnected,

    #[error("invalid message magic number: expected {expected:#010x}, got {actual:#010x}")]
    InvalidMagic { expected: u32, actual: u32 },

    #[error("invalid message checksum: expected {expected:02x?}, got {actual:02x?}")]
    InvalidChecksum { expected: [u8; 4], actual: [u8; 4] },

    #[error("decode error: {0}")]
    Decode(String),

    #[error("unknown command, can't parse payload: {0}")]
    UnknownCommand(String),

    #[error("payload too large: {0} bytes")]
    OversizedPayload(usize),

    #[error("cancelled by timeout")]
    Timeout,

    #[error("event channel closed")]
    ChannelClosed,

    #[error("handshake already performed or in progress")]
    AlreadyRunning,

    #[error("configuration error: {0}")]
    Config(String),
}

impl ProtocolError {
    /// Whether this error is a per-frame condition the receive loop discards
    /// and survives, as opposed to one that is fatal to the stream.
    pub fn is_frame_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidMagic { .. }
                | Self::InvalidChecksum { .. }
                | Self::Decode(_)
                | Self::UnknownCommand(_)
                | Self::OversizedPayload(_)
        )
    }
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;
