//! # Wire Format
//!
//! Byte-exact codec for the P2P message frame and the handshake payloads.
//!
//! ## Components
//! - **codec**: primitive encode/decode (LE integers, varints, var-strings)
//! - **header**: the 24-byte frame header, checksums and frame validation
//! - **payload**: `version`/`verack` payload serialization and dispatch
//!
//! The codec is stateless and performs no I/O beyond the buffer handed to
//! it; framing over an actual stream lives in [`crate::transport`].

pub mod codec;
pub mod constants;
pub mod header;
pub mod payload;

pub use header::{checksum, double_sha256, Command, FrameCheck, MessageHeader};
pub use payload::{Payload, PeerAddress, VersionPayload};
