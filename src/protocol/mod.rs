//! # Handshake Protocol
//!
//! The state machine coordinating the version/verack exchange, and the
//! generator producing this node's version announcement.

pub mod engine;
pub mod generator;

pub use engine::HandshakeCore;
pub use generator::MessageGenerator;
