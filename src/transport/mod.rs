//! # Transport
//!
//! The connection adapter and the receive loop.
//!
//! The adapter wraps a caller-supplied byte stream behind blocking
//! exact-count reads and writes with reconnect-on-failure semantics; the
//! receive loop turns that stream into a bounded channel of validated,
//! decoded [`InboundEvent`]s.

pub mod connection;
pub mod receiver;

pub use connection::{BoxedConnection, Connection, Connector, PeerClient};
pub use receiver::InboundEvent;
