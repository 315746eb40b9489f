//! # btc-handshake
//!
//! Bitcoin P2P version/verack handshake client.
//!
//! Opens a byte-stream connection to a node, exchanges the two framed
//! control messages that establish a peer session, and reports the elapsed
//! time or a classified failure.
//!
//! ## Architecture
//! - [`wire`]: byte-exact codec — 24-byte frame headers, double-SHA256
//!   checksums, CompactSize varints, the 26-byte address structure and the
//!   version payload with its mixed-endianness rules
//! - [`transport`]: connection adapter over a caller-supplied stream, and
//!   the receive loop publishing validated frames onto a bounded channel
//! - [`protocol`]: the handshake engine and version-message generator
//!
//! The crate never dials sockets itself: callers hand [`transport::PeerClient`]
//! a connector closure, which keeps every test runnable over in-memory
//! duplex streams.
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use btc_handshake::config::HandshakeConfig;
//! use btc_handshake::protocol::{HandshakeCore, MessageGenerator};
//! use btc_handshake::transport::{BoxedConnection, Connector, PeerClient};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> btc_handshake::error::Result<()> {
//!     let config = HandshakeConfig::default();
//!     let connector: Connector = Box::new(|host, port| {
//!         Box::pin(async move {
//!             let stream = tokio::net::TcpStream::connect((host.as_str(), port)).await?;
//!             Ok(Box::new(stream) as BoxedConnection)
//!         })
//!     });
//!
//!     let client = Arc::new(PeerClient::connect("127.0.0.1", 18333, connector).await?);
//!     let generator =
//!         MessageGenerator::new(config.protocol_version, config.services, &config.user_agent);
//!     let core = HandshakeCore::new(client, generator, &config);
//!
//!     let token = CancellationToken::new();
//!     core.start_receiver(&token);
//!     let elapsed = core.handshake(&token).await?;
//!     println!("handshake took {} ms", elapsed.as_millis());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod protocol;
pub mod transport;
pub mod wire;

pub use config::HandshakeConfig;
pub use error::{ProtocolError, Result};
pub use protocol::{HandshakeCore, MessageGenerator};
pub use transport::{InboundEvent, PeerClient};
