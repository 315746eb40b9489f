/// Network magic values used in the Bitcoin P2P message header.
///
/// The first 4 bytes of every P2P message identify the network and act as a
/// message boundary marker in the TCP stream:
/// - Mainnet:  `0xD9B4BEF9`
/// - Testnet3: `0x0709110B`
/// - Regtest:  `0xDAB5BFFA`
///
/// Serialized little-endian, so testnet3 appears on the wire as
/// `0B 11 09 07`.
pub const TESTNET_MAGIC: u32 = 0x0709110B;

/// Mainnet magic value (`F9 BE B4 D9` on the wire).
pub const MAINNET_MAGIC: u32 = 0xD9B4BEF9;

/// P2P protocol version sent in the `version` message during handshake.
///
/// Serialized on the wire as a signed 32-bit little-endian integer. 70015
/// (Bitcoin Core 0.13.2+) is the newest version that needs no feature
/// negotiation beyond the plain version/verack exchange.
pub const PROTOCOL_VERSION: i32 = 70015;

/// Service bit advertising a full node able to serve the complete chain.
pub const SERVICE_NODE_NETWORK: u64 = 1;

/// Size of the fixed message header: magic(4) + command(12) + length(4) +
/// checksum(4).
pub const HEADER_SIZE: usize = 24;

/// Size of the zero-padded ASCII command field inside the header.
pub const COMMAND_SIZE: usize = 12;

/// Serialized size of a network address inside a `version` payload:
/// services(8) + ip(16) + port(2). No timestamp in this context.
pub const NET_ADDRESS_SIZE: usize = 26;

/// Wire command identifying a `version` payload.
pub const VERSION_COMMAND: &str = "version";

/// Wire command identifying a `verack` payload (always empty).
pub const VERACK_COMMAND: &str = "verack";
