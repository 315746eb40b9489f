//! Message framing: the 24-byte header and frame validation.
//!
//! Every P2P message travels as one frame:
//!
//! ```text
//! +------------+--------------+---------------+-------------+
//! | magic (4)  | command (12) | length (4 LE) | checksum(4) |
//! +------------+--------------+---------------+-------------+
//! | payload (length bytes)                              ... |
//! +---------------------------------------------------------+
//! ```
//!
//! The checksum is the first 4 bytes of `SHA256(SHA256(payload))`. Frame
//! validation checks the magic first and only hashes the payload when the
//! magic matches — a frame with both faults is classified as bad magic.

use bytes::{Buf, BufMut};
use sha2::{Digest, Sha256};

use crate::error::{ProtocolError, Result};
use crate::wire::codec;
use crate::wire::constants::{COMMAND_SIZE, VERACK_COMMAND, VERSION_COMMAND};

/// Two sequential SHA-256 passes over `data`.
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(Sha256::digest(data)).into()
}

/// Frame checksum: the first 4 bytes of the double hash.
pub fn checksum(payload: &[u8]) -> [u8; 4] {
    let digest = double_sha256(payload);
    [digest[0], digest[1], digest[2], digest[3]]
}

/// Wire command identifying which payload decoder applies to a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Version,
    Verack,
    /// Any command this client has no decoder for. Kept verbatim for logs.
    Unknown(String),
}

impl Command {
    pub fn as_str(&self) -> &str {
        match self {
            Command::Version => VERSION_COMMAND,
            Command::Verack => VERACK_COMMAND,
            Command::Unknown(name) => name,
        }
    }

    /// The zero-padded 12-byte header field for this command.
    pub fn to_field(&self) -> [u8; COMMAND_SIZE] {
        let mut field = [0u8; COMMAND_SIZE];
        let name = self.as_str().as_bytes();
        let n = name.len().min(COMMAND_SIZE);
        field[..n].copy_from_slice(&name[..n]);
        field
    }

    /// Parses a header command field, trimming the zero padding.
    pub fn from_field(field: &[u8; COMMAND_SIZE]) -> Self {
        let end = field
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(COMMAND_SIZE);
        let name = String::from_utf8_lossy(&field[..end]).into_owned();
        match name.as_str() {
            VERSION_COMMAND => Command::Version,
            VERACK_COMMAND => Command::Verack,
            _ => Command::Unknown(name),
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verdict of frame validation, in check order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameCheck {
    Valid,
    InvalidMagic { expected: u32, actual: u32 },
    InvalidChecksum { expected: [u8; 4], actual: [u8; 4] },
}

impl FrameCheck {
    /// The classified error for a failed check, or `None` when valid.
    pub fn into_error(self) -> Option<ProtocolError> {
        match self {
            FrameCheck::Valid => None,
            FrameCheck::InvalidMagic { expected, actual } => {
                Some(ProtocolError::InvalidMagic { expected, actual })
            }
            FrameCheck::InvalidChecksum { expected, actual } => {
                Some(ProtocolError::InvalidChecksum { expected, actual })
            }
        }
    }
}

/// Fixed-size header preceding every payload.
///
/// Built once per frame on send and receive, never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHeader {
    pub magic: u32,
    pub command: Command,
    pub length: u32,
    pub checksum: [u8; 4],
}

impl MessageHeader {
    /// Builds the header for `payload`, computing length and checksum from
    /// the actual bytes. An empty payload therefore carries the checksum of
    /// the empty byte string (`5d f6 e0 e2`), not zeros.
    pub fn for_payload(magic: u32, command: Command, payload: &[u8]) -> Self {
        Self {
            magic,
            command,
            length: payload.len() as u32,
            checksum: checksum(payload),
        }
    }

    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u32_le(self.magic);
        buf.put_slice(&self.command.to_field());
        buf.put_u32_le(self.length);
        buf.put_slice(&self.checksum);
    }

    pub fn decode(buf: &mut impl Buf) -> Result<Self> {
        let magic = codec::get_u32_le(buf)?;
        let command_field: [u8; COMMAND_SIZE] = codec::get_array(buf)?;
        let length = codec::get_u32_le(buf)?;
        let checksum: [u8; 4] = codec::get_array(buf)?;
        Ok(Self {
            magic,
            command: Command::from_field(&command_field),
            length,
            checksum,
        })
    }

    /// Validates a received frame against the expected network magic and the
    /// payload's double-hash checksum. The magic check short-circuits: the
    /// payload is not hashed for a frame from the wrong network.
    pub fn validate(&self, payload: &[u8], expected_magic: u32) -> FrameCheck {
        if self.magic != expected_magic {
            return FrameCheck::InvalidMagic {
                expected: expected_magic,
                actual: self.magic,
            };
        }
        let actual = checksum(payload);
        if self.checksum != actual {
            return FrameCheck::InvalidChecksum {
                expected: self.checksum,
                actual,
            };
        }
        FrameCheck::Valid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::constants::{HEADER_SIZE, TESTNET_MAGIC};

    #[test]
    fn empty_payload_checksum_is_protocol_constant() {
        // sha256d("") truncated to 4 bytes, the checksum every conforming
        // node puts on a verack frame.
        assert_eq!(checksum(&[]), [0x5d, 0xf6, 0xe0, 0xe2]);
    }

    #[test]
    fn header_roundtrip() {
        let header =
            MessageHeader::for_payload(TESTNET_MAGIC, Command::Version, b"some payload bytes");
        let mut buf = Vec::new();
        header.encode(&mut buf);
        assert_eq!(buf.len(), HEADER_SIZE);

        let decoded = MessageHeader::decode(&mut buf.as_slice()).unwrap();
        assert_eq!(decoded, header);
        assert_eq!(decoded.length, 18);
    }

    #[test]
    fn command_field_is_zero_padded() {
        let field = Command::Verack.to_field();
        assert_eq!(&field[..6], b"verack");
        assert!(field[6..].iter().all(|&b| b == 0));
        assert_eq!(Command::from_field(&field), Command::Verack);
    }

    #[test]
    fn unrecognised_command_is_preserved() {
        let mut field = [0u8; COMMAND_SIZE];
        field[..8].copy_from_slice(b"sendaddr");
        assert_eq!(
            Command::from_field(&field),
            Command::Unknown("sendaddr".into())
        );
    }

    #[test]
    fn valid_frame_passes() {
        let payload = b"hello node";
        let header = MessageHeader::for_payload(TESTNET_MAGIC, Command::Version, payload);
        assert_eq!(header.validate(payload, TESTNET_MAGIC), FrameCheck::Valid);
    }

    #[test]
    fn magic_check_precedes_checksum_check() {
        // Both the magic and the checksum are wrong; classification must be
        // bad magic because that check runs first.
        let payload = b"payload";
        let mut header = MessageHeader::for_payload(TESTNET_MAGIC, Command::Version, payload);
        header.magic = 0xDEADBEEF;
        header.checksum = [0; 4];
        assert!(matches!(
            header.validate(payload, TESTNET_MAGIC),
            FrameCheck::InvalidMagic { actual: 0xDEADBEEF, .. }
        ));
    }

    #[test]
    fn single_bit_flip_invalidates_checksum() {
        let payload = b"the quick brown fox".to_vec();
        let header = MessageHeader::for_payload(TESTNET_MAGIC, Command::Version, &payload);

        for bit in 0..payload.len() * 8 {
            let mut corrupted = payload.clone();
            corrupted[bit / 8] ^= 1 << (bit % 8);
            assert!(matches!(
                header.validate(&corrupted, TESTNET_MAGIC),
                FrameCheck::InvalidChecksum { .. }
            ));
        }
    }
}
