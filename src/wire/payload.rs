//! Payload serialization for the handshake message pair.
//!
//! Two commands exist at this layer: `version`, carrying the capability
//! announcement below, and `verack`, whose payload is empty. Decoding
//! dispatches on the header command through [`Payload::decode`]; a command
//! without a decoder is a [`ProtocolError::UnknownCommand`].

use std::net::{IpAddr, Ipv6Addr};
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::{Buf, BufMut};

use crate::error::{ProtocolError, Result};
use crate::wire::codec;
use crate::wire::header::Command;

/// A peer network address as embedded in `version` payloads.
///
/// Serialized as exactly 26 bytes: services (8, LE), ip (16), port (2, BE).
/// The port is the single big-endian field in the whole protocol — a
/// protocol-mandated asymmetry, preserved here by giving the address its own
/// codec path instead of the generic little-endian helpers.
///
/// `timestamp` exists on the struct for address-book bookkeeping but is not
/// part of the wire form inside a version message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerAddress {
    pub timestamp: i64,
    pub services: u64,
    pub ip: Option<IpAddr>,
    pub port: u16,
}

impl PeerAddress {
    pub fn new(services: u64, ip: Option<IpAddr>, port: u16) -> Self {
        Self {
            timestamp: unix_now(),
            services,
            ip,
            port,
        }
    }

    /// Writes the fixed 26-byte form. A missing or IPv4 address is widened
    /// to 16 bytes (zero padding / IPv4-mapped IPv6) so the size never
    /// varies.
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u64_le(self.services);

        let octets: [u8; 16] = match self.ip {
            None => [0u8; 16],
            Some(IpAddr::V4(v4)) => v4.to_ipv6_mapped().octets(),
            Some(IpAddr::V6(v6)) => v6.octets(),
        };
        buf.put_slice(&octets);

        // Sigh. The protocol mixes little and big endian.
        buf.put_u16(self.port);
    }

    pub fn decode(buf: &mut impl Buf) -> Result<Self> {
        let services = codec::get_u64_le(buf)?;
        let octets: [u8; 16] = codec::get_array(buf)?;
        let port = codec::get_u16_be(buf)?;

        let ip = if octets == [0u8; 16] {
            None
        } else {
            let v6 = Ipv6Addr::from(octets);
            Some(match v6.to_ipv4_mapped() {
                Some(v4) => IpAddr::V4(v4),
                None => IpAddr::V6(v6),
            })
        };

        Ok(Self {
            timestamp: 0,
            services,
            ip,
            port,
        })
    }
}

/// The `version` capability/version announcement payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionPayload {
    pub version: i32,
    pub services: u64,
    pub timestamp: i64,
    pub addr_recv: PeerAddress,
    pub addr_from: PeerAddress,
    pub nonce: u64,
    pub user_agent: String,
    pub start_height: i32,
    pub relay: bool,
}

impl VersionPayload {
    /// Encodes in the fixed wire order: version, services, timestamp,
    /// addr_recv, addr_from, nonce, user_agent, start_height.
    ///
    /// The relay flag is deliberately not written: this side of the
    /// handshake sends the short pre-BIP37 form, which every peer accepts.
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_i32_le(self.version);
        buf.put_u64_le(self.services);
        buf.put_i64_le(self.timestamp);
        self.addr_recv.encode(buf);
        self.addr_from.encode(buf);
        buf.put_u64_le(self.nonce);
        codec::put_varstring(buf, &self.user_agent);
        buf.put_i32_le(self.start_height);
    }

    /// Decodes a version payload. The trailing relay byte is consumed when
    /// present and defaults to false otherwise, so frames from peers on
    /// either side of BIP 37 parse.
    pub fn decode(buf: &mut impl Buf) -> Result<Self> {
        let version = codec::get_i32_le(buf)?;
        let services = codec::get_u64_le(buf)?;
        let timestamp = codec::get_i64_le(buf)?;
        let addr_recv = PeerAddress::decode(buf)?;
        let addr_from = PeerAddress::decode(buf)?;
        let nonce = codec::get_u64_le(buf)?;
        let user_agent = codec::get_varstring(buf)?;
        let start_height = codec::get_i32_le(buf)?;
        let relay = if buf.has_remaining() {
            codec::get_bool(buf)?
        } else {
            false
        };

        Ok(Self {
            version,
            services,
            timestamp,
            addr_recv,
            addr_from,
            nonce,
            user_agent,
            start_height,
            relay,
        })
    }
}

/// A decoded payload, tagged by the command that selected its decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Version(VersionPayload),
    Verack,
}

impl Payload {
    /// Dispatches on the header command. Exactly one decoder exists per
    /// known command; anything else is a decode error, not fatal to the
    /// stream.
    pub fn decode(command: &Command, buf: &mut impl Buf) -> Result<Self> {
        match command {
            Command::Version => Ok(Payload::Version(VersionPayload::decode(buf)?)),
            Command::Verack => Ok(Payload::Verack),
            Command::Unknown(name) => Err(ProtocolError::UnknownCommand(name.clone())),
        }
    }
}

pub(crate) fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::constants::NET_ADDRESS_SIZE;
    use std::net::Ipv4Addr;

    fn addr(services: u64, ip: Option<IpAddr>, port: u16) -> PeerAddress {
        PeerAddress {
            timestamp: 0,
            services,
            ip,
            port,
        }
    }

    fn sample_version() -> VersionPayload {
        VersionPayload {
            version: 70015,
            services: 1,
            timestamp: 1_700_000_000,
            addr_recv: addr(1, Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))), 18333),
            addr_from: addr(1, None, 0),
            nonce: 0x1234_5678_90ab_cdef,
            user_agent: "/sensei:0.0.1/".into(),
            start_height: 0,
            relay: false,
        }
    }

    #[test]
    fn peer_address_is_exactly_26_bytes() {
        let mut buf = Vec::new();
        addr(1, Some(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1))), 8333).encode(&mut buf);
        assert_eq!(buf.len(), NET_ADDRESS_SIZE);
    }

    #[test]
    fn peer_address_port_is_big_endian() {
        let mut buf = Vec::new();
        addr(0, None, 18333).encode(&mut buf);
        // 18333 = 0x479d, written big-endian after services(8) + ip(16)
        assert_eq!(&buf[24..26], &[0x47, 0x9d]);
    }

    #[test]
    fn peer_address_ipv4_is_mapped_into_16_bytes() {
        let mut buf = Vec::new();
        addr(0, Some(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1))), 0).encode(&mut buf);
        assert_eq!(&buf[8..18], &[0u8; 10]);
        assert_eq!(&buf[18..20], &[0xff, 0xff]);
        assert_eq!(&buf[20..24], &[192, 168, 1, 1]);
    }

    #[test]
    fn peer_address_roundtrip() {
        for original in [
            addr(1, Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))), 8333),
            addr(0, None, 0),
            addr(
                u64::MAX,
                Some(IpAddr::V6(Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1))),
                u16::MAX,
            ),
        ] {
            let mut buf = Vec::new();
            original.encode(&mut buf);
            assert_eq!(PeerAddress::decode(&mut buf.as_slice()).unwrap(), original);
        }
    }

    #[test]
    fn version_payload_roundtrip() {
        let original = sample_version();
        let mut buf = Vec::new();
        original.encode(&mut buf);

        let decoded = VersionPayload::decode(&mut buf.as_slice()).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn version_decode_consumes_trailing_relay_byte() {
        let mut buf = Vec::new();
        sample_version().encode(&mut buf);
        buf.push(0x01);

        let decoded = VersionPayload::decode(&mut buf.as_slice()).unwrap();
        assert!(decoded.relay);
    }

    #[test]
    fn truncated_version_payload_is_decode_error() {
        let mut buf = Vec::new();
        sample_version().encode(&mut buf);
        buf.truncate(buf.len() - 3);

        assert!(matches!(
            VersionPayload::decode(&mut buf.as_slice()),
            Err(ProtocolError::Decode(_))
        ));
    }

    #[test]
    fn unknown_command_has_no_decoder() {
        let err = Payload::decode(&Command::Unknown("sendheaders".into()), &mut &[][..]);
        assert!(matches!(err, Err(ProtocolError::UnknownCommand(name)) if name == "sendheaders"));
    }

    #[test]
    fn verack_payload_is_empty() {
        assert_eq!(
            Payload::decode(&Command::Verack, &mut &[][..]).unwrap(),
            Payload::Verack
        );
    }
}
