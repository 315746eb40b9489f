//! Builds the outgoing `version` announcement.

use std::net::IpAddr;

use crate::wire::payload::unix_now;
use crate::wire::{PeerAddress, VersionPayload};

/// Factory for the version message this node announces itself with.
///
/// Carries the static identity fields; the peer addresses are filled in per
/// call from the connection's endpoints.
#[derive(Debug, Clone)]
pub struct MessageGenerator {
    protocol_version: i32,
    services: u64,
    user_agent: String,
    start_height: i32,
}

impl MessageGenerator {
    pub fn new(protocol_version: i32, services: u64, user_agent: impl Into<String>) -> Self {
        Self {
            protocol_version,
            services,
            user_agent: user_agent.into(),
            start_height: 0,
        }
    }

    /// Builds a fresh version message addressed from `local` to `remote`.
    ///
    /// A host that is not a literal IP address (a DNS name) serializes as
    /// the zero address; the node answers with our white IP regardless, so
    /// nothing downstream depends on it.
    pub fn version_message(
        &self,
        remote_host: &str,
        remote_port: u16,
        local_host: &str,
        local_port: u16,
    ) -> VersionPayload {
        VersionPayload {
            version: self.protocol_version,
            services: self.services,
            timestamp: unix_now(),
            addr_recv: PeerAddress::new(
                self.services,
                remote_host.parse::<IpAddr>().ok(),
                remote_port,
            ),
            addr_from: PeerAddress::new(
                self.services,
                local_host.parse::<IpAddr>().ok(),
                local_port,
            ),
            nonce: rand::random::<u64>(),
            user_agent: self.user_agent.clone(),
            start_height: self.start_height,
            relay: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::constants::{PROTOCOL_VERSION, SERVICE_NODE_NETWORK};
    use std::net::Ipv4Addr;

    #[test]
    fn version_message_carries_connection_endpoints() {
        let generator = MessageGenerator::new(PROTOCOL_VERSION, SERVICE_NODE_NETWORK, "/test:0.1/");
        let msg = generator.version_message("10.0.0.2", 18333, "127.0.0.1", 0);

        assert_eq!(msg.version, PROTOCOL_VERSION);
        assert_eq!(msg.services, SERVICE_NODE_NETWORK);
        assert_eq!(
            msg.addr_recv.ip,
            Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)))
        );
        assert_eq!(msg.addr_recv.port, 18333);
        assert_eq!(
            msg.addr_from.ip,
            Some(IpAddr::V4(Ipv4Addr::LOCALHOST))
        );
        assert_eq!(msg.user_agent, "/test:0.1/");
        assert!(msg.timestamp > 0);
    }

    #[test]
    fn hostname_serializes_as_zero_address() {
        let generator = MessageGenerator::new(PROTOCOL_VERSION, 0, "/test:0.1/");
        let msg = generator.version_message("seed.example.org", 8333, "127.0.0.1", 0);
        assert!(msg.addr_recv.ip.is_none());
    }

    #[test]
    fn nonces_differ_between_messages() {
        let generator = MessageGenerator::new(PROTOCOL_VERSION, 0, "/test:0.1/");
        let a = generator.version_message("10.0.0.2", 18333, "127.0.0.1", 0);
        let b = generator.version_message("10.0.0.2", 18333, "127.0.0.1", 0);
        assert_ne!(a.nonce, b.nonce);
    }
}
