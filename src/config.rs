//! # Configuration Management
//!
//! Centralized configuration for a handshake attempt.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Environment-specific overrides via `from_env()`
//! - Direct instantiation with defaults
//!
//! Durations are expressed in milliseconds in both TOML and environment
//! form. Defaults target a Bitcoin testnet3 node, matching the default
//! target of the binary (port 18333).

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, Result};
use crate::wire::constants::{PROTOCOL_VERSION, SERVICE_NODE_NETWORK, TESTNET_MAGIC};

/// Default deadline for the whole handshake attempt.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(60);

/// Default receive-loop wake interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Default bound on the inbound event channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 10;

/// Default cap on a single frame's advertised payload length.
pub const DEFAULT_MAX_PAYLOAD_SIZE: usize = 4 * 1024 * 1024;

/// All tunables of a handshake attempt.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HandshakeConfig {
    /// Network magic expected on, and stamped onto, every frame.
    pub magic: u32,

    /// Protocol version announced in the version message.
    pub protocol_version: i32,

    /// Service bits announced in the version message.
    pub services: u64,

    /// User agent announced in the version message.
    pub user_agent: String,

    /// Deadline for the whole handshake; elapsing it cancels the receive
    /// loop and the engine.
    #[serde(with = "duration_millis")]
    pub handshake_timeout: Duration,

    /// Receive-loop wake interval.
    #[serde(with = "duration_millis")]
    pub poll_interval: Duration,

    /// Bound of the inbound event channel; a full channel blocks the
    /// receive loop (intentional backpressure).
    pub channel_capacity: usize,

    /// Frames advertising a larger payload than this are discarded before
    /// any allocation.
    pub max_payload_size: usize,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            magic: TESTNET_MAGIC,
            protocol_version: PROTOCOL_VERSION,
            services: SERVICE_NODE_NETWORK,
            user_agent: String::from("/btc-handshake:0.1.0/"),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
        }
    }
}

impl HandshakeConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| ProtocolError::Config(format!("failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| ProtocolError::Config(format!("failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProtocolError::Config(format!("failed to parse TOML: {e}")))
    }

    /// Defaults overridden from `BTC_HANDSHAKE_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(agent) = std::env::var("BTC_HANDSHAKE_USER_AGENT") {
            config.user_agent = agent;
        }

        if let Ok(timeout) = std::env::var("BTC_HANDSHAKE_TIMEOUT_MS") {
            if let Ok(val) = timeout.parse::<u64>() {
                config.handshake_timeout = Duration::from_millis(val);
            }
        }

        if let Ok(capacity) = std::env::var("BTC_HANDSHAKE_CHANNEL_CAPACITY") {
            if let Ok(val) = capacity.parse::<usize>() {
                config.channel_capacity = val;
            }
        }

        Ok(config)
    }

    /// Validate the configuration for common misconfigurations.
    ///
    /// Returns a list of problems; an empty list means the configuration is
    /// usable.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.user_agent.len() > 256 {
            errors.push(format!(
                "user agent too long: {} bytes (maximum: 256)",
                self.user_agent.len()
            ));
        }

        if self.handshake_timeout.as_millis() < 100 {
            errors.push("handshake timeout too short (minimum: 100ms)".to_string());
        }

        if self.poll_interval.is_zero() {
            errors.push("poll interval must be greater than 0".to_string());
        } else if self.poll_interval > self.handshake_timeout {
            errors.push("poll interval exceeds the handshake timeout".to_string());
        }

        if self.channel_capacity == 0 {
            errors.push("channel capacity must be greater than 0".to_string());
        }

        if self.max_payload_size == 0 {
            errors.push("max payload size cannot be 0".to_string());
        } else if self.max_payload_size > 32 * 1024 * 1024 {
            errors.push(format!(
                "max payload size too large: {} bytes (maximum recommended: 32 MB)",
                self.max_payload_size
            ));
        }

        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::Config(format!(
                "configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Helper module for Duration serialization/deserialization as milliseconds
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(HandshakeConfig::default().validate().is_empty());
    }

    #[test]
    fn toml_roundtrip_with_millisecond_durations() {
        let config = HandshakeConfig::from_toml(
            r#"
            magic = 0xD9B4BEF9
            handshake_timeout = 2500
            user_agent = "/custom:1.0/"
            "#,
        )
        .unwrap();

        assert_eq!(config.magic, 0xD9B4BEF9);
        assert_eq!(config.handshake_timeout, Duration::from_millis(2500));
        assert_eq!(config.user_agent, "/custom:1.0/");
        // untouched fields keep their defaults
        assert_eq!(config.channel_capacity, DEFAULT_CHANNEL_CAPACITY);
    }

    #[test]
    fn invalid_values_are_reported() {
        let mut config = HandshakeConfig::default();
        config.channel_capacity = 0;
        config.handshake_timeout = Duration::from_millis(10);

        let errors = config.validate();
        assert_eq!(errors.len(), 2);
        assert!(config.validate_strict().is_err());
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        assert!(matches!(
            HandshakeConfig::from_toml("magic = \"not a number\""),
            Err(ProtocolError::Config(_))
        ));
    }
}
