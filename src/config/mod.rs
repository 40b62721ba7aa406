//! Configuration module for the NAT traversal subsystem
//!
//! This module provides configuration structures and functionality for:
//! - STUN/TURN server endpoints (host, port, transport, realm)
//! - The shared secret used to derive ephemeral credentials
//! - Credential TTL bounds
//! - The cleanup sweep interval

use crate::error::{Error, Result};
use crate::types::Protocol;
use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use serde_with::DurationSeconds;
use std::time::Duration;

/// Upper bound accepted for `max_ttl`
pub const MAX_TTL_LIMIT: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// A single STUN/TURN server endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server hostname or IP
    pub host: String,

    /// Server port
    pub port: u16,

    /// Transport used to reach the relay
    #[serde(default)]
    pub protocol: Protocol,

    /// TURN realm (for auth)
    #[serde(default)]
    pub realm: String,
}

/// Configuration for a [`TurnManager`](crate::TurnManager)
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// TURN servers, in the order credentials are issued for them
    pub servers: Vec<ServerConfig>,

    /// Shared secret known to the relay
    pub secret: String,

    /// TTL used when the caller passes zero
    #[serde_as(as = "DurationSeconds<u64>")]
    pub default_ttl: Duration,

    /// Upper bound on any issued TTL
    #[serde_as(as = "DurationSeconds<u64>")]
    pub max_ttl: Duration,

    /// How often the cleanup scheduler sweeps expired credentials
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval: Duration,
}

fn default_cleanup_interval() -> Duration {
    Duration::from_secs(60)
}

impl ServerConfig {
    /// Creates a server entry with an empty realm
    pub fn new(host: impl Into<String>, port: u16, protocol: Protocol) -> Self {
        Self {
            host: host.into(),
            port,
            protocol,
            realm: String::new(),
        }
    }

    /// TURN URL for this server
    pub fn turn_url(&self) -> String {
        self.protocol.turn_url(&self.host, self.port)
    }

    /// STUN URL for this server
    pub fn stun_url(&self) -> String {
        Protocol::stun_url(&self.host, self.port)
    }
}

impl ManagerConfig {
    /// Number of configured servers
    pub fn server_count(&self) -> usize {
        self.servers.len()
    }

    /// Get cleanup interval duration
    pub fn get_cleanup_interval(&self) -> Duration {
        self.cleanup_interval
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.servers.is_empty() {
            return Err(Error::Config("at least one server is required".into()));
        }
        for server in &self.servers {
            if server.host.is_empty() {
                return Err(Error::Config("server host must not be empty".into()));
            }
            if server.port == 0 {
                return Err(Error::Config(format!(
                    "port must be greater than 0 for {}",
                    server.host
                )));
            }
        }

        if self.secret.is_empty() {
            return Err(Error::Config("secret must not be empty".into()));
        }

        if self.default_ttl.is_zero() {
            return Err(Error::Config("default_ttl must be greater than 0".into()));
        }
        if self.max_ttl.is_zero() {
            return Err(Error::Config("max_ttl must be greater than 0".into()));
        }
        if self.max_ttl > MAX_TTL_LIMIT {
            return Err(Error::Config(format!(
                "max_ttl must not exceed {}s",
                MAX_TTL_LIMIT.as_secs()
            )));
        }
        if self.default_ttl > self.max_ttl {
            return Err(Error::Config("default_ttl must not exceed max_ttl".into()));
        }
        if self.cleanup_interval.is_zero() {
            return Err(Error::Config(
                "cleanup_interval must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        let config: ManagerConfig = serde_json::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config file: {}", e)))?;

        config.validate()?;

        Ok(config)
    }
}

// Secret is a placeholder; deployments must override it
impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            servers: vec![ServerConfig {
                host: "matrix.armorclaw.com".to_string(),
                port: 3478,
                protocol: Protocol::Udp,
                realm: "armorclaw".to_string(),
            }],
            secret: "change-me-to-a-strong-random-secret".to_string(),
            default_ttl: Duration::from_secs(10 * 60),
            max_ttl: Duration::from_secs(60 * 60),
            cleanup_interval: default_cleanup_interval(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ManagerConfig::default();

        assert_eq!(config.server_count(), 1);
        assert_eq!(config.servers[0].port, 3478);
        assert_eq!(config.servers[0].protocol, Protocol::Udp);
        assert_eq!(config.servers[0].realm, "armorclaw");
        assert_eq!(config.default_ttl, Duration::from_secs(600));
        assert_eq!(config.max_ttl, Duration::from_secs(3600));
        assert_eq!(config.get_cleanup_interval(), Duration::from_secs(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_server_urls() {
        let server = ServerConfig::new("turn.example.com", 5349, Protocol::Tcp);
        assert_eq!(server.turn_url(), "turn:turn.example.com:5349?transport=tcp");
        assert_eq!(server.stun_url(), "stun:turn.example.com:5349");
    }

    #[test]
    fn test_config_validation() {
        let mut config = ManagerConfig::default();

        config.servers.clear();
        assert!(config.validate().is_err());

        config.servers = vec![ServerConfig::new("turn.example.com", 0, Protocol::Udp)];
        assert!(config.validate().is_err());

        config.servers[0].port = 3478;
        config.secret.clear();
        assert!(config.validate().is_err());

        config.secret = "s3cret".into();
        config.default_ttl = Duration::from_secs(7200);
        assert!(config.validate().is_err());

        config.default_ttl = Duration::from_secs(600);
        config.cleanup_interval = Duration::ZERO;
        assert!(config.validate().is_err());

        config.cleanup_interval = Duration::from_secs(30);
        assert!(config.validate().is_ok());

        config.max_ttl = Duration::from_secs(u64::MAX);
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        config.max_ttl = MAX_TTL_LIMIT;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_file_loading() {
        let config_str = r#"
        {
            "servers": [
                { "host": "turn1.example.com", "port": 3478, "protocol": "udp", "realm": "example" },
                { "host": "turn2.example.com", "port": 5349, "protocol": "tls" }
            ],
            "secret": "test_secret",
            "default_ttl": 300,
            "max_ttl": 1800
        }"#;

        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("config.json");
        std::fs::write(&config_path, config_str).unwrap();

        let config = ManagerConfig::from_file(&config_path).unwrap();

        assert_eq!(config.server_count(), 2);
        assert_eq!(config.servers[0].realm, "example");
        assert_eq!(config.servers[1].protocol, Protocol::Tls);
        assert_eq!(config.servers[1].realm, "");
        assert_eq!(config.secret, "test_secret");
        assert_eq!(config.default_ttl, Duration::from_secs(300));
        assert_eq!(config.max_ttl, Duration::from_secs(1800));
        assert_eq!(config.cleanup_interval, Duration::from_secs(60));
    }

    #[test]
    fn test_config_file_rejects_invalid() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("config.json");
        std::fs::write(
            &config_path,
            r#"{ "servers": [], "secret": "x", "default_ttl": 60, "max_ttl": 60 }"#,
        )
        .unwrap();

        let err = ManagerConfig::from_file(&config_path).unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let missing = ManagerConfig::from_file(temp_dir.path().join("nope.json"));
        assert!(matches!(missing, Err(Error::Config(_))));
    }
}
