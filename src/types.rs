//! Core type definitions shared across the crate
//!
//! This module provides:
//! - Relay transport protocols and their URL schemes
//! - Caller-facing TURN credential DTOs
//! - Wall-clock expiration handling
//! - TTL resolution against configured bounds

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, TimestampSeconds};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Transport a TURN server is reached over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Udp,
    Tcp,
    Tls,
}

impl Protocol {
    /// Builds the TURN URL for `host:port` over this transport
    pub fn turn_url(&self, host: &str, port: u16) -> String {
        match self {
            Protocol::Udp => format!("turn:{}:{}", host, port),
            Protocol::Tcp => format!("turn:{}:{}?transport=tcp", host, port),
            Protocol::Tls => format!("turns:{}:{}", host, port),
        }
    }

    /// Builds the STUN URL for `host:port`; STUN has no transport variants
    pub fn stun_url(host: &str, port: u16) -> String {
        format!("stun:{}:{}", host, port)
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Protocol::Udp => "udp",
            Protocol::Tcp => "tcp",
            Protocol::Tls => "tls",
        };
        f.write_str(s)
    }
}

/// Ephemeral TURN credentials handed to a caller for one server
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TurnCredentials {
    /// `<unix-expiry-seconds>:<session-id>`
    pub username: String,

    /// base64(HMAC-SHA1(secret, username))
    pub password: String,

    /// When these credentials stop validating
    #[serde_as(as = "TimestampSeconds<i64>")]
    pub expires: SystemTime,

    /// `turn:` / `turns:` URL of the relay
    pub turn_server_url: String,

    /// `stun:` URL of the same host
    pub stun_server_url: String,
}

/// Duration for which credentials are issued
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lifetime(pub Duration);

/// Wall-clock point at which a credential expires
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Expiration(pub SystemTime);

impl Lifetime {
    /// Resolves a requested TTL against configured bounds
    ///
    /// A zero request falls back to `default`; anything above `max` is
    /// clamped down to `max`.
    pub fn resolve(requested: Duration, default: Duration, max: Duration) -> Self {
        let ttl = if requested.is_zero() { default } else { requested };
        Self(ttl.min(max))
    }

    /// Gets the lifetime in seconds
    pub fn get(&self) -> u64 {
        self.0.as_secs()
    }
}

impl Expiration {
    /// Expiration `duration` after `from`, or `None` if that is past the
    /// range `SystemTime` can represent
    pub fn after(from: SystemTime, duration: Duration) -> Option<Self> {
        from.checked_add(duration).map(Self)
    }

    /// Checks if the expiration has strictly passed at `now`
    pub fn is_expired_at(&self, now: SystemTime) -> bool {
        now > self.0
    }

    /// Time left until expiry at `now`; zero once passed
    pub fn remaining_at(&self, now: SystemTime) -> Duration {
        self.0.duration_since(now).unwrap_or(Duration::ZERO)
    }

    /// Whole seconds since the Unix epoch, as embedded in usernames
    pub fn unix_secs(&self) -> u64 {
        self.0
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}
