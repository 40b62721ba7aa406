//! Error types and handling for the NAT traversal subsystem
//!
//! This module provides error types and conversion implementations for:
//! - TURN credential validation failures
//! - STUN wire-format decoding errors
//! - ICE candidate grammar errors
//! - Configuration errors
//!
//! Every error is returned synchronously to the caller. None of them leaves
//! the credential store in a partial state.

use std::io;
use thiserror::Error;

/// The main error type for the crate
#[derive(Error, Debug)]
pub enum Error {
    /// I/O errors from std::io
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// TURN credential validation errors
    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    /// STUN decoding errors
    #[error("STUN protocol error: {0}")]
    Stun(#[from] StunError),

    /// ICE candidate errors
    #[error("ICE error: {0}")]
    Ice(#[from] IceError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Outcome of a failed TURN credential check
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialError {
    /// Username was never issued, or has already been evicted
    #[error("invalid TURN credentials")]
    InvalidCredentials,

    /// Username is known but its TTL has elapsed
    #[error("TURN credentials expired")]
    Expired,

    /// Username is known and live, but the password does not match
    #[error("incorrect TURN password")]
    InvalidPassword,
}

/// STUN message encoding and decoding errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StunError {
    /// Buffer is shorter than the fixed 20-byte header
    #[error("STUN message too short ({len} bytes, need at least 20)")]
    TooShort { len: usize },

    /// Magic cookie field does not hold 0x2112A442
    #[error("invalid STUN magic cookie 0x{0:08x}")]
    BadMagicCookie(u32),

    /// An attribute declares more value bytes than the buffer holds
    #[error("attribute 0x{attr_type:04x} at offset {offset} declares {declared} bytes past end of buffer")]
    AttributeOverrun {
        attr_type: u16,
        offset: usize,
        declared: u16,
    },

    /// Attribute value does not fit the 16-bit length field
    #[error("attribute 0x{attr_type:04x} value of {len} bytes exceeds 65535")]
    AttributeTooLarge { attr_type: u16, len: usize },

    /// Padded attributes do not fit the 16-bit header length field
    #[error("STUN attributes total {len} bytes, exceeding 65535")]
    MessageTooLarge { len: usize },
}

/// ICE candidate errors
#[derive(Error, Debug)]
pub enum IceError {
    /// Candidate line does not follow the RFC 5245 grammar
    #[error("invalid ICE candidate format: {0}")]
    BadFormat(String),

    /// Local network interfaces could not be enumerated
    #[error("failed to get interfaces: {0}")]
    Interfaces(#[source] io::Error),
}

/// Result type alias for crate operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Convert the error to a STUN error code
    ///
    /// Lets a TURN-auth callback answer the relay with the matching code:
    /// - 400: Bad Request
    /// - 401: Unauthorized
    /// - 430: Stale Credentials
    /// - 500: Server Error
    pub fn to_stun_error_code(&self) -> u16 {
        match self {
            Error::Credential(CredentialError::InvalidCredentials) => 401,
            Error::Credential(CredentialError::InvalidPassword) => 401,
            Error::Credential(CredentialError::Expired) => 430,
            Error::Stun(_) => 400,
            Error::Ice(IceError::BadFormat(_)) => 400,
            Error::Ice(IceError::Interfaces(_)) => 500,
            Error::Config(_) => 500,
            Error::Io(_) => 500,
        }
    }
}
