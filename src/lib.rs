//! NAT traversal support for a WebRTC messaging bridge
//!
//! This crate provides ephemeral TURN credential issuance and validation
//! (REST-API shared-secret scheme), an RFC 5389 STUN message codec, and the
//! RFC 5245 ICE candidate model used when exchanging candidates over
//! signaling.

mod auth;
mod config;
mod error;
pub mod ice;
pub mod stun;
mod turn;
mod types;

// Re-export primary types
pub use config::{ManagerConfig, ServerConfig};
pub use error::Error;
pub use turn::{ManagerStats, TurnManager};

// Re-export the types
pub use types::*;

// Re-export error types for error handling
pub use error::{CredentialError, IceError, Result, StunError};

// Re-export credential primitives for relay-side verification
pub use auth::{CredentialGenerator, EXPIRING_SOON_WINDOW};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the logger for the NAT traversal subsystem
pub fn init_logger() {
    env_logger::init();
}
