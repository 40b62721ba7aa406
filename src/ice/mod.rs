//! ICE support: candidate model, host gathering and ICE server lists
//!
//! This module provides:
//! - RFC 5245 candidate parsing, serialization and priorities
//! - Host-candidate enumeration from local interfaces
//! - The `RTCIceServer` list handed to WebRTC clients

mod candidate;
mod gatherer;
mod server;

pub use candidate::{priority, CandidateType, IceCandidate};
pub use gatherer::IceGatherer;
pub use server::{assemble, build_ice_servers, IceServer};
