//! Client-facing ICE server list
//!
//! The output is consumed verbatim as an `RTCIceServer[]` by the peer's
//! WebRTC stack, so the JSON shape and URL schemes are fixed.

use crate::auth::CredentialGenerator;
use crate::config::{ManagerConfig, ServerConfig};
use crate::error::Result;
use crate::types::{Lifetime, TurnCredentials};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One entry of an `RTCIceServer` list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServer {
    pub urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

impl IceServer {
    /// STUN-only entry, no credentials
    pub fn stun(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            username: None,
            credential: None,
        }
    }

    /// TURN entry carrying the issued credentials
    pub fn turn(creds: &TurnCredentials) -> Self {
        Self {
            urls: vec![creds.turn_server_url.clone()],
            username: Some(creds.username.clone()),
            credential: Some(creds.password.clone()),
        }
    }
}

/// One STUN entry per server followed by one TURN entry per credential
pub fn assemble(servers: &[ServerConfig], creds: &[TurnCredentials]) -> Vec<IceServer> {
    servers
        .iter()
        .map(|s| IceServer::stun(s.stun_url()))
        .chain(creds.iter().map(IceServer::turn))
        .collect()
}

/// Builds the ICE server list for a session without touching any store
///
/// The TURN credentials are derived from the shared secret alone, so only a
/// relay that re-derives the HMAC can check them. Use
/// [`TurnManager::ice_servers`](crate::TurnManager::ice_servers) when the
/// bridge itself must validate them later.
pub fn build_ice_servers(
    config: &ManagerConfig,
    session_id: &str,
    ttl: Duration,
) -> Result<Vec<IceServer>> {
    let lifetime = Lifetime::resolve(ttl, config.default_ttl, config.max_ttl);
    let creds: Vec<TurnCredentials> = CredentialGenerator::new(config.secret.clone())
        .issue(&config.servers, session_id, lifetime)?
        .into_iter()
        .map(|(creds, _)| creds)
        .collect();

    Ok(assemble(&config.servers, &creds))
}
