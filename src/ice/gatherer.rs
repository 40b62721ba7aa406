//! Local host-candidate enumeration
//!
//! Only host candidates are gathered here. Server-reflexive and relay
//! candidates come out of live STUN/TURN exchanges, which the peer's WebRTC
//! stack performs itself using the server list from [`super::server`].

use crate::config::ManagerConfig;
use crate::error::IceError;
use crate::ice::candidate::IceCandidate;
use std::net::IpAddr;
use tokio::sync::Mutex;

/// Local preference of the first gathered address; later ones count down
const BASE_LOCAL_PREFERENCE: u16 = 65535;

/// Gathers ICE candidates for one peer connection
pub struct IceGatherer {
    stun_urls: Vec<String>,
    candidates: Mutex<Vec<IceCandidate>>,
}

impl IceGatherer {
    /// Creates a gatherer for the servers in `config`
    pub fn new(config: &ManagerConfig) -> Self {
        Self {
            stun_urls: config.servers.iter().map(|s| s.stun_url()).collect(),
            candidates: Mutex::new(Vec::new()),
        }
    }

    /// `stun:` URL of every configured server
    pub fn stun_urls(&self) -> &[String] {
        &self.stun_urls
    }

    /// Enumerates non-loopback interface addresses as host candidates
    ///
    /// Ports are left at 0 for the WebRTC stack to assign. Each distinct
    /// address gets its own foundation and a descending local preference.
    pub async fn gather_host_candidates(&self) -> Result<Vec<IceCandidate>, IceError> {
        let interfaces = if_addrs::get_if_addrs().map_err(IceError::Interfaces)?;
        let addrs: Vec<IpAddr> = interfaces
            .iter()
            .filter(|iface| !iface.is_loopback())
            .map(|iface| iface.ip())
            .collect();

        let gathered = host_candidates(&addrs);
        log::debug!("Gathered {} host candidates", gathered.len());

        let mut candidates = self.candidates.lock().await;
        candidates.extend(gathered.iter().cloned());

        Ok(gathered)
    }

    /// Copy of every candidate gathered so far
    pub async fn candidates(&self) -> Vec<IceCandidate> {
        self.candidates.lock().await.clone()
    }
}

fn host_candidates(addrs: &[IpAddr]) -> Vec<IceCandidate> {
    let mut seen: Vec<IpAddr> = Vec::new();
    for addr in addrs {
        if addr.is_loopback() || addr.is_unspecified() || seen.contains(addr) {
            continue;
        }
        seen.push(*addr);
    }

    seen.iter()
        .enumerate()
        .map(|(i, addr)| {
            let local_pref = BASE_LOCAL_PREFERENCE.saturating_sub(i as u16);
            IceCandidate::host((i + 1).to_string(), addr.to_string(), 0, 1, local_pref)
        })
        .collect()
}
