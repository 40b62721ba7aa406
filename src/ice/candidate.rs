//! ICE candidate model (RFC 5245 §15.1)
//!
//! ```text
//! candidate:<foundation> <component-id> <transport> <priority>
//!           <address> <port> typ <type> [raddr <addr> rport <port>]
//! ```

use crate::error::IceError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;

/// Candidate type, ordered by RFC 5245 type preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateType {
    Host,
    Srflx,
    Prflx,
    Relay,
}

/// A single ICE candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceCandidate {
    pub foundation: String,
    pub component_id: u16,
    pub transport: String,
    pub priority: u32,
    pub address: String,
    pub port: u16,
    #[serde(rename = "type")]
    pub candidate_type: CandidateType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_port: Option<u16>,
    pub protocol: String,
}

impl CandidateType {
    /// Type preference from RFC 5245 §4.1.2.2
    pub fn type_preference(&self) -> u32 {
        match self {
            CandidateType::Host => 126,
            CandidateType::Prflx => 110,
            CandidateType::Srflx => 100,
            CandidateType::Relay => 0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CandidateType::Host => "host",
            CandidateType::Srflx => "srflx",
            CandidateType::Prflx => "prflx",
            CandidateType::Relay => "relay",
        }
    }
}

impl fmt::Display for CandidateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CandidateType {
    type Err = IceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "host" => Ok(CandidateType::Host),
            "srflx" => Ok(CandidateType::Srflx),
            "prflx" => Ok(CandidateType::Prflx),
            "relay" => Ok(CandidateType::Relay),
            other => Err(IceError::BadFormat(format!(
                "unknown candidate type '{}'",
                other
            ))),
        }
    }
}

/// Candidate priority per RFC 5245 §4.1.2.1
///
/// `(2^24)*(type preference) + (2^8)*(local preference) + (256 - component ID)`.
/// Component IDs are clamped to 1..=256 so the last term stays in one byte.
pub fn priority(candidate_type: CandidateType, local_pref: u16, component_id: u16) -> u32 {
    let component = u32::from(component_id.clamp(1, 256));
    (candidate_type.type_preference() << 24) + (u32::from(local_pref) << 8) + (256 - component)
}

fn parse_field<T: FromStr>(token: &str, name: &str) -> Result<T, IceError> {
    token
        .parse()
        .map_err(|_| IceError::BadFormat(format!("invalid {} '{}'", name, token)))
}

impl IceCandidate {
    /// Builds a UDP host candidate with its priority already computed
    pub fn host(
        foundation: impl Into<String>,
        address: impl Into<String>,
        port: u16,
        component_id: u16,
        local_pref: u16,
    ) -> Self {
        Self {
            foundation: foundation.into(),
            component_id,
            transport: "udp".to_string(),
            priority: priority(CandidateType::Host, local_pref, component_id),
            address: address.into(),
            port,
            candidate_type: CandidateType::Host,
            related_address: None,
            related_port: None,
            protocol: "udp".to_string(),
        }
    }

    /// Parses a candidate attribute line
    ///
    /// An `a=` SDP prefix is accepted. Unknown trailing extension tokens
    /// (`generation`, `ufrag`, ...) are skipped.
    pub fn parse(line: &str) -> Result<Self, IceError> {
        let line = line.trim();
        let line = line.strip_prefix("a=").unwrap_or(line);
        let parts: Vec<&str> = line.split_whitespace().collect();

        if parts.len() < 8 {
            return Err(IceError::BadFormat(format!(
                "expected at least 8 fields, got {}",
                parts.len()
            )));
        }

        let foundation = parts[0]
            .strip_prefix("candidate:")
            .filter(|f| !f.is_empty())
            .ok_or_else(|| IceError::BadFormat("missing 'candidate:' prefix".into()))?;

        if parts[6] != "typ" {
            return Err(IceError::BadFormat(format!(
                "expected 'typ', got '{}'",
                parts[6]
            )));
        }

        let transport = parts[2].to_string();
        let mut candidate = Self {
            foundation: foundation.to_string(),
            component_id: parse_field(parts[1], "component id")?,
            protocol: transport.to_ascii_lowercase(),
            transport,
            priority: parse_field(parts[3], "priority")?,
            address: parts[4].to_string(),
            port: parse_field(parts[5], "port")?,
            candidate_type: parts[7].parse()?,
            related_address: None,
            related_port: None,
        };

        let mut rest = parts[8..].iter();
        while let Some(token) = rest.next() {
            match *token {
                "raddr" => {
                    if let Some(addr) = rest.next() {
                        candidate.related_address = Some(addr.to_string());
                    }
                }
                "rport" => {
                    if let Some(port) = rest.next() {
                        candidate.related_port = Some(parse_field(port, "related port")?);
                    }
                }
                _ => {}
            }
        }

        Ok(candidate)
    }

    /// `RTCIceCandidateInit`-shaped object for browser signaling
    pub fn to_json(&self) -> Value {
        let mut obj = json!({
            "candidate": self.to_string(),
            "sdpMid": "0",
            "sdpMLineIndex": 0,
        });
        if let Some(addr) = &self.related_address {
            obj["relatedAddress"] = json!(addr);
        }
        if let Some(port) = self.related_port {
            obj["relatedPort"] = json!(port);
        }
        obj
    }
}

impl FromStr for IceCandidate {
    type Err = IceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for IceCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "candidate:{} {} {} {} {} {} typ {}",
            self.foundation,
            self.component_id,
            self.transport,
            self.priority,
            self.address,
            self.port,
            self.candidate_type
        )?;
        if let Some(addr) = &self.related_address {
            write!(f, " raddr {}", addr)?;
        }
        if let Some(port) = self.related_port {
            write!(f, " rport {}", port)?;
        }
        Ok(())
    }
}
