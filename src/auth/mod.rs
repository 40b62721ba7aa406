// Credential issuance and validation for TURN relays (REST-API shared-secret scheme)
use crate::config::ServerConfig;
use crate::error::{CredentialError, Error, Result};
use crate::types::{Expiration, Lifetime, TurnCredentials};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use std::collections::HashMap;
use std::time::{Duration, SystemTime};
use subtle::ConstantTimeEq;
use tokio::sync::RwLock;

type HmacSha1 = Hmac<Sha1>;

// Credentials with less than this left count as "expiring soon" in stats
pub const EXPIRING_SOON_WINDOW: Duration = Duration::from_secs(5 * 60);

/// An issued credential as held by the store
#[derive(Debug, Clone)]
pub struct CredentialRecord {
    pub username: String,       // <expiry>:<session_id>
    pub password: String,       // base64 HMAC of username
    pub session_id: String,     // Session the credential was issued for
    pub expiration: Expiration, // Exact wall-clock expiry
    pub created_at: SystemTime, // When the credential was issued
}

/// Derives ephemeral username/password pairs from the shared secret
#[derive(Clone)]
pub struct CredentialGenerator {
    secret: String,
}

/// Concurrent map of live credentials keyed by username
#[derive(Default)]
pub struct CredentialStore {
    records: RwLock<HashMap<String, CredentialRecord>>,
}

/// Point-in-time counts over the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreSnapshot {
    pub total: usize,
    pub expiring_soon: usize,
}

impl CredentialGenerator {
    /// Creates a generator keyed with the relay's shared secret
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Builds the `<expiry>:<session_id>` username
    pub fn username(expiration: &Expiration, session_id: &str) -> String {
        format!("{}:{}", expiration.unix_secs(), session_id)
    }

    /// base64(HMAC-SHA1(secret, username))
    pub fn password(&self, username: &str) -> Result<String> {
        let mut mac = self.mac()?;
        mac.update(username.as_bytes());
        Ok(BASE64.encode(mac.finalize().into_bytes()))
    }

    /// Re-derives the password for `username` and compares it to `password`
    ///
    /// This is the stateless check a coturn-style relay performs with the
    /// same secret. It does not look at the expiry embedded in the username.
    pub fn verify(&self, username: &str, password: &str) -> bool {
        let decoded = match BASE64.decode(password) {
            Ok(d) => d,
            Err(_) => return false,
        };
        let mut mac = match self.mac() {
            Ok(m) => m,
            Err(_) => return false,
        };
        mac.update(username.as_bytes());
        mac.verify_slice(&decoded).is_ok()
    }

    /// Issues one credential per server, all sharing `expiration`
    ///
    /// Returns the caller-facing DTOs alongside the records to be stored.
    pub fn issue(
        &self,
        servers: &[ServerConfig],
        session_id: &str,
        lifetime: Lifetime,
    ) -> Result<Vec<(TurnCredentials, CredentialRecord)>> {
        let created_at = SystemTime::now();
        let expiration = Expiration::after(created_at, lifetime.0).ok_or_else(|| {
            Error::Config(format!("lifetime of {}s is out of range", lifetime.get()))
        })?;

        let mut issued = Vec::with_capacity(servers.len());
        for server in servers {
            let username = Self::username(&expiration, session_id);
            let password = self.password(&username)?;

            let creds = TurnCredentials {
                username: username.clone(),
                password: password.clone(),
                expires: expiration.0,
                turn_server_url: server.turn_url(),
                stun_server_url: server.stun_url(),
            };
            let record = CredentialRecord {
                username,
                password,
                session_id: session_id.to_string(),
                expiration,
                created_at,
            };
            issued.push((creds, record));
        }

        Ok(issued)
    }

    fn mac(&self) -> Result<HmacSha1> {
        HmacSha1::new_from_slice(self.secret.as_bytes())
            .map_err(|e| Error::Config(format!("invalid HMAC key: {}", e)))
    }
}

impl CredentialStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a record, replacing any record with the same username
    pub async fn insert(&self, record: CredentialRecord) {
        let mut records = self.records.write().await;
        records.insert(record.username.clone(), record);
    }

    /// Checks a presented username/password against the store
    ///
    /// Lookup, expiry check, eviction and password comparison all happen
    /// under one write guard, so a concurrent sweep never sees a half-done
    /// check. A successful check leaves the record in place.
    pub async fn validate(
        &self,
        username: &str,
        password: &str,
    ) -> std::result::Result<String, CredentialError> {
        let mut records = self.records.write().await;

        let expiration = records
            .get(username)
            .map(|record| record.expiration)
            .ok_or(CredentialError::InvalidCredentials)?;

        if expiration.is_expired_at(SystemTime::now()) {
            records.remove(username);
            return Err(CredentialError::Expired);
        }

        let record = records
            .get(username)
            .ok_or(CredentialError::InvalidCredentials)?;

        let matches: bool = record.password.as_bytes().ct_eq(password.as_bytes()).into();
        if !matches {
            return Err(CredentialError::InvalidPassword);
        }

        Ok(record.session_id.clone())
    }

    /// Removes every record whose expiry is at or before now
    ///
    /// Returns the number of records evicted.
    pub async fn cleanup_expired(&self) -> usize {
        let now = SystemTime::now();
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, record| record.expiration.0 > now);
        before - records.len()
    }

    /// Removes all records, returning how many were held
    pub async fn clear(&self) -> usize {
        let mut records = self.records.write().await;
        let count = records.len();
        records.clear();
        count
    }

    /// Counts all records and those within [`EXPIRING_SOON_WINDOW`] of expiry
    pub async fn snapshot(&self) -> StoreSnapshot {
        let now = SystemTime::now();
        let records = self.records.read().await;
        let expiring_soon = records
            .values()
            .filter(|r| r.expiration.remaining_at(now) < EXPIRING_SOON_WINDOW)
            .count();

        StoreSnapshot {
            total: records.len(),
            expiring_soon,
        }
    }
}
