//! TURN credential manager
//!
//! This module ties the credential subsystem together:
//! - Ephemeral credential issuance per configured server
//! - Validation callbacks from the TURN relay
//! - Periodic cleanup of expired credentials
//! - Credential statistics
//! - Store-backed ICE server lists for WebRTC clients

use crate::auth::{CredentialGenerator, CredentialStore};
use crate::config::ManagerConfig;
use crate::error::{CredentialError, Result};
use crate::ice::{self, IceServer};
use crate::types::{Lifetime, TurnCredentials};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

mod cleanup;

pub use cleanup::CleanupScheduler;

/// Point-in-time statistics about issued credentials
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ManagerStats {
    /// Credentials currently held
    pub total_credentials: usize,

    /// Credentials with less than five minutes left
    pub expiring_soon: usize,

    /// Configured TURN servers
    #[serde(rename = "servers")]
    pub server_count: usize,
}

/// Issues and validates ephemeral TURN credentials.
///
/// One manager is constructed by the bridge process and shared by reference
/// (typically behind an `Arc`) with every signaling handler and with the
/// relay's auth callback. All methods take `&self` and are safe to call
/// concurrently for independent sessions.
pub struct TurnManager {
    config: Arc<ManagerConfig>,
    generator: CredentialGenerator,
    store: Arc<CredentialStore>,
    scheduler: Mutex<Option<CleanupScheduler>>,
}

impl TurnManager {
    /// Creates a manager with an empty store.
    ///
    /// # Errors
    /// Returns `Error::Config` if the configuration fails validation.
    pub fn new(config: ManagerConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            generator: CredentialGenerator::new(config.secret.clone()),
            config: Arc::new(config),
            store: Arc::new(CredentialStore::new()),
            scheduler: Mutex::new(None),
        })
    }

    /// Configuration this manager was built with
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Issues credentials for `session_id` on every configured server.
    ///
    /// A zero `ttl` falls back to the configured default and anything above
    /// the configured maximum is clamped. All returned credentials expire at
    /// the same instant and are recorded for later validation.
    ///
    /// Usernames are `<expiry>:<session_id>` and hence identical across
    /// servers, so one store entry validates all of them.
    pub async fn generate_credentials(
        &self,
        session_id: &str,
        ttl: Duration,
    ) -> Result<Vec<TurnCredentials>> {
        let lifetime = Lifetime::resolve(ttl, self.config.default_ttl, self.config.max_ttl);
        let issued = self
            .generator
            .issue(&self.config.servers, session_id, lifetime)?;

        let mut creds = Vec::with_capacity(issued.len());
        for (cred, record) in issued {
            self.store.insert(record).await;
            creds.push(cred);
        }

        log::debug!(
            "Issued {} TURN credentials for session {} (ttl {}s)",
            creds.len(),
            session_id,
            lifetime.get()
        );

        Ok(creds)
    }

    /// Validates credentials presented to the relay, returning the session ID.
    ///
    /// # Errors
    /// - `InvalidCredentials` if the username is unknown
    /// - `Expired` if the TTL has elapsed; the record is evicted
    /// - `InvalidPassword` if the password does not match
    pub async fn validate_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> std::result::Result<String, CredentialError> {
        let result = self.store.validate(username, password).await;
        if let Err(e) = &result {
            log::warn!("TURN credential check failed for {}: {}", username, e);
        }
        result
    }

    /// Evicts every credential whose expiry has passed.
    ///
    /// Returns the number of credentials evicted.
    pub async fn cleanup_expired(&self) -> usize {
        self.store.cleanup_expired().await
    }

    /// Returns a snapshot of credential statistics
    pub async fn get_stats(&self) -> ManagerStats {
        let snapshot = self.store.snapshot().await;
        ManagerStats {
            total_credentials: snapshot.total,
            expiring_soon: snapshot.expiring_soon,
            server_count: self.config.server_count(),
        }
    }

    /// Builds the ICE server list for a session.
    ///
    /// Unlike [`ice::build_ice_servers`], the TURN credentials are recorded
    /// in this manager's store so the relay's auth callback can validate them.
    pub async fn ice_servers(&self, session_id: &str, ttl: Duration) -> Result<Vec<IceServer>> {
        let creds = self.generate_credentials(session_id, ttl).await?;
        Ok(ice::assemble(&self.config.servers, &creds))
    }

    /// Starts the background cleanup task.
    ///
    /// Must be called from within a Tokio runtime. Calling it while the
    /// task is already running has no effect.
    pub async fn start(&self) {
        let mut scheduler = self.scheduler.lock().await;
        if scheduler.is_some() {
            return;
        }

        let interval = self.config.get_cleanup_interval();
        *scheduler = Some(CleanupScheduler::spawn(Arc::clone(&self.store), interval));
        log::info!(
            "TURN cleanup scheduler started (interval {}s)",
            interval.as_secs()
        );
    }

    /// Stops the cleanup task, waits for it to exit, and drops every credential.
    ///
    /// Intended to be called once at teardown. Credentials issued before the
    /// call no longer validate afterwards.
    pub async fn stop(&self) {
        let scheduler = self.scheduler.lock().await.take();
        if let Some(scheduler) = scheduler {
            scheduler.shutdown().await;
        }

        let removed = self.store.clear().await;
        log::info!(
            "TURN manager stopped, cleared {} outstanding credentials",
            removed
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::error::Error;
    use crate::types::Protocol;
    use std::time::SystemTime;

    fn config(servers: Vec<ServerConfig>) -> ManagerConfig {
        ManagerConfig {
            servers,
            secret: "test-secret".to_string(),
            default_ttl: Duration::from_secs(10 * 60),
            max_ttl: Duration::from_secs(60 * 60),
            cleanup_interval: Duration::from_secs(60),
        }
    }

    fn single_udp() -> ManagerConfig {
        let mut server = ServerConfig::new("turn.example.com", 3478, Protocol::Udp);
        server.realm = "example".to_string();
        config(vec![server])
    }

    fn remaining(creds: &TurnCredentials) -> Duration {
        creds
            .expires
            .duration_since(SystemTime::now())
            .unwrap_or(Duration::ZERO)
    }

    #[tokio::test]
    async fn test_generate_credentials() {
        let manager = TurnManager::new(single_udp()).unwrap();

        let creds = manager
            .generate_credentials("s1", Duration::from_secs(5 * 60))
            .await
            .unwrap();

        assert_eq!(creds.len(), 1);
        let cred = &creds[0];
        assert!(cred.username.contains("s1"));
        assert!(!cred.password.is_empty());
        assert_eq!(cred.turn_server_url, "turn:turn.example.com:3478");
        assert_eq!(cred.stun_server_url, "stun:turn.example.com:3478");

        let left = remaining(cred);
        assert!(left > Duration::from_secs(4 * 60) && left <= Duration::from_secs(5 * 60));

        assert_eq!(
            manager
                .validate_credentials(&cred.username, &cred.password)
                .await,
            Ok("s1".to_string())
        );
    }

    #[tokio::test]
    async fn test_validate_credentials_errors() {
        let manager = TurnManager::new(single_udp()).unwrap();
        let creds = manager
            .generate_credentials("test-session-123", Duration::from_secs(300))
            .await
            .unwrap();

        assert_eq!(
            manager
                .validate_credentials(&creds[0].username, "wrong-password")
                .await,
            Err(CredentialError::InvalidPassword)
        );
        assert_eq!(
            manager.validate_credentials("non-existent", "password").await,
            Err(CredentialError::InvalidCredentials)
        );

        let err = Error::from(CredentialError::InvalidPassword);
        assert_eq!(err.to_stun_error_code(), 401);
    }

    #[tokio::test]
    async fn test_credentials_expiry() {
        let manager = TurnManager::new(single_udp()).unwrap();
        let creds = manager
            .generate_credentials("test-session", Duration::from_millis(50))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(
            manager
                .validate_credentials(&creds[0].username, &creds[0].password)
                .await,
            Err(CredentialError::Expired)
        );
        assert_eq!(manager.get_stats().await.total_credentials, 0);
    }

    #[tokio::test]
    async fn test_cleanup_expired() {
        let manager = TurnManager::new(single_udp()).unwrap();
        manager
            .generate_credentials("test-session-1", Duration::from_millis(50))
            .await
            .unwrap();
        manager
            .generate_credentials("test-session-2", Duration::from_millis(50))
            .await
            .unwrap();

        assert_eq!(manager.get_stats().await.total_credentials, 2);

        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(manager.cleanup_expired().await, 2);
        assert_eq!(manager.get_stats().await.total_credentials, 0);

        // Second sweep with no new insertions changes nothing
        assert_eq!(manager.cleanup_expired().await, 0);
        assert_eq!(manager.get_stats().await.total_credentials, 0);
    }

    #[tokio::test]
    async fn test_get_stats() {
        let manager = TurnManager::new(config(vec![
            ServerConfig::new("turn1.example.com", 3478, Protocol::Udp),
            ServerConfig::new("turn2.example.com", 3478, Protocol::Udp),
        ]))
        .unwrap();

        manager
            .generate_credentials("session-1", Duration::from_secs(240))
            .await
            .unwrap();
        manager
            .generate_credentials("session-2", Duration::from_secs(600))
            .await
            .unwrap();
        manager
            .generate_credentials("session-3", Duration::from_secs(30))
            .await
            .unwrap();

        let stats = manager.get_stats().await;
        assert_eq!(stats.total_credentials, 3);
        assert_eq!(stats.server_count, 2);
        assert_eq!(stats.expiring_soon, 2);

        let json = serde_json::to_value(stats).unwrap();
        assert_eq!(json["total_credentials"], 3);
        assert_eq!(json["servers"], 2);
    }

    #[tokio::test]
    async fn test_ttl_bounds() {
        let mut cfg = single_udp();
        cfg.max_ttl = Duration::from_secs(30 * 60);
        let manager = TurnManager::new(cfg).unwrap();

        let creds = manager
            .generate_credentials("clamped", Duration::from_secs(60 * 60))
            .await
            .unwrap();
        let left = remaining(&creds[0]);
        assert!(left > Duration::from_secs(29 * 60) && left <= Duration::from_secs(30 * 60));

        let creds = manager
            .generate_credentials("defaulted", Duration::ZERO)
            .await
            .unwrap();
        let left = remaining(&creds[0]);
        assert!(left > Duration::from_secs(9 * 60) && left <= Duration::from_secs(10 * 60));
    }

    #[tokio::test]
    async fn test_protocol_urls() {
        let manager = TurnManager::new(config(vec![
            ServerConfig::new("turn.example.com", 3478, Protocol::Udp),
            ServerConfig::new("turn.example.com", 5349, Protocol::Tcp),
            ServerConfig::new("turn.example.com", 5350, Protocol::Tls),
        ]))
        .unwrap();

        let creds = manager
            .generate_credentials("test-session", Duration::from_secs(300))
            .await
            .unwrap();

        assert_eq!(creds.len(), 3);
        assert_eq!(creds[0].turn_server_url, "turn:turn.example.com:3478");
        assert_eq!(
            creds[1].turn_server_url,
            "turn:turn.example.com:5349?transport=tcp"
        );
        assert_eq!(creds[2].turn_server_url, "turns:turn.example.com:5350");

        for cred in &creds {
            assert_eq!(
                manager
                    .validate_credentials(&cred.username, &cred.password)
                    .await,
                Ok("test-session".to_string())
            );
        }
    }

    #[tokio::test]
    async fn test_ice_servers_are_validatable() {
        let manager = TurnManager::new(single_udp()).unwrap();
        let servers = manager
            .ice_servers("sess", Duration::from_secs(300))
            .await
            .unwrap();

        assert_eq!(servers.len(), 2);
        assert!(servers[0].username.is_none());

        let turn = &servers[1];
        assert_eq!(turn.urls, vec!["turn:turn.example.com:3478".to_string()]);
        let session = manager
            .validate_credentials(
                turn.username.as_deref().unwrap(),
                turn.credential.as_deref().unwrap(),
            )
            .await;
        assert_eq!(session, Ok("sess".to_string()));
    }

    #[tokio::test]
    async fn test_start_stop_lifecycle() {
        let mut cfg = single_udp();
        cfg.cleanup_interval = Duration::from_millis(50);
        let manager = TurnManager::new(cfg).unwrap();
        manager.start().await;
        manager.start().await;

        manager
            .generate_credentials("short", Duration::from_millis(20))
            .await
            .unwrap();
        let creds = manager
            .generate_credentials("long", Duration::from_secs(30))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(manager.get_stats().await.total_credentials, 1);

        manager.stop().await;
        assert_eq!(manager.get_stats().await.total_credentials, 0);
        assert_eq!(
            manager
                .validate_credentials(&creds[0].username, &creds[0].password)
                .await,
            Err(CredentialError::InvalidCredentials)
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_sessions() {
        let manager = Arc::new(TurnManager::new(single_udp()).unwrap());
        manager.start().await;

        let mut handles = Vec::new();
        for i in 0..64 {
            let manager = Arc::clone(&manager);
            handles.push(tokio::spawn(async move {
                let session = format!("session-{}", i);
                let creds = manager
                    .generate_credentials(&session, Duration::from_secs(60))
                    .await
                    .unwrap();
                let validated = manager
                    .validate_credentials(&creds[0].username, &creds[0].password)
                    .await
                    .unwrap();
                assert_eq!(validated, session);
                manager.cleanup_expired().await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(manager.get_stats().await.total_credentials, 64);
        manager.stop().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_validate_races_sweep_on_expired_record() {
        let manager = Arc::new(TurnManager::new(single_udp()).unwrap());
        let creds = manager
            .generate_credentials("racy", Duration::from_millis(20))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let mut validators = Vec::new();
        let mut sweepers = Vec::new();
        for _ in 0..32 {
            let m = Arc::clone(&manager);
            let (user, pass) = (creds[0].username.clone(), creds[0].password.clone());
            validators.push(tokio::spawn(async move {
                m.validate_credentials(&user, &pass).await
            }));

            let m = Arc::clone(&manager);
            sweepers.push(tokio::spawn(async move { m.cleanup_expired().await }));
        }

        let mut expired = 0;
        for handle in validators {
            match handle.await.unwrap() {
                Err(CredentialError::Expired) => expired += 1,
                Err(CredentialError::InvalidCredentials) => {}
                other => panic!("unexpected validation result: {:?}", other),
            }
        }
        let mut swept = 0;
        for handle in sweepers {
            swept += handle.await.unwrap();
        }

        // The single record is removed exactly once, by whichever got there first
        assert_eq!(expired + swept, 1);
        assert_eq!(manager.get_stats().await.total_credentials, 0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut cfg = single_udp();
        cfg.secret.clear();
        assert!(matches!(TurnManager::new(cfg), Err(Error::Config(_))));

        let mut cfg = single_udp();
        cfg.max_ttl = Duration::from_secs(u64::MAX);
        assert!(matches!(TurnManager::new(cfg), Err(Error::Config(_))));
    }
}
