//! Refresh sessions kept in a shared cache hash
//!
//! Every session is one field of a single hash: the field is the canonical
//! JSON of the [`SessionPayload`], the value is the refresh secret, and the
//! field's own TTL bounds the session lifetime.

use async_trait::async_trait;
use rand::RngCore;
use std::time::Duration;
use tracing::{debug, warn};

use crate::auth::config::SessionConfig;
use crate::auth::session::SessionPayload;
use crate::cache::{CacheManager, FieldHash};
use crate::error::AppError;

/// Random bytes behind each refresh secret
const REFRESH_SECRET_BYTES: usize = 32;

#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    /// Create a session for `payload` and return its secret
    async fn issue(&self, payload: &SessionPayload) -> Result<String, AppError>;

    /// [`AppError::SessionNotFound`] when absent or expired,
    /// [`AppError::SecretMismatch`] when `secret` differs
    async fn validate(&self, payload: &SessionPayload, secret: &str) -> Result<(), AppError>;

    /// Restart the session lifetime, keeping the secret
    async fn reset_expiry(&self, payload: &SessionPayload) -> Result<(), AppError>;

    /// Drop the session, [`AppError::SessionNotFound`] when absent or expired
    async fn revoke(&self, payload: &SessionPayload) -> Result<(), AppError>;
}

/// [`RefreshTokenStore`] over a [`FieldHash`]
#[derive(Clone)]
pub struct CacheRefreshTokenStore {
    sessions: FieldHash,
    ttl: Duration,
}

impl CacheRefreshTokenStore {
    pub fn new(sessions: FieldHash, ttl: Duration) -> Self {
        Self { sessions, ttl }
    }

    pub fn from_config(cache: &CacheManager, config: &SessionConfig) -> Result<Self, AppError> {
        let sessions = cache.hash(&config.hash_key)?;
        Ok(Self::new(sessions, config.refresh_token_lifetime()))
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Remaining lifetime of a session, if it is still live
    pub async fn remaining(&self, payload: &SessionPayload) -> Result<Option<Duration>, AppError> {
        Ok(self.sessions.ttl(&payload.cache_field()?).await?)
    }
}

/// 64 lowercase hex characters from a CSPRNG
pub fn generate_refresh_secret() -> String {
    let mut bytes = [0u8; REFRESH_SECRET_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[async_trait]
impl RefreshTokenStore for CacheRefreshTokenStore {
    async fn issue(&self, payload: &SessionPayload) -> Result<String, AppError> {
        let field = payload.cache_field()?;
        let secret = generate_refresh_secret();

        self.sessions.set_with_ttl(&field, &secret, self.ttl).await?;
        debug!(user_id = %payload.user_id, "Refresh session stored");
        Ok(secret)
    }

    async fn validate(&self, payload: &SessionPayload, secret: &str) -> Result<(), AppError> {
        let field = payload.cache_field()?;

        let Some(stored) = self.sessions.get(&field).await? else {
            warn!(user_id = %payload.user_id, "Refresh session not found or expired");
            return Err(AppError::SessionNotFound);
        };

        if !constant_time_eq(stored.as_bytes(), secret.as_bytes()) {
            warn!(user_id = %payload.user_id, "Refresh secret mismatch");
            return Err(AppError::SecretMismatch);
        }

        Ok(())
    }

    async fn reset_expiry(&self, payload: &SessionPayload) -> Result<(), AppError> {
        let field = payload.cache_field()?;

        if self.sessions.expire(&field, self.ttl).await? {
            Ok(())
        } else {
            Err(AppError::SessionNotFound)
        }
    }

    async fn revoke(&self, payload: &SessionPayload) -> Result<(), AppError> {
        let field = payload.cache_field()?;

        if self.sessions.delete(&field).await? {
            Ok(())
        } else {
            Err(AppError::SessionNotFound)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(ttl: Duration) -> CacheRefreshTokenStore {
        let cache = CacheManager::new_memory();
        CacheRefreshTokenStore::new(cache.hash("refresh_sessions").unwrap(), ttl)
    }

    #[test]
    fn test_secret_shape() {
        let secret = generate_refresh_secret();
        assert_eq!(secret.len(), 64);
        assert!(secret.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(secret, generate_refresh_secret());
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
    }

    #[tokio::test]
    async fn test_unissued_session_not_found() {
        let store = store(Duration::from_secs(60));
        let result = store.validate(&SessionPayload::new("u-1"), "whatever").await;
        assert!(matches!(result, Err(AppError::SessionNotFound)));
    }

    #[tokio::test]
    async fn test_issue_then_validate() {
        let store = store(Duration::from_secs(60));
        let payload = SessionPayload::new("u-1");

        let secret = store.issue(&payload).await.unwrap();

        assert!(store.validate(&payload, &secret).await.is_ok());
        assert!(matches!(
            store.validate(&payload, "wrong").await,
            Err(AppError::SecretMismatch)
        ));
    }

    #[tokio::test]
    async fn test_secret_bound_to_exact_payload() {
        let store = store(Duration::from_secs(60));
        let payload = SessionPayload::new("u-1");
        let secret = store.issue(&payload).await.unwrap();

        let other_nonce = payload.renewed();
        assert!(matches!(
            store.validate(&other_nonce, &secret).await,
            Err(AppError::SessionNotFound)
        ));

        let other_user = SessionPayload::with_nonce("u-2", payload.session_nonce.clone());
        assert!(matches!(
            store.validate(&other_user, &secret).await,
            Err(AppError::SessionNotFound)
        ));
    }

    #[tokio::test]
    async fn test_session_expires() {
        let store = store(Duration::from_millis(50));
        let payload = SessionPayload::new("u-1");
        let secret = store.issue(&payload).await.unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(matches!(
            store.validate(&payload, &secret).await,
            Err(AppError::SessionNotFound)
        ));
    }

    #[tokio::test]
    async fn test_reset_expiry_keeps_secret() {
        let store = store(Duration::from_secs(3600));
        let payload = SessionPayload::new("u-1");
        let secret = store.issue(&payload).await.unwrap();

        store.reset_expiry(&payload).await.unwrap();

        assert!(store.validate(&payload, &secret).await.is_ok());
        let remaining = store.remaining(&payload).await.unwrap().unwrap();
        assert!(remaining > Duration::from_secs(3500));
    }

    #[tokio::test]
    async fn test_reset_expiry_of_missing_session() {
        let store = store(Duration::from_secs(60));
        let result = store.reset_expiry(&SessionPayload::new("u-1")).await;
        assert!(matches!(result, Err(AppError::SessionNotFound)));
    }

    #[tokio::test]
    async fn test_revoke() {
        let store = store(Duration::from_secs(60));
        let payload = SessionPayload::new("u-1");
        let secret = store.issue(&payload).await.unwrap();

        store.revoke(&payload).await.unwrap();
        assert!(matches!(
            store.revoke(&payload).await,
            Err(AppError::SessionNotFound)
        ));

        assert!(matches!(
            store.validate(&payload, &secret).await,
            Err(AppError::SessionNotFound)
        ));
    }
}
