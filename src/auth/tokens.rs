use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::auth::jwt::AccessTokenCodec;
use crate::auth::refresh::RefreshTokenStore;
use crate::auth::session::SessionPayload;
use crate::database::UserStore;
use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Issues, verifies and refreshes access tokens backed by refresh sessions
pub struct TokenService {
    codec: Arc<dyn AccessTokenCodec>,
    refresh_tokens: Arc<dyn RefreshTokenStore>,
    users: Arc<dyn UserStore>,
}

impl TokenService {
    pub fn new(
        codec: Arc<dyn AccessTokenCodec>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
        users: Arc<dyn UserStore>,
    ) -> Self {
        Self {
            codec,
            refresh_tokens,
            users,
        }
    }

    /// Access token lifetime in seconds
    pub fn expires_in(&self) -> u64 {
        self.codec.lifetime().as_secs()
    }

    /// Access token plus a refresh session, both bound to `payload`
    pub async fn issue_session(&self, payload: &SessionPayload) -> Result<TokenPair, AppError> {
        let access_token = self.codec.issue(payload)?;
        let refresh_token = self.refresh_tokens.issue(payload).await?;

        info!(user_id = %payload.user_id, "Session issued");
        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    pub fn verify(&self, token: &str) -> Result<SessionPayload, AppError> {
        self.codec.verify(token)
    }

    /// New access token for the session's user, under a fresh nonce.
    /// The refresh session's lifetime is left as is.
    pub async fn refresh(&self, payload: &SessionPayload, secret: &str) -> Result<String, AppError> {
        self.refresh_tokens.validate(payload, secret).await?;

        let user = self
            .users
            .find_by_id(&payload.user_id)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to load user for refresh: {}", e)))?;

        if !user.is_active() {
            warn!(user_id = %user.id, status = user.status.as_str(), "Refresh rejected for inactive user");
            return Err(AppError::Unauthorized(format!(
                "User account is {}",
                user.status.as_str()
            )));
        }

        self.codec.issue(&payload.renewed())
    }

    pub async fn reset_refresh_expiry(&self, payload: &SessionPayload) -> Result<(), AppError> {
        self.refresh_tokens.reset_expiry(payload).await
    }

    pub async fn revoke_session(&self, payload: &SessionPayload) -> Result<(), AppError> {
        self.refresh_tokens.revoke(payload).await
    }
}
