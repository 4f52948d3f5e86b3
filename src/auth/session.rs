use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Digits in a session nonce
pub const SESSION_NONCE_LENGTH: usize = 20;

/// Subject of an access token, and the key of its refresh session
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionPayload {
    pub user_id: String,
    pub session_nonce: String,
}

impl SessionPayload {
    /// Payload for `user_id` with a freshly generated nonce
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            session_nonce: generate_session_nonce(),
        }
    }

    pub fn with_nonce(user_id: impl Into<String>, session_nonce: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            session_nonce: session_nonce.into(),
        }
    }

    /// Same user, new nonce
    pub fn renewed(&self) -> Self {
        Self::new(self.user_id.clone())
    }

    /// Canonical JSON form, used as the refresh hash field
    pub fn cache_field(&self) -> Result<String, AppError> {
        serde_json::to_string(self)
            .map_err(|e| AppError::Internal(format!("Failed to encode session payload: {}", e)))
    }
}

/// Random decimal string of [`SESSION_NONCE_LENGTH`] digits
pub fn generate_session_nonce() -> String {
    let mut rng = rand::rng();
    (0..SESSION_NONCE_LENGTH)
        .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
        .collect()
}
