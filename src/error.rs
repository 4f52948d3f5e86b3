use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::cache::CacheError;
use crate::database::DatabaseError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Already exists: {0}")]
    AlreadyExists(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Access token expired")]
    TokenExpired,
    #[error("Access token invalid: {0}")]
    TokenInvalid(String),
    #[error("Refresh session not found or expired")]
    SessionNotFound,
    #[error("Refresh token does not match the session")]
    SecretMismatch,
    #[error("Could not allocate a free username for '{0}'")]
    AllocationExhausted(String),
    #[error("Unsupported identity provider: {0}")]
    ProviderUnsupported(String),
    #[error("External identity incomplete: {0}")]
    ExternalIdentityIncomplete(String),
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("External provider error: {0}")]
    External(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// True only for a well-signed access token whose lifetime has passed
    pub fn is_token_expired(&self) -> bool {
        matches!(self, AppError::TokenExpired)
    }

    /// Stable machine-readable code used in error response bodies
    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "not_found",
            AppError::AlreadyExists(_) => "already_exists",
            AppError::Validation(_) => "validation_error",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::TokenExpired => "token_expired",
            AppError::TokenInvalid(_) => "token_invalid",
            AppError::SessionNotFound => "session_not_found",
            AppError::SecretMismatch => "secret_mismatch",
            AppError::AllocationExhausted(_) => "username_allocation_exhausted",
            AppError::ProviderUnsupported(_) => "provider_unsupported",
            AppError::ExternalIdentityIncomplete(_) => "external_identity_incomplete",
            AppError::Config(_) => "configuration_error",
            AppError::External(_) => "external",
            AppError::Internal(_) => "internal_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::AlreadyExists(_) => StatusCode::CONFLICT,
            AppError::Validation(_)
            | AppError::ProviderUnsupported(_)
            | AppError::ExternalIdentityIncomplete(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_)
            | AppError::TokenExpired
            | AppError::TokenInvalid(_)
            | AppError::SessionNotFound
            | AppError::SecretMismatch => StatusCode::UNAUTHORIZED,
            AppError::AllocationExhausted(_) => StatusCode::CONFLICT,
            AppError::External(_) => StatusCode::BAD_GATEWAY,
            AppError::Config(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DatabaseError> for AppError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound => AppError::NotFound("User not found".to_string()),
            DatabaseError::UsernameTaken(msg) => {
                AppError::AlreadyExists(format!("Username already taken: {}", msg))
            }
            DatabaseError::Constraint(msg) => AppError::AlreadyExists(msg),
            DatabaseError::Database(msg) | DatabaseError::Migration(msg) => {
                AppError::Internal(format!("Database error: {}", msg))
            }
        }
    }
}

impl From<CacheError> for AppError {
    fn from(err: CacheError) -> Self {
        AppError::Internal(format!("Cache error: {}", err))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error while handling request");
                "Internal server error".to_string()
            }
            AppError::Config(_) => "Configuration error".to_string(),
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": self.code(),
            "message": message
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_display() {
        let config_err = AppError::Config(config::ConfigError::NotFound("test".to_string()));
        assert!(config_err.to_string().contains("Configuration error"));

        let internal_err = AppError::Internal("test message".to_string());
        assert_eq!(internal_err.to_string(), "Internal error: test message");

        let unauthorized_err = AppError::Unauthorized("access denied".to_string());
        assert_eq!(unauthorized_err.to_string(), "Unauthorized: access denied");
    }

    #[test]
    fn test_token_expired_flag() {
        assert!(AppError::TokenExpired.is_token_expired());
        assert!(!AppError::TokenInvalid("bad signature".to_string()).is_token_expired());
        assert!(!AppError::SessionNotFound.is_token_expired());
    }

    #[test]
    fn test_database_error_conversion() {
        let app_err: AppError = DatabaseError::NotFound.into();
        assert!(matches!(app_err, AppError::NotFound(_)));

        let app_err: AppError = DatabaseError::UsernameTaken("alice".to_string()).into();
        assert!(matches!(app_err, AppError::AlreadyExists(_)));

        let app_err: AppError = DatabaseError::Database("connection reset".to_string()).into();
        assert!(matches!(app_err, AppError::Internal(_)));
    }

    #[test]
    fn test_app_error_into_response() {
        let response = AppError::TokenExpired.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = AppError::ProviderUnsupported("bitbucket".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = AppError::AlreadyExists("username".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = AppError::External("github unavailable".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let response = AppError::Internal("boom".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_error_response_body_format() {
        let response = AppError::SecretMismatch.into_response();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(value["error"], "secret_mismatch");
        assert_eq!(value["message"], "Refresh token does not match the session");
    }

    #[test]
    fn test_expired_and_invalid_codes_differ() {
        assert_ne!(
            AppError::TokenExpired.code(),
            AppError::TokenInvalid("x".to_string()).code()
        );
        assert_ne!(AppError::SessionNotFound.code(), AppError::SecretMismatch.code());
    }
}
