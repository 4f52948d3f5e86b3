use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::config::JwtConfig;
use crate::auth::session::SessionPayload;
use crate::error::AppError;
use crate::health::{HealthCheckResult, HealthChecker};

/// Accepts the HMAC family only; the signing key is a shared secret
pub fn parse_algorithm(alg: &str) -> Result<Algorithm, AppError> {
    match Algorithm::from_str(alg) {
        Ok(algorithm @ (Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512)) => Ok(algorithm),
        _ => Err(AppError::Validation(format!(
            "Unsupported JWT algorithm: {}",
            alg
        ))),
    }
}

/// Claims carried by an access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub user_id: String,
    pub session_nonce: String,
    pub iat: i64,
    pub exp: i64,
}

impl AccessClaims {
    /// Claims valid for `lifetime_secs` from now
    pub fn new(payload: &SessionPayload, lifetime_secs: i64) -> Self {
        let now = Utc::now().timestamp();
        Self {
            user_id: payload.user_id.clone(),
            session_nonce: payload.session_nonce.clone(),
            iat: now,
            exp: now.saturating_add(lifetime_secs),
        }
    }

    pub fn payload(&self) -> SessionPayload {
        SessionPayload::with_nonce(self.user_id.clone(), self.session_nonce.clone())
    }
}

/// Stateless access token issue/verify
pub trait AccessTokenCodec: Send + Sync {
    fn issue(&self, payload: &SessionPayload) -> Result<String, AppError>;

    /// Signature first, then expiry. Expired tokens yield
    /// [`AppError::TokenExpired`], anything else [`AppError::TokenInvalid`].
    fn verify(&self, token: &str) -> Result<SessionPayload, AppError>;

    fn lifetime(&self) -> Duration;
}

#[derive(Clone)]
pub struct JwtAccessTokenCodec {
    algorithm: Algorithm,
    lifetime: Duration,
    lifetime_secs: i64,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtAccessTokenCodec {
    pub fn new(secret: &str, algorithm: Algorithm, lifetime: Duration) -> Result<Self, AppError> {
        if !matches!(
            algorithm,
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
        ) {
            return Err(AppError::Validation(format!(
                "Unsupported JWT algorithm: {:?}",
                algorithm
            )));
        }
        if secret.is_empty() {
            return Err(AppError::Validation("JWT secret must not be empty".to_string()));
        }
        let lifetime_secs = i64::try_from(lifetime.as_secs()).map_err(|_| {
            AppError::Validation(format!(
                "Access token lifetime out of range: {}s",
                lifetime.as_secs()
            ))
        })?;

        Ok(Self {
            algorithm,
            lifetime,
            lifetime_secs,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        })
    }

    pub fn from_config(config: &JwtConfig) -> Result<Self, AppError> {
        let algorithm = parse_algorithm(&config.algorithm)?;
        Self::new(&config.secret, algorithm, config.access_token_lifetime())
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn encode_claims(&self, claims: &AccessClaims) -> Result<String, AppError> {
        encode(&Header::new(self.algorithm), claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))
    }

    pub fn decode_claims(&self, token: &str) -> Result<AccessClaims, AppError> {
        let mut validation = Validation::new(self.algorithm);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        decode::<AccessClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AppError::TokenExpired,
                _ => AppError::TokenInvalid(e.to_string()),
            })
    }

    /// Create a health checker for this codec
    pub fn health_checker(&self) -> Arc<JwtHealthChecker> {
        Arc::new(JwtHealthChecker {
            codec: self.clone(),
        })
    }
}

impl AccessTokenCodec for JwtAccessTokenCodec {
    fn issue(&self, payload: &SessionPayload) -> Result<String, AppError> {
        self.encode_claims(&AccessClaims::new(payload, self.lifetime_secs))
    }

    fn verify(&self, token: &str) -> Result<SessionPayload, AppError> {
        self.decode_claims(token).map(|claims| claims.payload())
    }

    fn lifetime(&self) -> Duration {
        self.lifetime
    }
}

/// Health checker implementation for the access token codec
pub struct JwtHealthChecker {
    codec: JwtAccessTokenCodec,
}

#[async_trait]
impl HealthChecker for JwtHealthChecker {
    fn name(&self) -> &str {
        "jwt"
    }

    async fn check(&self) -> HealthCheckResult {
        let probe = SessionPayload::new("health-check");
        let algorithm = format!("{:?}", self.codec.algorithm);

        let token = match self.codec.issue(&probe) {
            Ok(token) => token,
            Err(err) => {
                return HealthCheckResult::unhealthy_with_details(
                    "Failed to create test JWT token".to_string(),
                    serde_json::json!({
                        "algorithm": algorithm,
                        "token_creation": "failed",
                        "error": err.to_string()
                    }),
                );
            }
        };

        match self.codec.verify(&token) {
            Ok(payload) if payload == probe => {
                HealthCheckResult::healthy_with_details(serde_json::json!({
                    "algorithm": algorithm,
                    "token_creation": "success",
                    "token_validation": "success"
                }))
            }
            Ok(_) => HealthCheckResult::unhealthy_with_details(
                "Token validation returned incorrect claims".to_string(),
                serde_json::json!({
                    "algorithm": algorithm,
                    "token_creation": "success",
                    "token_validation": "failed",
                    "error": "claims mismatch"
                }),
            ),
            Err(err) => HealthCheckResult::unhealthy_with_details(
                "Failed to validate test JWT token".to_string(),
                serde_json::json!({
                    "algorithm": algorithm,
                    "token_creation": "success",
                    "token_validation": "failed",
                    "error": err.to_string()
                }),
            ),
        }
    }

    fn info(&self) -> Option<serde_json::Value> {
        Some(serde_json::json!({
            "service": "Access Token Codec",
            "algorithm": format!("{:?}", self.codec.algorithm),
            "lifetime_seconds": self.codec.lifetime.as_secs(),
        }))
    }
}
