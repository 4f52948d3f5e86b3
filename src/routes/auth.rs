use crate::{
    auth::{AuthenticatedSession, SessionPayload, TokenPair},
    database::User,
    error::AppError,
    identity::Provider,
    server::Server,
};
use axum::{
    Extension, Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::post,
};
use serde::{Deserialize, Serialize};

const TOKEN_TYPE: &str = "Bearer";

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub code: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub session: SessionPayload,
    pub user: User,
    pub is_new_user: bool,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub user_id: String,
    pub session_nonce: String,
    pub refresh_token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: u64,
}

/// Logout ends the bearer's refresh session named by `session_nonce`,
/// the nonce returned at login
#[derive(Debug, Deserialize)]
pub struct LogoutRequest {
    pub session_nonce: String,
}

pub fn create_auth_routes() -> Router<Server> {
    Router::new()
        .route("/{provider}/login", post(login_handler))
        .route("/refresh", post(refresh_handler))
}

pub fn create_protected_auth_routes() -> Router<Server> {
    Router::new().route("/logout", post(logout_handler))
}

pub async fn login_handler(
    State(server): State<Server>,
    Path(provider): Path<String>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let provider: Provider = provider.parse()?;
    if request.code.trim().is_empty() {
        return Err(AppError::Validation(
            "Missing authorization code".to_string(),
        ));
    }

    let identity = server
        .identity_providers
        .get(provider)?
        .fetch_identity(&request.code)
        .await?;

    let session = server
        .auth_service
        .authenticate_with_oauth(provider.as_str(), &identity)
        .await?;

    Ok(Json(login_response(
        session,
        server.auth_service.token_service().expires_in(),
    )))
}

pub async fn refresh_handler(
    State(server): State<Server>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<RefreshResponse>, AppError> {
    let payload = SessionPayload::with_nonce(request.user_id, request.session_nonce);
    let TokenPair {
        access_token,
        refresh_token,
    } = server
        .auth_service
        .refresh_session(&payload, &request.refresh_token)
        .await?;

    Ok(Json(RefreshResponse {
        access_token,
        refresh_token,
        token_type: TOKEN_TYPE.to_string(),
        expires_in: server.auth_service.token_service().expires_in(),
    }))
}

pub async fn logout_handler(
    State(server): State<Server>,
    Extension(current): Extension<SessionPayload>,
    Json(request): Json<LogoutRequest>,
) -> Result<StatusCode, AppError> {
    if request.session_nonce.trim().is_empty() {
        return Err(AppError::Validation("session_nonce is required".to_string()));
    }
    let payload = SessionPayload::with_nonce(current.user_id, request.session_nonce);
    server.auth_service.logout(&payload).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn login_response(session: AuthenticatedSession, expires_in: u64) -> LoginResponse {
    LoginResponse {
        access_token: session.tokens.access_token,
        refresh_token: session.tokens.refresh_token,
        token_type: TOKEN_TYPE.to_string(),
        expires_in,
        session: session.session,
        user: session.user,
        is_new_user: session.is_new_user,
    }
}
