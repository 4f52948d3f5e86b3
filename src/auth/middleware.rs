use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use tracing::{debug, trace};

use crate::error::AppError;
use crate::server::Server;

/// Bearer token from the `Authorization` header
fn bearer_token(request: &Request) -> Result<&str, AppError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .ok_or_else(|| AppError::Unauthorized("Missing authentication credentials".to_string()))?;

    let value = header
        .to_str()
        .map_err(|_| AppError::Unauthorized("Invalid Authorization header".to_string()))?;

    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Invalid Authorization format".to_string()))
}

/// Verifies the access token and stores its `SessionPayload` in request extensions
pub async fn jwt_auth_middleware(
    State(server): State<Server>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let payload = {
        let token = bearer_token(&request)?;
        server.auth_service.verify_access_token(token).map_err(|e| {
            debug!(expired = e.is_token_expired(), "Access token rejected");
            e
        })?
    };

    trace!(user_id = %payload.user_id, "Authenticated request");
    request.extensions_mut().insert(payload);

    Ok(next.run(request).await)
}
