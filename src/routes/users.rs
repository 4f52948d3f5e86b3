use crate::{
    auth::SessionPayload,
    database::{ProfileUpdate, User},
    error::AppError,
    server::Server,
};
use axum::{
    Extension, Router,
    extract::State,
    response::Json,
    routing::get,
};

/// Profile routes; mounted behind `jwt_auth_middleware`
pub fn create_user_routes() -> Router<Server> {
    Router::new().route("/me", get(get_me).patch(update_me))
}

pub async fn get_me(
    State(server): State<Server>,
    Extension(session): Extension<SessionPayload>,
) -> Result<Json<User>, AppError> {
    let user = server.user_service.get_user(&session.user_id).await?;
    Ok(Json(user))
}

pub async fn update_me(
    State(server): State<Server>,
    Extension(session): Extension<SessionPayload>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<User>, AppError> {
    let user = server
        .user_service
        .update_profile(&session.user_id, update)
        .await?;
    Ok(Json(user))
}
