pub mod auth;
pub mod health;
pub mod users;

pub use auth::{create_auth_routes, create_protected_auth_routes};
pub use health::create_health_routes;
pub use users::create_user_routes;
