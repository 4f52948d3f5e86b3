pub mod config;
pub mod jwt;
pub mod middleware;
pub mod refresh;
pub mod service;
pub mod session;
pub mod tokens;

pub use jwt::{AccessClaims, AccessTokenCodec, JwtAccessTokenCodec, parse_algorithm};
pub use middleware::jwt_auth_middleware;
pub use refresh::{CacheRefreshTokenStore, RefreshTokenStore};
pub use service::{AuthService, AuthenticatedSession};
pub use session::SessionPayload;
pub use tokens::{TokenPair, TokenService};
