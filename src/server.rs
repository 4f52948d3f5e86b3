use crate::{
    auth::{
        AuthService, CacheRefreshTokenStore, JwtAccessTokenCodec, TokenService,
        middleware::jwt_auth_middleware,
    },
    cache::CacheManager,
    config::Config,
    database::{DatabaseManager, UserStore},
    error::AppError,
    health::HealthService,
    identity::{IdentityProvider, IdentityProviders},
    routes::{
        create_auth_routes, create_health_routes, create_protected_auth_routes,
        create_user_routes,
    },
    users::UserService,
};
use axum::{Router, middleware};
use std::sync::Arc;
use tokio::{net::TcpListener, signal};
use tracing::{error, info};

#[derive(Clone)]
pub struct Server {
    pub config: Arc<Config>,
    pub auth_service: Arc<AuthService>,
    pub user_service: Arc<UserService>,
    pub identity_providers: IdentityProviders,
    pub health_service: Arc<HealthService>,
    pub database: Option<Arc<DatabaseManager>>,
}

impl Server {
    /// Build the server from configuration: cache backend, database and services
    pub async fn new(config: Config) -> Result<Self, AppError> {
        config.validate()?;

        let cache = CacheManager::new_from_config(&config.cache).await?;
        info!(backend = %config.cache.backend, "Cache initialized");

        let database = Arc::new(
            DatabaseManager::new_from_config(&config.database)
                .await
                .map_err(AppError::from)?,
        );
        info!("Database connection established");

        let identity_providers = IdentityProviders::from_config(&config.oauth)?;
        info!(providers = ?identity_providers.registered(), "Identity providers configured");

        let users: Arc<dyn UserStore> = Arc::new(database.users());
        let mut server = Self::with_components(config, users, cache).await?;
        server.identity_providers = identity_providers;
        server.health_service.register(database.clone()).await;
        server.database = Some(database);

        Ok(server)
    }

    /// Build the server over an explicit user store and cache
    pub async fn with_components(
        config: Config,
        users: Arc<dyn UserStore>,
        cache: CacheManager,
    ) -> Result<Self, AppError> {
        let codec = JwtAccessTokenCodec::from_config(&config.jwt)?;
        let refresh_tokens = CacheRefreshTokenStore::from_config(&cache, &config.session)?;

        let tokens = Arc::new(TokenService::new(
            Arc::new(codec.clone()),
            Arc::new(refresh_tokens),
            users.clone(),
        ));
        let auth_service = Arc::new(AuthService::new(users.clone(), tokens));
        let user_service = Arc::new(UserService::new(users));

        let health_service = Arc::new(HealthService::new());
        health_service.register(Arc::new(cache)).await;
        health_service.register(codec.health_checker()).await;

        Ok(Self {
            config: Arc::new(config),
            auth_service,
            user_service,
            identity_providers: IdentityProviders::new(),
            health_service,
            database: None,
        })
    }

    pub fn with_identity_provider(mut self, provider: Arc<dyn IdentityProvider>) -> Self {
        self.identity_providers.register(provider);
        self
    }

    pub async fn run(&self) -> Result<(), AppError> {
        if let Some(database) = &self.database {
            if self.config.database.migration_on_startup {
                database.migrate().await?;
            }
        }

        let app = self.create_app();

        let addr = format!("{}:{}", self.config.server.host, self.config.server.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to bind to address: {}", e)))?;

        info!("Server listening on http://{}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| AppError::Internal(format!("Server error: {}", e)))?;

        info!("Server shutdown complete");
        Ok(())
    }

    // Creates an application router
    pub fn create_app(&self) -> Router {
        Router::new()
            .nest(
                "/auth",
                create_auth_routes().merge(self.with_jwt_auth(create_protected_auth_routes())),
            )
            .nest("/users", self.with_jwt_auth(create_user_routes()))
            .nest("/health", create_health_routes())
            .with_state(self.clone())
    }

    fn with_jwt_auth(&self, routes: Router<Server>) -> Router<Server> {
        routes.layer(middleware::from_fn_with_state(
            self.clone(),
            jwt_auth_middleware,
        ))
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C signal"),
        _ = terminate => info!("Received terminate signal"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryUserStore;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    fn test_config() -> Config {
        let mut config = Config::default();
        config.jwt.secret = "server-test-secret".to_string();
        config
    }

    async fn create_test_server() -> Server {
        Server::with_components(
            test_config(),
            Arc::new(MemoryUserStore::new()),
            CacheManager::new_memory(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_health_check_without_jwt() {
        let app = create_test_server().await.create_app();

        let request = Request::builder()
            .uri("/health?check=all")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_checkers_registered() {
        let server = create_test_server().await;
        assert_eq!(
            server.health_service.registered().await,
            vec!["cache".to_string(), "jwt".to_string()]
        );
        assert!(server.database.is_none());
    }

    #[tokio::test]
    async fn test_profile_requires_jwt() {
        let app = create_test_server().await.create_app();

        let request = Request::builder()
            .uri("/users/me")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_logout_requires_jwt() {
        let app = create_test_server().await.create_app();

        let request = Request::builder()
            .method("POST")
            .uri("/auth/logout")
            .header("Content-Type", "application/json")
            .body(Body::from("{}"))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        assert!(Server::new(Config::default()).await.is_err());
    }

    #[tokio::test]
    async fn test_new_registers_configured_github_provider() {
        let mut config = test_config();
        config.database.url = "sqlite::memory:".to_string();
        config.oauth.providers.insert(
            "github".to_string(),
            crate::auth::config::OAuthProvider {
                client_id: "id".to_string(),
                client_secret: "secret".to_string(),
                token_url: None,
                user_info_url: None,
            },
        );

        let server = Server::new(config).await.unwrap();
        assert_eq!(
            server.identity_providers.registered(),
            vec![crate::identity::Provider::GitHub]
        );
        assert!(server.database.is_some());
    }
}
