use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode},
};
use identity_session::{
    AppError, Config, Server,
    cache::CacheManager,
    database::MemoryUserStore,
    identity::{ExternalIdentity, IdentityProvider, Provider},
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceExt;

/// Identity provider that answers from a fixed code table
pub struct StaticIdentityProvider {
    provider: Provider,
    identities: HashMap<String, ExternalIdentity>,
}

impl StaticIdentityProvider {
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            identities: HashMap::new(),
        }
    }

    pub fn with_code(mut self, code: &str, identity: ExternalIdentity) -> Self {
        self.identities.insert(code.to_string(), identity);
        self
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn fetch_identity(&self, code: &str) -> Result<ExternalIdentity, AppError> {
        self.identities
            .get(code)
            .cloned()
            .ok_or_else(|| AppError::External(format!("{} rejected the authorization code", self.provider)))
    }
}

/// Server over in-memory users and cache, with a GitHub fake registered by default
pub struct TestHarness {
    #[allow(dead_code)]
    pub server: Server,
    #[allow(dead_code)]
    pub users: MemoryUserStore,
    pub app: Router,
}

impl TestHarness {
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(config: Config) -> Self {
        let github = StaticIdentityProvider::new(Provider::GitHub)
            .with_code(
                "code-alice",
                ExternalIdentity::new("42")
                    .with_handle("alice")
                    .with_display_name("Alice")
                    .with_email("a@x.com"),
            )
            .with_code(
                "code-bob",
                ExternalIdentity::new("77")
                    .with_handle("bob")
                    .with_email("bob@x.com"),
            );

        Self::with_provider(config, Arc::new(github)).await
    }

    /// Server over in-memory users and cache with `provider` as the only identity provider
    pub async fn with_provider(config: Config, provider: Arc<dyn IdentityProvider>) -> Self {
        let users = MemoryUserStore::new();
        let server = Server::with_components(
            config,
            Arc::new(users.clone()),
            CacheManager::new_memory(),
        )
        .await
        .unwrap()
        .with_identity_provider(provider);
        let app = server.create_app();

        Self { server, users, app }
    }

    pub async fn request(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, body)
    }

    /// Log in through `POST /auth/{provider}/login`, asserting success
    #[allow(dead_code)]
    pub async fn login(&self, provider: &str, code: &str) -> Value {
        let (status, body) = self
            .request(json_request(
                Method::POST,
                &format!("/auth/{}/login", provider),
                None,
                serde_json::json!({ "code": code }),
            ))
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);
        body
    }
}

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.jwt.secret = "integration-test-secret".to_string();
    config
}

pub fn json_request(method: Method, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json");
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

#[allow(dead_code)]
pub fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}
