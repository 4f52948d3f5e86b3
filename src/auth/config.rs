use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Access token signing settings. There is no usable default secret;
/// it must come from the config file or `IDENTITY_JWT__SECRET`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    #[serde(default)]
    pub secret: String,
    #[serde(default = "default_jwt_algorithm")]
    pub algorithm: String,
    #[serde(default = "default_access_token_ttl")]
    pub access_token_ttl: u64,
}

fn default_jwt_algorithm() -> String {
    "HS256".to_string()
}

fn default_access_token_ttl() -> u64 {
    900 // 15 minutes
}

impl JwtConfig {
    pub fn access_token_lifetime(&self) -> Duration {
        Duration::from_secs(self.access_token_ttl)
    }
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            algorithm: default_jwt_algorithm(),
            access_token_ttl: default_access_token_ttl(),
        }
    }
}

/// Refresh session settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_refresh_token_ttl")]
    pub refresh_token_ttl: u64,
    #[serde(default = "default_hash_key")]
    pub hash_key: String,
}

fn default_refresh_token_ttl() -> u64 {
    2_592_000 // 30 days
}

fn default_hash_key() -> String {
    "refresh_sessions".to_string()
}

impl SessionConfig {
    pub fn refresh_token_lifetime(&self) -> Duration {
        Duration::from_secs(self.refresh_token_ttl)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            refresh_token_ttl: default_refresh_token_ttl(),
            hash_key: default_hash_key(),
        }
    }
}

/// Identity provider credentials, keyed by provider name (`github`, ...)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthConfig {
    #[serde(default)]
    pub providers: HashMap<String, OAuthProvider>,
    /// Timeout for each outbound provider request, in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
}

fn default_request_timeout() -> u64 {
    10
}

impl OAuthConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    /// Provider entry with the well-known endpoints filled in
    pub fn get_provider(&self, name: &str) -> Option<OAuthProvider> {
        let mut provider = self.providers.get(name)?.clone();
        if name == "github" {
            apply_github_defaults(&mut provider);
        }
        Some(provider)
    }
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            providers: HashMap::new(),
            request_timeout: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthProvider {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub token_url: Option<String>,
    #[serde(default)]
    pub user_info_url: Option<String>,
}

fn apply_github_defaults(provider: &mut OAuthProvider) {
    if provider.token_url.is_none() {
        provider.token_url = Some("https://github.com/login/oauth/access_token".to_string());
    }
    if provider.user_info_url.is_none() {
        provider.user_info_url = Some("https://api.github.com/user".to_string());
    }
}
