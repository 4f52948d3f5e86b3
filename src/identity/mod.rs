//! External identities and their mapping onto local accounts

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::auth::config::OAuthConfig;
use crate::error::AppError;

pub mod github;
pub mod resolver;
pub mod username;

pub use github::GitHubIdentityProvider;
pub use resolver::{IdentityResolver, Resolution, ResolvedUser};
pub use username::UsernameAllocator;

/// Supported OAuth identity providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    GitHub,
    Google,
    GitLab,
}

impl Provider {
    pub const ALL: [Provider; 3] = [Provider::GitHub, Provider::Google, Provider::GitLab];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::GitHub => "github",
            Provider::Google => "google",
            Provider::GitLab => "gitlab",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "github" => Ok(Provider::GitHub),
            "google" => Ok(Provider::Google),
            "gitlab" => Ok(Provider::GitLab),
            _ => Err(AppError::ProviderUnsupported(s.to_string())),
        }
    }
}

/// Profile returned by an identity provider after a successful exchange
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalIdentity {
    /// Provider-scoped stable user id
    pub external_id: String,
    /// Login handle, seeds the local username
    #[serde(default)]
    pub handle: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub avatar_url: String,
}

impl ExternalIdentity {
    pub fn new(external_id: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            ..Default::default()
        }
    }

    pub fn with_handle(mut self, handle: impl Into<String>) -> Self {
        self.handle = handle.into();
        self
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        self
    }

    pub fn with_avatar_url(mut self, avatar_url: impl Into<String>) -> Self {
        self.avatar_url = avatar_url.into();
        self
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.external_id.trim().is_empty() {
            return Err(AppError::ExternalIdentityIncomplete(
                "external id is empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Display name, falling back to the handle
    pub fn name(&self) -> &str {
        if self.display_name.trim().is_empty() {
            &self.handle
        } else {
            &self.display_name
        }
    }
}

/// Exchanges an authorization code for the caller's identity at one provider
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    fn provider(&self) -> Provider;

    async fn fetch_identity(&self, authorization_code: &str) -> Result<ExternalIdentity, AppError>;
}

/// Registered identity providers, keyed by provider
#[derive(Clone, Default)]
pub struct IdentityProviders {
    providers: HashMap<Provider, Arc<dyn IdentityProvider>>,
}

impl IdentityProviders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a client for every provider configured under `oauth.providers`
    pub fn from_config(config: &OAuthConfig) -> Result<Self, AppError> {
        let mut providers = Self::new();
        if let Some(github) = config.get_provider(Provider::GitHub.as_str()) {
            providers.register(Arc::new(GitHubIdentityProvider::new(
                &github,
                config.request_timeout(),
            )?));
        }
        Ok(providers)
    }

    pub fn register(&mut self, provider: Arc<dyn IdentityProvider>) {
        self.providers.insert(provider.provider(), provider);
    }

    pub fn with(mut self, provider: Arc<dyn IdentityProvider>) -> Self {
        self.register(provider);
        self
    }

    pub fn get(&self, provider: Provider) -> Result<Arc<dyn IdentityProvider>, AppError> {
        self.providers
            .get(&provider)
            .cloned()
            .ok_or_else(|| AppError::ProviderUnsupported(provider.to_string()))
    }

    pub fn registered(&self) -> Vec<Provider> {
        let mut providers: Vec<_> = self.providers.keys().copied().collect();
        providers.sort_by_key(|p| p.as_str());
        providers
    }
}
