//! GitHub OAuth code exchange and profile lookup

use async_trait::async_trait;
use reqwest::{Client, header};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::{ExternalIdentity, IdentityProvider, Provider};
use crate::auth::config::OAuthProvider;
use crate::error::AppError;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct AccessTokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

impl AccessTokenResponse {
    /// GitHub answers a rejected code with 200 and an `error` field
    fn into_access_token(self) -> Result<String, AppError> {
        if let Some(error) = self.error {
            let description = self.error_description.unwrap_or_default();
            return Err(AppError::External(format!(
                "GitHub rejected the authorization code: {} {}",
                error, description
            )));
        }
        match self.access_token {
            Some(token) if !token.is_empty() => Ok(token),
            _ => Err(AppError::External(
                "GitHub returned an empty access token".to_string(),
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GitHubUser {
    id: i64,
    login: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    avatar_url: Option<String>,
}

impl From<GitHubUser> for ExternalIdentity {
    fn from(user: GitHubUser) -> Self {
        ExternalIdentity::new(user.id.to_string())
            .with_handle(user.login)
            .with_display_name(user.name.unwrap_or_default())
            .with_email(user.email.unwrap_or_default())
            .with_avatar_url(user.avatar_url.unwrap_or_default())
    }
}

pub struct GitHubIdentityProvider {
    http_client: Client,
    client_id: String,
    client_secret: String,
    token_url: String,
    user_info_url: String,
}

impl GitHubIdentityProvider {
    pub fn new(provider: &OAuthProvider, timeout: Duration) -> Result<Self, AppError> {
        let token_url = provider.token_url.clone().ok_or_else(|| {
            AppError::Validation("GitHub token URL not configured".to_string())
        })?;
        let user_info_url = provider.user_info_url.clone().ok_or_else(|| {
            AppError::Validation("GitHub user info URL not configured".to_string())
        })?;

        let http_client = reqwest::ClientBuilder::new()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| AppError::Internal(format!("reqwest build error: {e}")))?;

        Ok(Self {
            http_client,
            client_id: provider.client_id.clone(),
            client_secret: provider.client_secret.clone(),
            token_url,
            user_info_url,
        })
    }

    async fn exchange_code(&self, code: &str) -> Result<String, AppError> {
        let response = self
            .http_client
            .post(&self.token_url)
            .header(header::ACCEPT, "application/json")
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
            ])
            .send()
            .await
            .map_err(|e| AppError::External(format!("GitHub token exchange failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::External(format!(
                "GitHub token exchange failed with status: {}",
                response.status()
            )));
        }

        response
            .json::<AccessTokenResponse>()
            .await
            .map_err(|e| AppError::External(format!("Failed to parse GitHub token response: {e}")))?
            .into_access_token()
    }

    async fn fetch_user(&self, access_token: &str) -> Result<GitHubUser, AppError> {
        let response = self
            .http_client
            .get(&self.user_info_url)
            .bearer_auth(access_token)
            .header(header::ACCEPT, "application/vnd.github+json")
            .send()
            .await
            .map_err(|e| AppError::External(format!("Failed to fetch GitHub user: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::External(format!(
                "GitHub user request failed with status: {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::External(format!("Failed to parse GitHub user: {e}")))
    }
}

#[async_trait]
impl IdentityProvider for GitHubIdentityProvider {
    fn provider(&self) -> Provider {
        Provider::GitHub
    }

    async fn fetch_identity(&self, authorization_code: &str) -> Result<ExternalIdentity, AppError> {
        let access_token = self.exchange_code(authorization_code).await.inspect_err(|e| {
            warn!("GitHub code exchange failed: {}", e);
        })?;
        let user = self.fetch_user(&access_token).await?;
        debug!(github_id = user.id, login = %user.login, "Fetched GitHub profile");
        Ok(user.into())
    }
}
