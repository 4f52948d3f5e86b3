use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::auth::session::SessionPayload;
use crate::auth::tokens::{TokenPair, TokenService};
use crate::database::{User, UserStore};
use crate::error::AppError;
use crate::identity::{ExternalIdentity, IdentityResolver, Provider};

/// Result of a successful OAuth login
#[derive(Debug, Clone, Serialize)]
pub struct AuthenticatedSession {
    pub user: User,
    pub session: SessionPayload,
    pub tokens: TokenPair,
    pub is_new_user: bool,
}

/// Entry points for login, refresh, verification and logout
pub struct AuthService {
    resolver: IdentityResolver,
    tokens: Arc<TokenService>,
    users: Arc<dyn UserStore>,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserStore>, tokens: Arc<TokenService>) -> Self {
        Self {
            resolver: IdentityResolver::new(users.clone()),
            tokens,
            users,
        }
    }

    pub fn token_service(&self) -> &Arc<TokenService> {
        &self.tokens
    }

    pub async fn authenticate_with_oauth(
        &self,
        provider: &str,
        identity: &ExternalIdentity,
    ) -> Result<AuthenticatedSession, AppError> {
        let provider: Provider = provider.parse()?;
        identity.validate()?;

        let resolved = self.resolver.resolve(provider, identity).await?;
        let user = resolved.user;

        if !user.is_active() {
            warn!(user_id = %user.id, %provider, "Login rejected for inactive user");
            return Err(AppError::Unauthorized(format!(
                "User account is {}",
                user.status.as_str()
            )));
        }

        if !resolved.is_new {
            if let Err(e) = self.users.update_last_login(&user.id).await {
                warn!(user_id = %user.id, error = %e, "Failed to record last login");
            }
        }

        let session = SessionPayload::new(user.id.clone());
        let tokens = self.tokens.issue_session(&session).await?;

        info!(user_id = %user.id, %provider, is_new_user = resolved.is_new, "OAuth login succeeded");
        Ok(AuthenticatedSession {
            user,
            session,
            tokens,
            is_new_user: resolved.is_new,
        })
    }

    /// New access token for an existing session; the refresh secret is kept
    pub async fn refresh_session(
        &self,
        payload: &SessionPayload,
        refresh_token: &str,
    ) -> Result<TokenPair, AppError> {
        let access_token = self.tokens.refresh(payload, refresh_token).await?;
        self.tokens.reset_refresh_expiry(payload).await?;

        Ok(TokenPair {
            access_token,
            refresh_token: refresh_token.to_string(),
        })
    }

    pub fn verify_access_token(&self, token: &str) -> Result<SessionPayload, AppError> {
        self.tokens.verify(token)
    }

    pub async fn logout(&self, payload: &SessionPayload) -> Result<(), AppError> {
        self.tokens.revoke_session(payload).await?;
        info!(user_id = %payload.user_id, "Session revoked");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::JwtAccessTokenCodec;
    use crate::auth::refresh::CacheRefreshTokenStore;
    use crate::cache::CacheManager;
    use crate::database::{MemoryUserStore, UserStatus};
    use jsonwebtoken::Algorithm;
    use std::time::Duration;

    fn service(users: &MemoryUserStore) -> AuthService {
        let codec =
            JwtAccessTokenCodec::new("unit-secret", Algorithm::HS256, Duration::from_secs(600))
                .unwrap();
        let cache = CacheManager::new_memory();
        let refresh = CacheRefreshTokenStore::new(
            cache.hash("refresh_sessions").unwrap(),
            Duration::from_secs(3600),
        );
        let store: Arc<dyn UserStore> = Arc::new(users.clone());
        let tokens = TokenService::new(Arc::new(codec), Arc::new(refresh), store.clone());
        AuthService::new(store, Arc::new(tokens))
    }

    fn identity() -> ExternalIdentity {
        ExternalIdentity::new("42").with_email("a@x.com")
    }

    #[tokio::test]
    async fn test_first_login_creates_user() {
        let users = MemoryUserStore::new();
        let auth = service(&users);

        let session = auth.authenticate_with_oauth("github", &identity()).await.unwrap();

        assert!(session.is_new_user);
        assert_eq!(session.user.github_id.as_deref(), Some("42"));
        assert_eq!(session.session.user_id, session.user.id);
        assert_eq!(
            auth.verify_access_token(&session.tokens.access_token).unwrap(),
            session.session
        );
        assert!(session.user.last_login_at.is_none());
    }

    #[tokio::test]
    async fn test_second_login_records_last_login() {
        let users = MemoryUserStore::new();
        let auth = service(&users);

        let first = auth.authenticate_with_oauth("github", &identity()).await.unwrap();
        let second = auth.authenticate_with_oauth("GitHub", &identity()).await.unwrap();

        assert!(!second.is_new_user);
        assert_eq!(first.user.id, second.user.id);
        assert_ne!(first.session.session_nonce, second.session.session_nonce);
        let stored = users.find_by_id(&first.user.id).await.unwrap();
        assert!(stored.last_login_at.is_some());
    }

    #[tokio::test]
    async fn test_unsupported_provider() {
        let auth = service(&MemoryUserStore::new());
        let result = auth.authenticate_with_oauth("bitbucket", &identity()).await;
        assert!(matches!(result, Err(AppError::ProviderUnsupported(_))));
    }

    #[tokio::test]
    async fn test_incomplete_identity() {
        let auth = service(&MemoryUserStore::new());
        let result = auth
            .authenticate_with_oauth("google", &ExternalIdentity::new(""))
            .await;
        assert!(matches!(result, Err(AppError::ExternalIdentityIncomplete(_))));
    }

    #[tokio::test]
    async fn test_disabled_user_cannot_log_in() {
        let users = MemoryUserStore::new();
        let disabled = User::new("Mallory")
            .with_external_id(Provider::GitHub, "42")
            .with_status(UserStatus::Disabled);
        users.create(&disabled).await.unwrap();

        let result = service(&users)
            .authenticate_with_oauth("github", &identity())
            .await;
        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_refresh_keeps_secret_and_changes_nonce() {
        let users = MemoryUserStore::new();
        let auth = service(&users);
        let login = auth.authenticate_with_oauth("github", &identity()).await.unwrap();

        let pair = auth
            .refresh_session(&login.session, &login.tokens.refresh_token)
            .await
            .unwrap();

        assert_eq!(pair.refresh_token, login.tokens.refresh_token);
        assert_ne!(pair.access_token, login.tokens.access_token);
        let refreshed = auth.verify_access_token(&pair.access_token).unwrap();
        assert_eq!(refreshed.user_id, login.user.id);
        assert_ne!(refreshed.session_nonce, login.session.session_nonce);

        // The same secret keeps working for the original payload
        assert!(
            auth.refresh_session(&login.session, &login.tokens.refresh_token)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_logout_ends_refresh() {
        let users = MemoryUserStore::new();
        let auth = service(&users);
        let login = auth.authenticate_with_oauth("github", &identity()).await.unwrap();

        auth.logout(&login.session).await.unwrap();

        let result = auth
            .refresh_session(&login.session, &login.tokens.refresh_token)
            .await;
        assert!(matches!(result, Err(AppError::SessionNotFound)));
    }
}
