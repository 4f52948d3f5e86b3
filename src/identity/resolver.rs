//! Maps an external identity onto a local user: reuse, bind or create

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info};

use super::{ExternalIdentity, Provider, UsernameAllocator};
use crate::database::entities::users::non_empty;
use crate::database::{DatabaseError, DatabaseResult, User, UserStatus, UserStore};
use crate::error::AppError;

/// Attempts at creating a user before a lost username race is reported
const MAX_CREATE_ATTEMPTS: usize = 5;

/// Outcome of the lookup phase
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Already linked to this provider id
    Existing(User),
    /// Known by email, provider id still to be attached
    Bind(User),
    /// No match, a new account is needed
    Create,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedUser {
    pub user: User,
    pub is_new: bool,
}

pub struct IdentityResolver {
    users: Arc<dyn UserStore>,
    usernames: UsernameAllocator,
}

/// `NotFound` moves resolution to the next tier; anything else aborts it
fn found(result: DatabaseResult<User>) -> Result<Option<User>, AppError> {
    match result {
        Ok(user) => Ok(Some(user)),
        Err(DatabaseError::NotFound) => Ok(None),
        Err(e) => Err(AppError::Internal(format!("User lookup failed: {}", e))),
    }
}

impl IdentityResolver {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self {
            users,
            usernames: UsernameAllocator::new(),
        }
    }

    pub async fn resolve(
        &self,
        provider: Provider,
        identity: &ExternalIdentity,
    ) -> Result<ResolvedUser, AppError> {
        let resolution = self.decide(provider, identity).await?;
        self.apply(provider, identity, resolution).await
    }

    /// Lookup phase, no writes
    pub async fn decide(
        &self,
        provider: Provider,
        identity: &ExternalIdentity,
    ) -> Result<Resolution, AppError> {
        identity.validate()?;

        if let Some(user) = found(
            self.users
                .find_by_external_id(provider, &identity.external_id)
                .await,
        )? {
            debug!(user_id = %user.id, %provider, "Identity already linked");
            return Ok(Resolution::Existing(user));
        }

        let email = identity.email.trim();
        if !email.is_empty() {
            if let Some(user) = found(self.users.find_by_email(email).await)? {
                debug!(user_id = %user.id, %provider, "Binding identity by email");
                return Ok(Resolution::Bind(user));
            }
        }

        debug!(%provider, "No matching account");
        Ok(Resolution::Create)
    }

    /// Write phase for a decided resolution
    pub async fn apply(
        &self,
        provider: Provider,
        identity: &ExternalIdentity,
        resolution: Resolution,
    ) -> Result<ResolvedUser, AppError> {
        match resolution {
            Resolution::Existing(user) => Ok(ResolvedUser {
                user,
                is_new: false,
            }),
            Resolution::Bind(user) => Ok(ResolvedUser {
                user: self.bind(user, provider, identity).await?,
                is_new: false,
            }),
            Resolution::Create => Ok(ResolvedUser {
                user: self.create(provider, identity).await?,
                is_new: true,
            }),
        }
    }

    async fn bind(
        &self,
        mut user: User,
        provider: Provider,
        identity: &ExternalIdentity,
    ) -> Result<User, AppError> {
        user.set_external_id(provider, identity.external_id.clone());
        if let Some(avatar_url) = non_empty(identity.avatar_url.clone()) {
            user.avatar_url = Some(avatar_url);
        }
        user.touch();

        let user = self.users.update(&user).await?;
        info!(user_id = %user.id, %provider, "Bound external identity to existing user");
        Ok(user)
    }

    async fn create(&self, provider: Provider, identity: &ExternalIdentity) -> Result<User, AppError> {
        let mut excluded: HashSet<String> = HashSet::new();

        for attempt in 1..=MAX_CREATE_ATTEMPTS {
            let username = self.allocate_username(&identity.handle, &excluded).await?;

            let user = User::new(identity.name())
                .with_username(username.clone())
                .with_email(identity.email.trim())
                .with_avatar_url(identity.avatar_url.clone())
                .with_external_id(provider, identity.external_id.clone())
                .with_email_verified(true)
                .with_status(UserStatus::Active);

            match self.users.create(&user).await {
                Ok(user) => {
                    info!(user_id = %user.id, %provider, username = %username, "Created user from external identity");
                    return Ok(user);
                }
                Err(DatabaseError::UsernameTaken(_)) => {
                    debug!(username = %username, attempt, "Username claimed concurrently, retrying");
                    excluded.insert(username);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(AppError::AlreadyExists(format!(
            "Username for '{}' kept colliding after {} attempts",
            identity.handle, MAX_CREATE_ATTEMPTS
        )))
    }

    async fn allocate_username(
        &self,
        preferred: &str,
        excluded: &HashSet<String>,
    ) -> Result<String, AppError> {
        self.usernames
            .allocate(preferred, |name| {
                let users = self.users.clone();
                let skip = excluded.contains(&name);
                async move {
                    if skip {
                        return Ok(true);
                    }
                    users
                        .username_exists(&name)
                        .await
                        .map_err(|e| AppError::Internal(format!("Username lookup failed: {}", e)))
                }
            })
            .await
    }
}
