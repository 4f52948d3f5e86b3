//! Profile reads and partial updates for local accounts

use std::sync::Arc;
use tracing::info;

use crate::database::{DatabaseError, ProfileUpdate, User, UserStore};
use crate::error::AppError;
use crate::identity::UsernameAllocator;

pub struct UserService {
    users: Arc<dyn UserStore>,
}

impl UserService {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    pub async fn get_user(&self, user_id: &str) -> Result<User, AppError> {
        self.users.find_by_id(user_id).await.map_err(AppError::from)
    }

    /// Apply `update` to the user; a username held by someone else is `AlreadyExists`
    pub async fn update_profile(
        &self,
        user_id: &str,
        update: ProfileUpdate,
    ) -> Result<User, AppError> {
        let mut user = self.get_user(user_id).await?;
        if update.is_empty() {
            return Ok(user);
        }

        if let Some(name) = update.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(AppError::Validation("Name must not be empty".to_string()));
            }
            user.name = name.to_string();
        }

        if let Some(username) = update.username {
            if !UsernameAllocator::is_valid(&username) {
                return Err(AppError::Validation(format!(
                    "Invalid username '{}': use up to 30 letters, digits, '_' or '-'",
                    username
                )));
            }
            if user.username.as_deref() != Some(username.as_str()) {
                if self.users.username_exists(&username).await? {
                    return Err(AppError::AlreadyExists(format!(
                        "Username '{}' is already taken",
                        username
                    )));
                }
                user.username = Some(username);
            }
        }

        if let Some(avatar_url) = update.avatar_url {
            let avatar_url = avatar_url.trim();
            user.avatar_url = (!avatar_url.is_empty()).then(|| avatar_url.to_string());
        }

        user.touch();
        let user = self.users.update(&user).await.map_err(|e| match e {
            DatabaseError::UsernameTaken(_) => {
                AppError::AlreadyExists("Username is already taken".to_string())
            }
            other => other.into(),
        })?;

        info!(user_id = %user.id, "Profile updated");
        Ok(user)
    }
}
