//! In-process user store

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{DatabaseError, DatabaseResult, User, UserStore};
use crate::identity::Provider;

/// `UserStore` kept in a map, with the same uniqueness rules as the `users` table
#[derive(Clone, Default)]
pub struct MemoryUserStore {
    users: Arc<RwLock<HashMap<String, User>>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}

/// Check `candidate` against every other stored user
fn check_unique(users: &HashMap<String, User>, candidate: &User) -> DatabaseResult<()> {
    for other in users.values().filter(|u| u.id != candidate.id) {
        if candidate.username.is_some() && candidate.username == other.username {
            return Err(DatabaseError::UsernameTaken(
                candidate.username.clone().unwrap_or_default(),
            ));
        }
        if candidate.email.is_some() && candidate.email == other.email {
            return Err(DatabaseError::Constraint(
                "users.email must be unique".to_string(),
            ));
        }
        for provider in Provider::ALL {
            let id = candidate.external_id(provider);
            if id.is_some() && id == other.external_id(provider) {
                return Err(DatabaseError::Constraint(format!(
                    "users.{}_id must be unique",
                    provider.as_str()
                )));
            }
        }
    }
    Ok(())
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_id(&self, id: &str) -> DatabaseResult<User> {
        self.users
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or(DatabaseError::NotFound)
    }

    async fn find_by_email(&self, email: &str) -> DatabaseResult<User> {
        self.users
            .read()
            .await
            .values()
            .find(|u| u.email.as_deref() == Some(email))
            .cloned()
            .ok_or(DatabaseError::NotFound)
    }

    async fn find_by_external_id(
        &self,
        provider: Provider,
        external_id: &str,
    ) -> DatabaseResult<User> {
        self.users
            .read()
            .await
            .values()
            .find(|u| u.external_id(provider) == Some(external_id))
            .cloned()
            .ok_or(DatabaseError::NotFound)
    }

    async fn create(&self, user: &User) -> DatabaseResult<User> {
        let mut users = self.users.write().await;
        if users.contains_key(&user.id) {
            return Err(DatabaseError::Constraint(format!(
                "users.id {} already exists",
                user.id
            )));
        }
        check_unique(&users, user)?;
        users.insert(user.id.clone(), user.clone());
        Ok(user.clone())
    }

    async fn update(&self, user: &User) -> DatabaseResult<User> {
        let mut users = self.users.write().await;
        if !users.contains_key(&user.id) {
            return Err(DatabaseError::NotFound);
        }
        check_unique(&users, user)?;
        users.insert(user.id.clone(), user.clone());
        Ok(user.clone())
    }

    async fn username_exists(&self, username: &str) -> DatabaseResult<bool> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .any(|u| u.username.as_deref() == Some(username)))
    }

    async fn update_last_login(&self, id: &str) -> DatabaseResult<()> {
        let mut users = self.users.write().await;
        let user = users.get_mut(id).ok_or(DatabaseError::NotFound)?;
        user.last_login_at = Some(Utc::now());
        Ok(())
    }
}
