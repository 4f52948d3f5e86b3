use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, Set, SqlErr,
};

use crate::database::entities::{User, users};
use crate::database::{DatabaseError, DatabaseResult, UserStore};
use crate::identity::Provider;

/// Users DAO for database operations
#[derive(Clone)]
pub struct UsersDao {
    db: DatabaseConnection,
}

impl UsersDao {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Find user by username
    pub async fn find_by_username(&self, username: &str) -> DatabaseResult<User> {
        users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.db)
            .await
            .map_err(map_db_err)?
            .ok_or(DatabaseError::NotFound)
    }
}

fn provider_column(provider: Provider) -> users::Column {
    match provider {
        Provider::GitHub => users::Column::GithubId,
        Provider::Google => users::Column::GoogleId,
        Provider::GitLab => users::Column::GitlabId,
    }
}

fn active_model(user: &User) -> users::ActiveModel {
    users::ActiveModel {
        id: Set(user.id.clone()),
        email: Set(user.email.clone()),
        name: Set(user.name.clone()),
        username: Set(user.username.clone()),
        avatar_url: Set(user.avatar_url.clone()),
        email_verified: Set(user.email_verified),
        github_id: Set(user.github_id.clone()),
        google_id: Set(user.google_id.clone()),
        gitlab_id: Set(user.gitlab_id.clone()),
        status: Set(user.status),
        created_at: Set(user.created_at),
        updated_at: Set(user.updated_at),
        last_login_at: Set(user.last_login_at),
    }
}

/// Unique violations on `username` are told apart from every other constraint
fn map_db_err(err: DbErr) -> DatabaseError {
    if let Some(SqlErr::UniqueConstraintViolation(message)) = err.sql_err() {
        return if message.contains("username") {
            DatabaseError::UsernameTaken(message)
        } else {
            DatabaseError::Constraint(message)
        };
    }
    match err {
        DbErr::RecordNotFound(_) | DbErr::RecordNotUpdated => DatabaseError::NotFound,
        other => DatabaseError::Database(other.to_string()),
    }
}

#[async_trait]
impl UserStore for UsersDao {
    async fn find_by_id(&self, id: &str) -> DatabaseResult<User> {
        users::Entity::find_by_id(id.to_string())
            .one(&self.db)
            .await
            .map_err(map_db_err)?
            .ok_or(DatabaseError::NotFound)
    }

    async fn find_by_email(&self, email: &str) -> DatabaseResult<User> {
        users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .one(&self.db)
            .await
            .map_err(map_db_err)?
            .ok_or(DatabaseError::NotFound)
    }

    async fn find_by_external_id(
        &self,
        provider: Provider,
        external_id: &str,
    ) -> DatabaseResult<User> {
        users::Entity::find()
            .filter(provider_column(provider).eq(external_id))
            .one(&self.db)
            .await
            .map_err(map_db_err)?
            .ok_or(DatabaseError::NotFound)
    }

    async fn create(&self, user: &User) -> DatabaseResult<User> {
        active_model(user).insert(&self.db).await.map_err(map_db_err)
    }

    async fn update(&self, user: &User) -> DatabaseResult<User> {
        active_model(user).update(&self.db).await.map_err(map_db_err)
    }

    async fn username_exists(&self, username: &str) -> DatabaseResult<bool> {
        let count = users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .count(&self.db)
            .await
            .map_err(map_db_err)?;

        Ok(count > 0)
    }

    async fn update_last_login(&self, id: &str) -> DatabaseResult<()> {
        let user = users::ActiveModel {
            id: Set(id.to_string()),
            last_login_at: Set(Some(Utc::now())),
            ..Default::default()
        };

        user.update(&self.db).await.map_err(map_db_err)?;
        Ok(())
    }
}
