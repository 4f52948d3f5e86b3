//! User persistence
//!
//! The identity core only talks to the [`UserStore`] trait. `UsersDao` backs it
//! with sea-orm (SQLite or Postgres) and `MemoryUserStore` keeps everything in
//! process for tests and single-instance runs.

use async_trait::async_trait;
use sea_orm::{ConnectOptions, ConnectionTrait, DatabaseConnection};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::health::{HealthCheckResult, HealthChecker};
use crate::identity::Provider;

pub mod config;
pub mod dao;
pub mod entities;
pub mod memory;
pub mod migration;

pub use config::DatabaseConfig;
pub use dao::UsersDao;
pub use entities::{User, UserStatus};
pub use memory::MemoryUserStore;

/// Database error types
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("Record not found")]
    NotFound,
    #[error("Username already taken: {0}")]
    UsernameTaken(String),
    #[error("Constraint violation: {0}")]
    Constraint(String),
    #[error("Migration error: {0}")]
    Migration(String),
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Partial profile patch; `None` leaves a field untouched
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.username.is_none() && self.avatar_url.is_none()
    }
}

/// User record persistence capability
///
/// Lookups return [`DatabaseError::NotFound`] when no record matches. Writes
/// enforce uniqueness of username, email and every provider id; a username
/// clash is reported as [`DatabaseError::UsernameTaken`].
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: &str) -> DatabaseResult<User>;

    async fn find_by_email(&self, email: &str) -> DatabaseResult<User>;

    async fn find_by_external_id(&self, provider: Provider, external_id: &str)
    -> DatabaseResult<User>;

    async fn create(&self, user: &User) -> DatabaseResult<User>;

    async fn update(&self, user: &User) -> DatabaseResult<User>;

    async fn username_exists(&self, username: &str) -> DatabaseResult<bool>;

    async fn update_last_login(&self, id: &str) -> DatabaseResult<()>;
}

/// Database connection manager
#[derive(Clone)]
pub struct DatabaseManager {
    connection: DatabaseConnection,
}

impl DatabaseManager {
    /// Create database manager from configuration
    pub async fn new_from_config(config: &DatabaseConfig) -> DatabaseResult<Self> {
        let mut options = ConnectOptions::new(config.url.clone());
        options
            .max_connections(config.max_connections)
            .sqlx_logging(false);

        let connection = sea_orm::Database::connect(options)
            .await
            .map_err(|e| DatabaseError::Database(e.to_string()))?;

        Ok(Self { connection })
    }

    /// Run database migrations
    pub async fn migrate(&self) -> DatabaseResult<()> {
        use crate::database::migration::Migrator;
        use sea_orm_migration::MigratorTrait;

        tracing::info!("Running database migrations");

        Migrator::up(&self.connection, None)
            .await
            .map_err(|e| DatabaseError::Migration(format!("Failed to run migrations: {}", e)))?;

        tracing::info!("Successfully completed all migrations");
        Ok(())
    }

    /// Health check for database connection
    pub async fn health_check(&self) -> DatabaseResult<()> {
        self.connection
            .ping()
            .await
            .map_err(|e| DatabaseError::Database(format!("db error: {}", e)))
    }

    pub fn users(&self) -> UsersDao {
        UsersDao::new(self.connection.clone())
    }

    /// Get direct database connection (for migrations and admin operations)
    pub fn connection(&self) -> &DatabaseConnection {
        &self.connection
    }
}

#[async_trait]
impl HealthChecker for DatabaseManager {
    fn name(&self) -> &str {
        "database"
    }

    async fn check(&self) -> HealthCheckResult {
        match self.health_check().await {
            Ok(_) => HealthCheckResult::healthy_with_details(serde_json::json!({
                "status": "healthy",
                "connection": "ok"
            })),
            Err(err) => HealthCheckResult::unhealthy_with_details(
                "DB health check failed".to_string(),
                serde_json::json!({
                    "status": "unhealthy",
                    "error": err.to_string()
                }),
            ),
        }
    }

    fn info(&self) -> Option<serde_json::Value> {
        Some(serde_json::json!({
            "service": "Database",
            "backend": format!("{:?}", self.connection.get_database_backend())
        }))
    }
}
