use chrono::{DateTime, Utc};
use sea_orm::{entity::prelude::*, sea_query::StringLen};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::identity::Provider;

/// Account status; only active accounts may log in or refresh
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    Default,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum UserStatus {
    #[sea_orm(string_value = "active")]
    #[serde(rename = "active")]
    #[default]
    Active,
    #[sea_orm(string_value = "disabled")]
    #[serde(rename = "disabled")]
    Disabled,
}

impl UserStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, UserStatus::Active)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Disabled => "disabled",
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    #[sea_orm(unique)]
    pub email: Option<String>,
    pub name: String,
    #[sea_orm(unique)]
    pub username: Option<String>,
    pub avatar_url: Option<String>,
    pub email_verified: bool,
    #[sea_orm(unique)]
    pub github_id: Option<String>,
    #[sea_orm(unique)]
    pub google_id: Option<String>,
    #[sea_orm(unique)]
    pub gitlab_id: Option<String>,
    #[sea_orm(column_type = "String(StringLen::N(16))", default_value = "active")]
    pub status: UserStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Empty strings are stored as NULL so unique indexes ignore them
pub(crate) fn non_empty(value: impl Into<String>) -> Option<String> {
    let value = value.into();
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

impl Default for Model {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            email: None,
            name: String::new(),
            username: None,
            avatar_url: None,
            email_verified: false,
            github_id: None,
            google_id: None,
            gitlab_id: None,
            status: UserStatus::Active,
            created_at: now,
            updated_at: now,
            last_login_at: None,
        }
    }
}

impl Model {
    /// New active user with a fresh id
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// External id bound for `provider`, if any
    pub fn external_id(&self, provider: Provider) -> Option<&str> {
        match provider {
            Provider::GitHub => self.github_id.as_deref(),
            Provider::Google => self.google_id.as_deref(),
            Provider::GitLab => self.gitlab_id.as_deref(),
        }
    }

    /// Bind (or clear, with an empty id) the external id for `provider`
    pub fn set_external_id(&mut self, provider: Provider, external_id: impl Into<String>) {
        let value = non_empty(external_id);
        match provider {
            Provider::GitHub => self.github_id = value,
            Provider::Google => self.google_id = value,
            Provider::GitLab => self.gitlab_id = value,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = non_empty(email);
        self
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = non_empty(username);
        self
    }

    pub fn with_avatar_url(mut self, avatar_url: impl Into<String>) -> Self {
        self.avatar_url = non_empty(avatar_url);
        self
    }

    pub fn with_external_id(mut self, provider: Provider, external_id: impl Into<String>) -> Self {
        self.set_external_id(provider, external_id);
        self
    }

    pub fn with_email_verified(mut self, verified: bool) -> Self {
        self.email_verified = verified;
        self
    }

    pub fn with_status(mut self, status: UserStatus) -> Self {
        self.status = status;
        self
    }

    /// Builder method to set ID (for tests)
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Bump `updated_at` to now
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
