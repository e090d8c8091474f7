//! Database models for users.

use crate::api::models::users::{Role, UserUpdate};
use crate::types::UserId;
use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database request for creating a new user
#[derive(Debug, Clone)]
pub struct UserCreateDBRequest {
    pub email: String,
    pub display_name: Option<String>,
    pub role: Role,
    pub auth_source: String,
}

impl UserCreateDBRequest {
    /// A rep provisioned on first sight of the proxy header
    pub fn from_proxy_header(email: &str) -> Self {
        Self {
            email: email.to_string(),
            display_name: None,
            role: Role::Rep,
            auth_source: "proxy-header".to_string(),
        }
    }
}

/// Database request for updating a user
#[derive(Debug, Clone, Default)]
pub struct UserUpdateDBRequest {
    pub display_name: Option<String>,
    pub role: Option<Role>,
}

impl From<UserUpdate> for UserUpdateDBRequest {
    fn from(update: UserUpdate) -> Self {
        Self {
            display_name: update.display_name,
            role: update.role,
        }
    }
}

/// Database response for a user
#[derive(Debug, Clone, FromRow)]
pub struct UserDBResponse {
    pub id: UserId,
    pub email: String,
    pub display_name: Option<String>,
    pub role: Role,
    pub auth_source: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
