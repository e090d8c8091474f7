//! Database models for mail accounts (the sender identities drafts go out from).

use crate::api::models::mail::MailAccountCreate;
use crate::types::{MailAccountId, UserId};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone)]
pub struct MailAccountCreateDBRequest {
    pub email: String,
    pub display_name: Option<String>,
    pub user_id: Option<UserId>,
}

impl MailAccountCreateDBRequest {
    /// The account belongs to the creating user unless another user is named.
    pub fn new(created_by: UserId, create: MailAccountCreate) -> Self {
        Self {
            email: create.email.trim().to_string(),
            display_name: create.display_name,
            user_id: Some(create.user_id.unwrap_or(created_by)),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct MailAccountDBResponse {
    pub id: MailAccountId,
    pub email: String,
    pub display_name: Option<String>,
    pub user_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
}
