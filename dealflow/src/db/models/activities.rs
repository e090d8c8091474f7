//! Database models for activities (the interaction log on deals and contacts).

use crate::api::models::activities::ActivityUpdate;
use crate::types::{ActivityId, ContactId, DealId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Kind of interaction, stored as TEXT
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Call,
    Email,
    Meeting,
    Note,
    Task,
}

/// Database request for creating a new activity
#[derive(Debug, Clone)]
pub struct ActivityCreateDBRequest {
    pub kind: ActivityKind,
    pub subject: String,
    pub body: Option<String>,
    /// Defaults to NOW() when absent
    pub occurred_at: Option<DateTime<Utc>>,
    pub deal_id: Option<DealId>,
    pub contact_id: Option<ContactId>,
    pub created_by: Option<UserId>,
}

impl ActivityCreateDBRequest {
    /// An `email` activity recording a message sent to or received from a contact
    pub fn email(
        subject: String,
        body: Option<String>,
        occurred_at: DateTime<Utc>,
        deal_id: Option<DealId>,
        contact_id: Option<ContactId>,
        created_by: Option<UserId>,
    ) -> Self {
        Self {
            kind: ActivityKind::Email,
            subject,
            body,
            occurred_at: Some(occurred_at),
            deal_id,
            contact_id,
            created_by,
        }
    }
}

/// Database request for updating an activity
#[derive(Debug, Clone, Default)]
pub struct ActivityUpdateDBRequest {
    pub kind: Option<ActivityKind>,
    pub subject: Option<String>,
    pub body: Option<String>,
    pub occurred_at: Option<DateTime<Utc>>,
}

impl From<ActivityUpdate> for ActivityUpdateDBRequest {
    fn from(update: ActivityUpdate) -> Self {
        Self {
            kind: update.kind,
            subject: update.subject,
            body: update.body,
            occurred_at: update.occurred_at,
        }
    }
}

/// Database response for an activity
#[derive(Debug, Clone, FromRow)]
pub struct ActivityDBResponse {
    pub id: ActivityId,
    pub kind: ActivityKind,
    pub subject: String,
    pub body: Option<String>,
    pub occurred_at: DateTime<Utc>,
    pub deal_id: Option<DealId>,
    pub contact_id: Option<ContactId>,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
