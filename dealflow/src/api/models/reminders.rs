//! API request/response models for reminders.

use super::pagination::Pagination;
use crate::db::models::reminders::{ReminderDBResponse, ReminderStatus};
use crate::types::{ContactId, DealId, ReminderId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReminderCreate {
    pub title: String,
    pub notes: Option<String>,
    pub due_at: DateTime<Utc>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub deal_id: Option<DealId>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub contact_id: Option<ContactId>,
    /// Defaults to the caller
    #[schema(value_type = Option<String>, format = "uuid")]
    pub owner_id: Option<UserId>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ReminderUpdate {
    pub title: Option<String>,
    pub notes: Option<String>,
    pub due_at: Option<DateTime<Utc>>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub owner_id: Option<UserId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReminderResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: ReminderId,
    pub title: String,
    pub notes: Option<String>,
    pub due_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Open and past its due time when the response was built
    pub overdue: bool,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub deal_id: Option<DealId>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub contact_id: Option<ContactId>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub owner_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReminderResponse {
    pub fn new(db: ReminderDBResponse, now: DateTime<Utc>) -> Self {
        Self {
            overdue: db.is_overdue(now),
            id: db.id,
            title: db.title,
            notes: db.notes,
            due_at: db.due_at,
            completed_at: db.completed_at,
            deal_id: db.deal_id,
            contact_id: db.contact_id,
            owner_id: db.owner_id,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ListRemindersQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    pub status: Option<ReminderStatus>,
    #[param(value_type = Option<String>, format = "uuid")]
    #[schema(value_type = Option<String>, format = "uuid")]
    pub owner_id: Option<UserId>,
    #[param(value_type = Option<String>, format = "uuid")]
    #[schema(value_type = Option<String>, format = "uuid")]
    pub deal_id: Option<DealId>,
    #[param(value_type = Option<String>, format = "uuid")]
    #[schema(value_type = Option<String>, format = "uuid")]
    pub contact_id: Option<ContactId>,
}
