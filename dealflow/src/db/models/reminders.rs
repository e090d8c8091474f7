//! Database models for reminders.

use crate::api::models::reminders::ReminderUpdate;
use crate::types::{ContactId, DealId, ReminderId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Status filter for listing reminders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReminderStatus {
    /// Not completed yet
    Open,
    Completed,
    /// Not completed and due before now
    Overdue,
    /// Not completed and due on the current UTC day
    DueToday,
}

/// Database request for creating a new reminder
#[derive(Debug, Clone)]
pub struct ReminderCreateDBRequest {
    pub title: String,
    pub notes: Option<String>,
    pub due_at: DateTime<Utc>,
    pub deal_id: Option<DealId>,
    pub contact_id: Option<ContactId>,
    pub owner_id: Option<UserId>,
}

/// Database request for updating a reminder
#[derive(Debug, Clone, Default)]
pub struct ReminderUpdateDBRequest {
    pub title: Option<String>,
    pub notes: Option<String>,
    pub due_at: Option<DateTime<Utc>>,
    pub owner_id: Option<UserId>,
}

impl From<ReminderUpdate> for ReminderUpdateDBRequest {
    fn from(update: ReminderUpdate) -> Self {
        Self {
            title: update.title,
            notes: update.notes,
            due_at: update.due_at,
            owner_id: update.owner_id,
        }
    }
}

/// Database response for a reminder
#[derive(Debug, Clone, FromRow)]
pub struct ReminderDBResponse {
    pub id: ReminderId,
    pub title: String,
    pub notes: Option<String>,
    pub due_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub deal_id: Option<DealId>,
    pub contact_id: Option<ContactId>,
    pub owner_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReminderDBResponse {
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.completed_at.is_none() && self.due_at < now
    }
}
