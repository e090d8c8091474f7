//! Database models for inbound messages that have been ingested.

use crate::types::{ActivityId, ContactId, MailAccountId, ProcessedEmailId};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone)]
pub struct ProcessedEmailCreateDBRequest {
    pub message_id: String,
    pub from_email: String,
    pub subject: Option<String>,
    pub received_at: DateTime<Utc>,
    pub mail_account_id: Option<MailAccountId>,
    pub contact_id: Option<ContactId>,
    pub activity_id: Option<ActivityId>,
}

#[derive(Debug, Clone, FromRow)]
pub struct ProcessedEmailDBResponse {
    pub id: ProcessedEmailId,
    pub message_id: String,
    pub from_email: String,
    pub subject: Option<String>,
    pub received_at: DateTime<Utc>,
    pub processed_at: DateTime<Utc>,
    pub mail_account_id: Option<MailAccountId>,
    pub contact_id: Option<ContactId>,
    pub activity_id: Option<ActivityId>,
}
