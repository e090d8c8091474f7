//! Database models for outbound email drafts.

use crate::api::models::mail::EmailDraftUpdate;
use crate::types::{ContactId, DealId, EmailDraftId, MailAccountId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Delivery state of a draft, stored as TEXT
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DraftStatus {
    Draft,
    Sent,
    Failed,
}

impl DraftStatus {
    /// Drafts can be edited until they have been sent
    pub fn is_editable(self) -> bool {
        !matches!(self, DraftStatus::Sent)
    }
}

/// Database request for creating a draft. Subject and body are already rendered.
#[derive(Debug, Clone)]
pub struct EmailDraftCreateDBRequest {
    pub subject: String,
    pub body: String,
    pub to_email: String,
    pub deal_id: Option<DealId>,
    pub contact_id: Option<ContactId>,
    pub mail_account_id: Option<MailAccountId>,
    pub created_by: Option<UserId>,
}

#[derive(Debug, Clone, Default)]
pub struct EmailDraftUpdateDBRequest {
    pub subject: Option<String>,
    pub body: Option<String>,
    pub to_email: Option<String>,
    pub mail_account_id: Option<MailAccountId>,
}

impl From<EmailDraftUpdate> for EmailDraftUpdateDBRequest {
    fn from(update: EmailDraftUpdate) -> Self {
        Self {
            subject: update.subject,
            body: update.body,
            to_email: update.to_email,
            mail_account_id: update.mail_account_id,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct EmailDraftDBResponse {
    pub id: EmailDraftId,
    pub subject: String,
    pub body: String,
    pub to_email: String,
    pub status: DraftStatus,
    pub sent_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub deal_id: Option<DealId>,
    pub contact_id: Option<ContactId>,
    pub mail_account_id: Option<MailAccountId>,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
