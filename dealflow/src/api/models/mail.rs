//! API request/response models for mail accounts, email drafts and processed (inbound) emails.

use super::pagination::Pagination;
use crate::db::models::{
    email_drafts::{DraftStatus, EmailDraftDBResponse},
    mail_accounts::MailAccountDBResponse,
    processed_emails::ProcessedEmailDBResponse,
};
use crate::types::{ActivityId, ContactId, DealId, EmailDraftId, MailAccountId, ProcessedEmailId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

// ----- Mail accounts -----

/// A sending identity. Drafts sent through an account use its address and display name.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MailAccountCreate {
    pub email: String,
    pub display_name: Option<String>,
    /// Defaults to the caller
    #[schema(value_type = Option<String>, format = "uuid")]
    pub user_id: Option<UserId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MailAccountResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: MailAccountId,
    pub email: String,
    pub display_name: Option<String>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub user_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

impl From<MailAccountDBResponse> for MailAccountResponse {
    fn from(db: MailAccountDBResponse) -> Self {
        Self {
            id: db.id,
            email: db.email,
            display_name: db.display_name,
            user_id: db.user_id,
            created_at: db.created_at,
        }
    }
}

// ----- Email drafts -----

/// `subject` and `body` are templates with `contact`, `deal` and `sender` in scope, e.g.
/// `Hi {{ contact.first_name }}`. They are rendered once, when the draft is created.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EmailDraftCreate {
    pub subject: String,
    pub body: String,
    /// Defaults to the contact's email
    pub to_email: Option<String>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub deal_id: Option<DealId>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub contact_id: Option<ContactId>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub mail_account_id: Option<MailAccountId>,
}

/// Edits are stored verbatim, without template rendering
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct EmailDraftUpdate {
    pub subject: Option<String>,
    pub body: Option<String>,
    pub to_email: Option<String>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub mail_account_id: Option<MailAccountId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EmailDraftResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: EmailDraftId,
    pub subject: String,
    pub body: String,
    pub to_email: String,
    pub status: DraftStatus,
    pub sent_at: Option<DateTime<Utc>>,
    /// Delivery error from the last failed send
    pub error: Option<String>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub deal_id: Option<DealId>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub contact_id: Option<ContactId>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub mail_account_id: Option<MailAccountId>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<EmailDraftDBResponse> for EmailDraftResponse {
    fn from(db: EmailDraftDBResponse) -> Self {
        Self {
            id: db.id,
            subject: db.subject,
            body: db.body,
            to_email: db.to_email,
            status: db.status,
            sent_at: db.sent_at,
            error: db.error,
            deal_id: db.deal_id,
            contact_id: db.contact_id,
            mail_account_id: db.mail_account_id,
            created_by: db.created_by,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ListEmailDraftsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    pub status: Option<DraftStatus>,
    #[param(value_type = Option<String>, format = "uuid")]
    #[schema(value_type = Option<String>, format = "uuid")]
    pub deal_id: Option<DealId>,
    #[param(value_type = Option<String>, format = "uuid")]
    #[schema(value_type = Option<String>, format = "uuid")]
    pub contact_id: Option<ContactId>,
}

// ----- Processed emails -----

/// Summary of an inbound message, posted by whatever polls the mailbox
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProcessedEmailCreate {
    /// The RFC 5322 Message-ID; ingest is idempotent on it
    pub message_id: String,
    pub from_email: String,
    pub subject: Option<String>,
    pub received_at: DateTime<Utc>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub mail_account_id: Option<MailAccountId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProcessedEmailResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: ProcessedEmailId,
    pub message_id: String,
    pub from_email: String,
    pub subject: Option<String>,
    pub received_at: DateTime<Utc>,
    pub processed_at: DateTime<Utc>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub mail_account_id: Option<MailAccountId>,
    /// The contact matched by sender address, if any
    #[schema(value_type = Option<String>, format = "uuid")]
    pub contact_id: Option<ContactId>,
    /// The email activity logged for the matched contact
    #[schema(value_type = Option<String>, format = "uuid")]
    pub activity_id: Option<ActivityId>,
}

impl From<ProcessedEmailDBResponse> for ProcessedEmailResponse {
    fn from(db: ProcessedEmailDBResponse) -> Self {
        Self {
            id: db.id,
            message_id: db.message_id,
            from_email: db.from_email,
            subject: db.subject,
            received_at: db.received_at,
            processed_at: db.processed_at,
            mail_account_id: db.mail_account_id,
            contact_id: db.contact_id,
            activity_id: db.activity_id,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ListProcessedEmailsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    #[param(value_type = Option<String>, format = "uuid")]
    #[schema(value_type = Option<String>, format = "uuid")]
    pub contact_id: Option<ContactId>,
}
