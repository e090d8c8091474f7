//! API request/response models for activities (calls, emails, meetings, notes and tasks).

use super::pagination::Pagination;
use crate::db::models::activities::{ActivityDBResponse, ActivityKind};
use crate::types::{ActivityId, ContactId, DealId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// At least one of `deal_id` and `contact_id` is required.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ActivityCreate {
    pub kind: ActivityKind,
    pub subject: String,
    pub body: Option<String>,
    /// Defaults to now
    pub occurred_at: Option<DateTime<Utc>>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub deal_id: Option<DealId>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub contact_id: Option<ContactId>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ActivityUpdate {
    pub kind: Option<ActivityKind>,
    pub subject: Option<String>,
    pub body: Option<String>,
    pub occurred_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ActivityResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: ActivityId,
    pub kind: ActivityKind,
    pub subject: String,
    pub body: Option<String>,
    pub occurred_at: DateTime<Utc>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub deal_id: Option<DealId>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub contact_id: Option<ContactId>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ActivityDBResponse> for ActivityResponse {
    fn from(db: ActivityDBResponse) -> Self {
        Self {
            id: db.id,
            kind: db.kind,
            subject: db.subject,
            body: db.body,
            occurred_at: db.occurred_at,
            deal_id: db.deal_id,
            contact_id: db.contact_id,
            created_by: db.created_by,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ListActivitiesQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    #[param(value_type = Option<String>, format = "uuid")]
    #[schema(value_type = Option<String>, format = "uuid")]
    pub deal_id: Option<DealId>,
    #[param(value_type = Option<String>, format = "uuid")]
    #[schema(value_type = Option<String>, format = "uuid")]
    pub contact_id: Option<ContactId>,
    pub kind: Option<ActivityKind>,
}
