//! API request/response models for deals.

use super::activities::ActivityResponse;
use super::pagination::Pagination;
use super::tags::TagResponse;
use crate::db::models::deals::DealDBResponse;
use crate::pipeline::DealStage;
use crate::types::{ContactId, DealId, TagId, Tier, UserId};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DealCreate {
    pub title: String,
    /// Defaults to `lead`
    pub stage: Option<DealStage>,
    /// 0-100; defaults to the stage's default probability
    pub probability: Option<i32>,
    /// Only kept for `closed_lost`
    pub lost_reason: Option<String>,
    pub tier: Option<Tier>,
    /// Defaults to 0
    #[schema(value_type = Option<String>)]
    pub value: Option<Decimal>,
    pub expected_close_date: Option<NaiveDate>,
    pub notes: Option<String>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub contact_id: Option<ContactId>,
    /// Defaults to the caller
    #[schema(value_type = Option<String>, format = "uuid")]
    pub owner_id: Option<UserId>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct DealUpdate {
    pub title: Option<String>,
    pub stage: Option<DealStage>,
    pub probability: Option<i32>,
    pub lost_reason: Option<String>,
    pub tier: Option<Tier>,
    #[schema(value_type = Option<String>)]
    pub value: Option<Decimal>,
    pub expected_close_date: Option<NaiveDate>,
    pub notes: Option<String>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub contact_id: Option<ContactId>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub owner_id: Option<UserId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DealResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: DealId,
    pub title: String,
    pub stage: DealStage,
    pub tier: Option<Tier>,
    #[schema(value_type = String)]
    pub value: Decimal,
    pub probability: i32,
    pub expected_close_date: Option<NaiveDate>,
    pub closed_at: Option<DateTime<Utc>>,
    pub lost_reason: Option<String>,
    pub notes: Option<String>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub contact_id: Option<ContactId>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub owner_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<TagResponse>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activities: Option<Vec<ActivityResponse>>,
}

impl From<DealDBResponse> for DealResponse {
    fn from(db: DealDBResponse) -> Self {
        Self {
            id: db.id,
            title: db.title,
            stage: db.stage,
            tier: db.tier,
            value: db.value,
            probability: db.probability,
            expected_close_date: db.expected_close_date,
            closed_at: db.closed_at,
            lost_reason: db.lost_reason,
            notes: db.notes,
            contact_id: db.contact_id,
            owner_id: db.owner_id,
            created_at: db.created_at,
            updated_at: db.updated_at,
            tags: None,
            activities: None,
        }
    }
}

impl DealResponse {
    pub fn with_tags(mut self, tags: Vec<TagResponse>) -> Self {
        self.tags = Some(tags);
        self
    }

    pub fn with_activities(mut self, activities: Vec<ActivityResponse>) -> Self {
        self.activities = Some(activities);
        self
    }
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ListDealsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    pub stage: Option<DealStage>,
    #[param(value_type = Option<String>, format = "uuid")]
    #[schema(value_type = Option<String>, format = "uuid")]
    pub owner_id: Option<UserId>,
    #[param(value_type = Option<String>, format = "uuid")]
    #[schema(value_type = Option<String>, format = "uuid")]
    pub contact_id: Option<ContactId>,
    #[param(value_type = Option<String>, format = "uuid")]
    #[schema(value_type = Option<String>, format = "uuid")]
    pub tag: Option<TagId>,
    /// Case-insensitive match on the deal title
    pub search: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct GetDealQuery {
    /// Comma-separated related records to embed: `tags`, `activities`
    pub include: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct PipelineQuery {
    /// Restrict the summary to one owner's deals
    #[param(value_type = Option<String>, format = "uuid")]
    #[schema(value_type = Option<String>, format = "uuid")]
    pub owner_id: Option<UserId>,
}
