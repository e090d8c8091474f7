//! API request/response models for contacts.

use super::activities::ActivityResponse;
use super::deals::DealResponse;
use super::pagination::Pagination;
use super::tags::TagResponse;
use crate::db::models::contacts::ContactDBResponse;
use crate::types::{ContactId, TagId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ContactCreate {
    pub first_name: String,
    pub last_name: Option<String>,
    /// Unique across contacts, compared case-insensitively
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub title: Option<String>,
    pub notes: Option<String>,
    /// Defaults to the caller
    #[schema(value_type = Option<String>, format = "uuid")]
    pub owner_id: Option<UserId>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ContactUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub title: Option<String>,
    pub notes: Option<String>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub owner_id: Option<UserId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ContactResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: ContactId,
    pub first_name: String,
    pub last_name: Option<String>,
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub title: Option<String>,
    pub notes: Option<String>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub owner_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Present when `include=tags`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<TagResponse>>,
    /// Present when `include=deals`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deals: Option<Vec<DealResponse>>,
    /// Present when `include=activities`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activities: Option<Vec<ActivityResponse>>,
}

impl From<ContactDBResponse> for ContactResponse {
    fn from(db: ContactDBResponse) -> Self {
        Self {
            full_name: db.full_name(),
            id: db.id,
            first_name: db.first_name,
            last_name: db.last_name,
            email: db.email,
            phone: db.phone,
            company: db.company,
            title: db.title,
            notes: db.notes,
            owner_id: db.owner_id,
            created_at: db.created_at,
            updated_at: db.updated_at,
            tags: None,
            deals: None,
            activities: None,
        }
    }
}

impl ContactResponse {
    pub fn with_tags(mut self, tags: Vec<TagResponse>) -> Self {
        self.tags = Some(tags);
        self
    }

    pub fn with_deals(mut self, deals: Vec<DealResponse>) -> Self {
        self.deals = Some(deals);
        self
    }

    pub fn with_activities(mut self, activities: Vec<ActivityResponse>) -> Self {
        self.activities = Some(activities);
        self
    }
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ListContactsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    /// Case-insensitive match on first name, last name, email or company
    pub search: Option<String>,
    /// Only contacts carrying this tag
    #[param(value_type = Option<String>, format = "uuid")]
    #[schema(value_type = Option<String>, format = "uuid")]
    pub tag: Option<TagId>,
    #[param(value_type = Option<String>, format = "uuid")]
    #[schema(value_type = Option<String>, format = "uuid")]
    pub owner_id: Option<UserId>,
    /// Comma-separated related records to embed in each item: `tags`
    pub include: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct GetContactQuery {
    /// Comma-separated related records to embed: `tags`, `deals`, `activities`
    pub include: Option<String>,
}
