//! API request/response models for tags.

use super::pagination::Pagination;
use crate::db::models::tags::TagDBResponse;
use crate::types::TagId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TagCreate {
    /// Unique, compared case-insensitively
    pub name: String,
    /// Free-form display color, e.g. `#22c55e`
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct TagUpdate {
    pub name: Option<String>,
    pub color: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TagResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: TagId,
    pub name: String,
    pub color: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<TagDBResponse> for TagResponse {
    fn from(db: TagDBResponse) -> Self {
        Self {
            id: db.id,
            name: db.name,
            color: db.color,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ListTagsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    /// Case-insensitive substring match on the tag name
    pub search: Option<String>,
}
