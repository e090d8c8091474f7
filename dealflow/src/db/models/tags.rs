//! Database models for tags.

use crate::api::models::tags::{TagCreate, TagUpdate};
use crate::types::TagId;
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone)]
pub struct TagCreateDBRequest {
    pub name: String,
    pub color: Option<String>,
}

impl From<TagCreate> for TagCreateDBRequest {
    fn from(create: TagCreate) -> Self {
        Self {
            name: create.name.trim().to_string(),
            color: create.color,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TagUpdateDBRequest {
    pub name: Option<String>,
    pub color: Option<String>,
}

impl From<TagUpdate> for TagUpdateDBRequest {
    fn from(update: TagUpdate) -> Self {
        Self {
            name: update.name.map(|n| n.trim().to_string()),
            color: update.color,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct TagDBResponse {
    pub id: TagId,
    pub name: String,
    pub color: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
