//! Database models for contacts.

use crate::api::models::contacts::{ContactCreate, ContactUpdate};
use crate::types::{ContactId, UserId};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database request for creating a new contact
#[derive(Debug, Clone)]
pub struct ContactCreateDBRequest {
    pub first_name: String,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub title: Option<String>,
    pub notes: Option<String>,
    pub owner_id: Option<UserId>,
}

impl ContactCreateDBRequest {
    /// Build the insert from an API request; the owner defaults to the creating user.
    pub fn new(created_by: UserId, create: ContactCreate) -> Self {
        Self {
            first_name: create.first_name,
            last_name: create.last_name,
            email: create.email,
            phone: create.phone,
            company: create.company,
            title: create.title,
            notes: create.notes,
            owner_id: Some(create.owner_id.unwrap_or(created_by)),
        }
    }
}

/// Database request for updating a contact. `None` leaves the column unchanged.
#[derive(Debug, Clone, Default)]
pub struct ContactUpdateDBRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub title: Option<String>,
    pub notes: Option<String>,
    pub owner_id: Option<UserId>,
}

impl From<ContactUpdate> for ContactUpdateDBRequest {
    fn from(update: ContactUpdate) -> Self {
        Self {
            first_name: update.first_name,
            last_name: update.last_name,
            email: update.email,
            phone: update.phone,
            company: update.company,
            title: update.title,
            notes: update.notes,
            owner_id: update.owner_id,
        }
    }
}

/// Database response for a contact
#[derive(Debug, Clone, FromRow)]
pub struct ContactDBResponse {
    pub id: ContactId,
    pub first_name: String,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub title: Option<String>,
    pub notes: Option<String>,
    pub owner_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ContactDBResponse {
    /// "First Last", or just the first name
    pub fn full_name(&self) -> String {
        match &self.last_name {
            Some(last) if !last.is_empty() => format!("{} {}", self.first_name, last),
            _ => self.first_name.clone(),
        }
    }
}
