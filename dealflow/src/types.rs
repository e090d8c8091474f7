//! Common type definitions shared by the API and database layers.
//!
//! # ID Types
//!
//! All entity IDs are UUIDs wrapped in type aliases so signatures document what they expect:
//!
//! - [`UserId`], [`ContactId`], [`DealId`], [`ActivityId`], [`ReminderId`], [`TagId`]
//! - [`MailAccountId`], [`EmailDraftId`], [`ProcessedEmailId`]
//! - [`OrganizationId`], [`ChurnEventId`]
//!
//! # Tiers
//!
//! [`Tier`] is the subscription pricing level shared by deals (what is being sold) and
//! organizations (what a customer currently pays for). Tiers are ordered from lowest to highest.
//!
//! # Utility Functions
//!
//! - [`abbrev_uuid`]: Abbreviate UUIDs to first 8 chars for logging

use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;
use uuid::Uuid;

// Type aliases for IDs
pub type UserId = Uuid;
pub type ContactId = Uuid;
pub type DealId = Uuid;
pub type ActivityId = Uuid;
pub type ReminderId = Uuid;
pub type TagId = Uuid;
pub type MailAccountId = Uuid;
pub type EmailDraftId = Uuid;
pub type ProcessedEmailId = Uuid;
pub type OrganizationId = Uuid;
pub type ChurnEventId = Uuid;

/// Abbreviate a UUID to its first 8 characters for more readable logs and traces
/// Example: "550e8400-e29b-41d4-a716-446655440000" -> "550e8400"
pub fn abbrev_uuid(uuid: &Uuid) -> String {
    uuid.to_string().chars().take(8).collect()
}

/// Subscription pricing level, stored as TEXT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Free,
    Starter,
    Pro,
    Enterprise,
}

impl Tier {
    pub const ALL: [Tier; 4] = [Tier::Free, Tier::Starter, Tier::Pro, Tier::Enterprise];

    /// The next tier up, or `None` for the top tier.
    pub fn next(self) -> Option<Tier> {
        match self {
            Tier::Free => Some(Tier::Starter),
            Tier::Starter => Some(Tier::Pro),
            Tier::Pro => Some(Tier::Enterprise),
            Tier::Enterprise => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Starter => "starter",
            Tier::Pro => "pro",
            Tier::Enterprise => "enterprise",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Operations that can be performed on resources, used in authorization errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

// Resources guarded by role checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Users,
    Organizations,
    ChurnEvents,
    Insights,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Create => write!(f, "create"),
            Operation::Read => write!(f, "read"),
            Operation::Update => write!(f, "update"),
            Operation::Delete => write!(f, "delete"),
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Users => write!(f, "users"),
            Resource::Organizations => write!(f, "organizations"),
            Resource::ChurnEvents => write!(f, "churn events"),
            Resource::Insights => write!(f, "insights"),
        }
    }
}
