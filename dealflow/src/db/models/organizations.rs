//! Database models for customer organizations and their churn history.

use crate::api::models::organizations::{OrganizationCreate, OrganizationUpdate};
use crate::types::{ChurnEventId, ContactId, OrganizationId, Tier, UserId};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use utoipa::ToSchema;

/// Lifecycle state of a customer, stored as TEXT
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrganizationStatus {
    Trial,
    Active,
    Churned,
}

/// Why a customer left, stored as TEXT
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ChurnReason {
    Price,
    ProductGaps,
    Competitor,
    Support,
    BusinessClosed,
    Other,
}

impl fmt::Display for ChurnReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChurnReason::Price => "price",
            ChurnReason::ProductGaps => "product_gaps",
            ChurnReason::Competitor => "competitor",
            ChurnReason::Support => "support",
            ChurnReason::BusinessClosed => "business_closed",
            ChurnReason::Other => "other",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
pub struct OrganizationCreateDBRequest {
    pub name: String,
    pub tier: Tier,
    pub status: OrganizationStatus,
    pub mrr: Decimal,
    pub seats_purchased: i32,
    pub seats_active: i32,
    pub renewal_date: Option<NaiveDate>,
    pub trial_ends_at: Option<NaiveDate>,
    pub last_active_at: Option<DateTime<Utc>>,
    pub open_tickets: i32,
    pub payment_failed: bool,
    pub contact_id: Option<ContactId>,
}

impl From<OrganizationCreate> for OrganizationCreateDBRequest {
    fn from(create: OrganizationCreate) -> Self {
        Self {
            name: create.name,
            tier: create.tier.unwrap_or(Tier::Free),
            status: create.status.unwrap_or(OrganizationStatus::Trial),
            mrr: create.mrr.unwrap_or(Decimal::ZERO),
            seats_purchased: create.seats_purchased.unwrap_or(0),
            seats_active: create.seats_active.unwrap_or(0),
            renewal_date: create.renewal_date,
            trial_ends_at: create.trial_ends_at,
            last_active_at: create.last_active_at,
            open_tickets: create.open_tickets.unwrap_or(0),
            payment_failed: create.payment_failed.unwrap_or(false),
            contact_id: create.contact_id,
        }
    }
}

/// Status changes to `churned` go through the churn operation, not a plain update.
#[derive(Debug, Clone, Default)]
pub struct OrganizationUpdateDBRequest {
    pub name: Option<String>,
    pub tier: Option<Tier>,
    pub status: Option<OrganizationStatus>,
    pub mrr: Option<Decimal>,
    pub seats_purchased: Option<i32>,
    pub seats_active: Option<i32>,
    pub renewal_date: Option<NaiveDate>,
    pub trial_ends_at: Option<NaiveDate>,
    pub last_active_at: Option<DateTime<Utc>>,
    pub open_tickets: Option<i32>,
    pub payment_failed: Option<bool>,
    pub contact_id: Option<ContactId>,
}

impl From<OrganizationUpdate> for OrganizationUpdateDBRequest {
    fn from(update: OrganizationUpdate) -> Self {
        Self {
            name: update.name,
            tier: update.tier,
            status: update.status,
            mrr: update.mrr,
            seats_purchased: update.seats_purchased,
            seats_active: update.seats_active,
            renewal_date: update.renewal_date,
            trial_ends_at: update.trial_ends_at,
            last_active_at: update.last_active_at,
            open_tickets: update.open_tickets,
            payment_failed: update.payment_failed,
            contact_id: update.contact_id,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct OrganizationDBResponse {
    pub id: OrganizationId,
    pub name: String,
    pub tier: Tier,
    pub status: OrganizationStatus,
    pub mrr: Decimal,
    pub seats_purchased: i32,
    pub seats_active: i32,
    pub renewal_date: Option<NaiveDate>,
    pub trial_ends_at: Option<NaiveDate>,
    pub last_active_at: Option<DateTime<Utc>>,
    pub open_tickets: i32,
    pub payment_failed: bool,
    pub contact_id: Option<ContactId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ChurnEventCreateDBRequest {
    pub organization_id: OrganizationId,
    pub reason: ChurnReason,
    pub details: Option<String>,
    pub recorded_by: Option<UserId>,
}

#[derive(Debug, Clone, FromRow)]
pub struct ChurnEventDBResponse {
    pub id: ChurnEventId,
    pub organization_id: OrganizationId,
    pub reason: ChurnReason,
    pub details: Option<String>,
    pub lost_mrr: Decimal,
    pub churned_at: DateTime<Utc>,
    pub recorded_by: Option<UserId>,
}
