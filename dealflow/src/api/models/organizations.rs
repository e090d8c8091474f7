//! API request/response models for customer organizations and churn.

use super::pagination::Pagination;
use crate::db::models::organizations::{
    ChurnEventDBResponse, ChurnReason, OrganizationDBResponse, OrganizationStatus,
};
use crate::types::{ChurnEventId, ContactId, OrganizationId, Tier, UserId};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrganizationCreate {
    pub name: String,
    /// Defaults to `free`
    pub tier: Option<Tier>,
    /// Defaults to `trial`
    pub status: Option<OrganizationStatus>,
    #[schema(value_type = Option<String>)]
    pub mrr: Option<Decimal>,
    pub seats_purchased: Option<i32>,
    pub seats_active: Option<i32>,
    pub renewal_date: Option<NaiveDate>,
    pub trial_ends_at: Option<NaiveDate>,
    pub last_active_at: Option<DateTime<Utc>>,
    pub open_tickets: Option<i32>,
    pub payment_failed: Option<bool>,
    /// Primary contact
    #[schema(value_type = Option<String>, format = "uuid")]
    pub contact_id: Option<ContactId>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct OrganizationUpdate {
    pub name: Option<String>,
    pub tier: Option<Tier>,
    /// Use the churn endpoint to churn an organization so the event is recorded
    pub status: Option<OrganizationStatus>,
    #[schema(value_type = Option<String>)]
    pub mrr: Option<Decimal>,
    pub seats_purchased: Option<i32>,
    pub seats_active: Option<i32>,
    pub renewal_date: Option<NaiveDate>,
    pub trial_ends_at: Option<NaiveDate>,
    pub last_active_at: Option<DateTime<Utc>>,
    pub open_tickets: Option<i32>,
    pub payment_failed: Option<bool>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub contact_id: Option<ContactId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrganizationResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: OrganizationId,
    pub name: String,
    pub tier: Tier,
    pub status: OrganizationStatus,
    #[schema(value_type = String)]
    pub mrr: Decimal,
    pub seats_purchased: i32,
    pub seats_active: i32,
    pub renewal_date: Option<NaiveDate>,
    pub trial_ends_at: Option<NaiveDate>,
    pub last_active_at: Option<DateTime<Utc>>,
    pub open_tickets: i32,
    pub payment_failed: bool,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub contact_id: Option<ContactId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<OrganizationDBResponse> for OrganizationResponse {
    fn from(db: OrganizationDBResponse) -> Self {
        Self {
            id: db.id,
            name: db.name,
            tier: db.tier,
            status: db.status,
            mrr: db.mrr,
            seats_purchased: db.seats_purchased,
            seats_active: db.seats_active,
            renewal_date: db.renewal_date,
            trial_ends_at: db.trial_ends_at,
            last_active_at: db.last_active_at,
            open_tickets: db.open_tickets,
            payment_failed: db.payment_failed,
            contact_id: db.contact_id,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ListOrganizationsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    pub status: Option<OrganizationStatus>,
    pub tier: Option<Tier>,
    /// Case-insensitive match on the organization name
    pub search: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChurnRequest {
    pub reason: ChurnReason,
    pub details: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChurnEventResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: ChurnEventId,
    #[schema(value_type = String, format = "uuid")]
    pub organization_id: OrganizationId,
    pub reason: ChurnReason,
    pub details: Option<String>,
    /// MRR at the moment of churn
    #[schema(value_type = String)]
    pub lost_mrr: Decimal,
    pub churned_at: DateTime<Utc>,
    #[schema(value_type = Option<String>, format = "uuid")]
    pub recorded_by: Option<UserId>,
}

impl From<ChurnEventDBResponse> for ChurnEventResponse {
    fn from(db: ChurnEventDBResponse) -> Self {
        Self {
            id: db.id,
            organization_id: db.organization_id,
            reason: db.reason,
            details: db.details,
            lost_mrr: db.lost_mrr,
            churned_at: db.churned_at,
            recorded_by: db.recorded_by,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ListChurnEventsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    #[param(value_type = Option<String>, format = "uuid")]
    #[schema(value_type = Option<String>, format = "uuid")]
    pub organization_id: Option<OrganizationId>,
}

#[serde_as]
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct ChurnStatsQuery {
    /// Look-back window in days; defaults to `insights.churn_lookback_days`
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub days: Option<i64>,
}
