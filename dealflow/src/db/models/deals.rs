//! Database models for deals.

use crate::api::models::deals::{DealCreate, DealUpdate};
use crate::pipeline::{self, DealStage, StageChange};
use crate::types::{ContactId, DealId, Tier, UserId};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;

/// Database request for creating a new deal.
///
/// The stage-dependent fields are already resolved by [`pipeline::initial_state`].
#[derive(Debug, Clone)]
pub struct DealCreateDBRequest {
    pub title: String,
    pub stage: DealStage,
    pub tier: Option<Tier>,
    pub value: Decimal,
    pub probability: i32,
    pub expected_close_date: Option<NaiveDate>,
    pub closed_at: Option<DateTime<Utc>>,
    pub lost_reason: Option<String>,
    pub notes: Option<String>,
    pub contact_id: Option<ContactId>,
    pub owner_id: Option<UserId>,
}

impl DealCreateDBRequest {
    pub fn new(created_by: UserId, create: DealCreate, now: DateTime<Utc>) -> Self {
        let state = pipeline::initial_state(
            StageChange {
                stage: create.stage,
                probability: create.probability,
                lost_reason: create.lost_reason,
            },
            now,
        );

        Self {
            title: create.title,
            stage: state.stage,
            tier: create.tier,
            value: create.value.unwrap_or(Decimal::ZERO),
            probability: state.probability,
            expected_close_date: create.expected_close_date,
            closed_at: state.closed_at,
            lost_reason: state.lost_reason,
            notes: create.notes,
            contact_id: create.contact_id,
            owner_id: Some(create.owner_id.unwrap_or(created_by)),
        }
    }
}

/// Database request for updating a deal.
///
/// The stage fields are a requested change, resolved against the locked row at write time.
#[derive(Debug, Clone, Default)]
pub struct DealUpdateDBRequest {
    pub title: Option<String>,
    pub tier: Option<Tier>,
    pub value: Option<Decimal>,
    pub expected_close_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub contact_id: Option<ContactId>,
    pub owner_id: Option<UserId>,
    pub stage: Option<DealStage>,
    pub probability: Option<i32>,
    pub lost_reason: Option<String>,
}

impl DealUpdateDBRequest {
    pub fn stage_change(&self) -> StageChange {
        StageChange {
            stage: self.stage,
            probability: self.probability,
            lost_reason: self.lost_reason.clone(),
        }
    }
}

impl From<DealUpdate> for DealUpdateDBRequest {
    fn from(update: DealUpdate) -> Self {
        Self {
            title: update.title,
            tier: update.tier,
            value: update.value,
            expected_close_date: update.expected_close_date,
            notes: update.notes,
            contact_id: update.contact_id,
            owner_id: update.owner_id,
            stage: update.stage,
            probability: update.probability,
            lost_reason: update.lost_reason,
        }
    }
}

/// Database response for a deal
#[derive(Debug, Clone, FromRow)]
pub struct DealDBResponse {
    pub id: DealId,
    pub title: String,
    pub stage: DealStage,
    pub tier: Option<Tier>,
    pub value: Decimal,
    pub probability: i32,
    pub expected_close_date: Option<NaiveDate>,
    pub closed_at: Option<DateTime<Utc>>,
    pub lost_reason: Option<String>,
    pub notes: Option<String>,
    pub contact_id: Option<ContactId>,
    pub owner_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
