//! Database repository for deals.
//!
//! Stage changes are resolved against the stored row while it is locked, so two concurrent
//! updates cannot interleave between reading the current stage and writing the new one.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::deals::{DealCreateDBRequest, DealDBResponse, DealUpdateDBRequest},
};
use crate::pipeline::{self, DealStage, StageState};
use crate::types::{ContactId, DealId, TagId, UserId, abbrev_uuid};
use chrono::Utc;
use sqlx::{Connection, PgConnection, Postgres, QueryBuilder};
use std::collections::HashMap;
use tracing::instrument;

/// Filter for listing deals
#[derive(Debug, Clone, Default)]
pub struct DealFilter {
    pub skip: i64,
    pub limit: i64,
    pub stage: Option<DealStage>,
    pub owner_id: Option<UserId>,
    pub contact_id: Option<ContactId>,
    pub tag_id: Option<TagId>,
    /// Case-insensitive substring match on title
    pub search: Option<String>,
}

impl DealFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            ..Default::default()
        }
    }
}

fn push_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &DealFilter) {
    if let Some(stage) = filter.stage {
        query.push(" AND stage = ");
        query.push_bind(stage);
    }
    if let Some(owner_id) = filter.owner_id {
        query.push(" AND owner_id = ");
        query.push_bind(owner_id);
    }
    if let Some(contact_id) = filter.contact_id {
        query.push(" AND contact_id = ");
        query.push_bind(contact_id);
    }
    if let Some(tag_id) = filter.tag_id {
        query.push(" AND id IN (SELECT deal_id FROM deal_tags WHERE tag_id = ");
        query.push_bind(tag_id);
        query.push(")");
    }
    if let Some(ref search) = filter.search {
        query.push(" AND LOWER(title) LIKE ");
        query.push_bind(format!("%{}%", search.to_lowercase()));
    }
}

/// Result of an update: the stored deal and the stage it had before
#[derive(Debug, Clone)]
pub struct DealTransition {
    pub deal: DealDBResponse,
    pub previous_stage: DealStage,
}

impl DealTransition {
    /// True when this update moved an open deal into a closed stage, or between closed stages
    pub fn closed_now(&self) -> bool {
        self.deal.stage.is_closed() && self.deal.stage != self.previous_stage
    }
}

pub struct Deals<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Deals<'c> {
    type CreateRequest = DealCreateDBRequest;
    type UpdateRequest = DealUpdateDBRequest;
    type Response = DealDBResponse;
    type Id = DealId;
    type Filter = DealFilter;

    #[instrument(skip(self, request), fields(title = %request.title, stage = %request.stage), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let deal = sqlx::query_as::<_, DealDBResponse>(
            r#"
            INSERT INTO deals (
                title, stage, tier, value, probability, expected_close_date,
                closed_at, lost_reason, notes, contact_id, owner_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(&request.title)
        .bind(request.stage)
        .bind(request.tier)
        .bind(request.value)
        .bind(request.probability)
        .bind(request.expected_close_date)
        .bind(request.closed_at)
        .bind(&request.lost_reason)
        .bind(&request.notes)
        .bind(request.contact_id)
        .bind(request.owner_id)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(deal)
    }

    #[instrument(skip(self), fields(deal_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let deal = sqlx::query_as::<_, DealDBResponse>("SELECT * FROM deals WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(deal)
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::new("SELECT * FROM deals WHERE 1=1");
        push_filters(&mut query, filter);

        query.push(" ORDER BY created_at DESC, id LIMIT ");
        query.push_bind(filter.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.skip);

        let deals = query.build_query_as::<DealDBResponse>().fetch_all(&mut *self.db).await?;
        Ok(deals)
    }

    #[instrument(skip(self, filter), err)]
    async fn count(&mut self, filter: &Self::Filter) -> Result<i64> {
        let mut query = QueryBuilder::new("SELECT COUNT(*) FROM deals WHERE 1=1");
        push_filters(&mut query, filter);

        let count: i64 = query.build_query_scalar().fetch_one(&mut *self.db).await?;
        Ok(count)
    }

    #[instrument(skip(self), fields(deal_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM deals WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        Ok(self.update_tracked(id, request).await?.deal)
    }
}

impl<'c> Deals<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Update a deal, applying the stage rules to the locked row.
    #[instrument(skip(self, request), fields(deal_id = %abbrev_uuid(&id)), err)]
    pub async fn update_tracked(&mut self, id: DealId, request: &DealUpdateDBRequest) -> Result<DealTransition> {
        let mut tx = self.db.begin().await?;

        let current = sqlx::query_as::<_, DealDBResponse>("SELECT * FROM deals WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(DbError::NotFound)?;

        let next = pipeline::apply_stage_change(&StageState::from(&current), request.stage_change(), Utc::now());

        let deal = sqlx::query_as::<_, DealDBResponse>(
            r#"
            UPDATE deals SET
                title = COALESCE($2, title),
                tier = COALESCE($3, tier),
                value = COALESCE($4, value),
                expected_close_date = COALESCE($5, expected_close_date),
                notes = COALESCE($6, notes),
                contact_id = COALESCE($7, contact_id),
                owner_id = COALESCE($8, owner_id),
                stage = $9,
                probability = $10,
                closed_at = $11,
                lost_reason = $12,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&request.title)
        .bind(request.tier)
        .bind(request.value)
        .bind(request.expected_close_date)
        .bind(&request.notes)
        .bind(request.contact_id)
        .bind(request.owner_id)
        .bind(next.stage)
        .bind(next.probability)
        .bind(next.closed_at)
        .bind(&next.lost_reason)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(DealTransition {
            deal,
            previous_stage: current.stage,
        })
    }

    /// Every deal (optionally one owner's), unpaginated, for pipeline summaries
    #[instrument(skip(self), err)]
    pub async fn list_all(&mut self, owner_id: Option<UserId>) -> Result<Vec<DealDBResponse>> {
        let deals = sqlx::query_as::<_, DealDBResponse>(
            "SELECT * FROM deals WHERE ($1::uuid IS NULL OR owner_id = $1) ORDER BY created_at",
        )
        .bind(owner_id)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(deals)
    }

    /// Deals linked to any of the given contacts, keyed by contact
    #[instrument(skip(self, contact_ids), fields(count = contact_ids.len()), err)]
    pub async fn list_for_contacts(&mut self, contact_ids: &[ContactId]) -> Result<HashMap<ContactId, Vec<DealDBResponse>>> {
        if contact_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let deals = sqlx::query_as::<_, DealDBResponse>(
            "SELECT * FROM deals WHERE contact_id = ANY($1) ORDER BY created_at DESC",
        )
        .bind(contact_ids)
        .fetch_all(&mut *self.db)
        .await?;

        let mut by_contact: HashMap<ContactId, Vec<DealDBResponse>> = HashMap::new();
        for deal in deals {
            if let Some(contact_id) = deal.contact_id {
                by_contact.entry(contact_id).or_default().push(deal);
            }
        }
        Ok(by_contact)
    }

    #[instrument(skip(self), fields(deal_id = %abbrev_uuid(&deal_id), tag_id = %abbrev_uuid(&tag_id)), err)]
    pub async fn add_tag(&mut self, deal_id: DealId, tag_id: TagId) -> Result<()> {
        match sqlx::query("INSERT INTO deal_tags (deal_id, tag_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(deal_id)
            .bind(tag_id)
            .execute(&mut *self.db)
            .await
        {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_foreign_key_violation() => Err(DbError::NotFound),
            Err(e) => Err(DbError::from(e)),
        }
    }

    #[instrument(skip(self), fields(deal_id = %abbrev_uuid(&deal_id), tag_id = %abbrev_uuid(&tag_id)), err)]
    pub async fn remove_tag(&mut self, deal_id: DealId, tag_id: TagId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM deal_tags WHERE deal_id = $1 AND tag_id = $2")
            .bind(deal_id)
            .bind(tag_id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
