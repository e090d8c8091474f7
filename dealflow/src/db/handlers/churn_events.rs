//! Database repository for churn events.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgConnection;
use tracing::instrument;

use crate::db::errors::Result;
use crate::db::models::organizations::{ChurnEventCreateDBRequest, ChurnEventDBResponse};
use crate::types::{OrganizationId, abbrev_uuid};

pub struct ChurnEvents<'c> {
    db: &'c mut PgConnection,
}

impl<'c> ChurnEvents<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Record a churn, snapshotting the revenue that was lost
    #[instrument(skip(self, request), fields(organization_id = %abbrev_uuid(&request.organization_id), reason = %request.reason), err)]
    pub async fn create(&mut self, request: &ChurnEventCreateDBRequest, lost_mrr: Decimal) -> Result<ChurnEventDBResponse> {
        let event = sqlx::query_as::<_, ChurnEventDBResponse>(
            r#"
            INSERT INTO churn_events (organization_id, reason, details, lost_mrr, recorded_by)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(request.organization_id)
        .bind(request.reason)
        .bind(&request.details)
        .bind(lost_mrr)
        .bind(request.recorded_by)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(event)
    }

    /// Newest first, optionally for a single organization
    #[instrument(skip(self), err)]
    pub async fn list(
        &mut self,
        organization_id: Option<OrganizationId>,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<ChurnEventDBResponse>> {
        let events = sqlx::query_as::<_, ChurnEventDBResponse>(
            r#"
            SELECT * FROM churn_events
            WHERE ($1::uuid IS NULL OR organization_id = $1)
            ORDER BY churned_at DESC, id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(organization_id)
        .bind(limit)
        .bind(skip)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(events)
    }

    #[instrument(skip(self), err)]
    pub async fn count(&mut self, organization_id: Option<OrganizationId>) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM churn_events WHERE ($1::uuid IS NULL OR organization_id = $1)")
                .bind(organization_id)
                .fetch_one(&mut *self.db)
                .await?;

        Ok(count)
    }

    /// Every event at or after `since`, for churn statistics
    #[instrument(skip(self), err)]
    pub async fn list_since(&mut self, since: DateTime<Utc>) -> Result<Vec<ChurnEventDBResponse>> {
        let events = sqlx::query_as::<_, ChurnEventDBResponse>(
            "SELECT * FROM churn_events WHERE churned_at >= $1 ORDER BY churned_at",
        )
        .bind(since)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::handlers::{Organizations, Repository};
    use crate::db::models::organizations::{ChurnReason, OrganizationCreateDBRequest, OrganizationStatus};
    use crate::types::Tier;
    use chrono::Duration;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_record_and_list_churn(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();

        let org = Organizations::new(&mut conn)
            .create(&OrganizationCreateDBRequest {
                name: "Hooli".to_string(),
                tier: Tier::Enterprise,
                status: OrganizationStatus::Active,
                mrr: Decimal::from(2500),
                seats_purchased: 100,
                seats_active: 20,
                renewal_date: None,
                trial_ends_at: None,
                last_active_at: None,
                open_tickets: 7,
                payment_failed: false,
                contact_id: None,
            })
            .await
            .unwrap();

        let mut repo = ChurnEvents::new(&mut conn);
        let event = repo
            .create(
                &ChurnEventCreateDBRequest {
                    organization_id: org.id,
                    reason: ChurnReason::Competitor,
                    details: Some("moved to Pied Piper".to_string()),
                    recorded_by: None,
                },
                org.mrr,
            )
            .await
            .unwrap();
        assert_eq!(event.lost_mrr, Decimal::from(2500));
        assert_eq!(event.reason, ChurnReason::Competitor);

        assert_eq!(repo.count(Some(org.id)).await.unwrap(), 1);
        assert_eq!(repo.count(Some(uuid::Uuid::new_v4())).await.unwrap(), 0);
        assert_eq!(repo.list(None, 0, 10).await.unwrap().len(), 1);
        assert_eq!(repo.list_since(Utc::now() - Duration::days(1)).await.unwrap().len(), 1);
        assert!(repo.list_since(Utc::now() + Duration::days(1)).await.unwrap().is_empty());
    }
}
