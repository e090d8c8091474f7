//! Database repository for customer organizations.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::organizations::{
        OrganizationCreateDBRequest, OrganizationDBResponse, OrganizationStatus, OrganizationUpdateDBRequest,
    },
};
use crate::types::{OrganizationId, Tier, abbrev_uuid};
use sqlx::{PgConnection, Postgres, QueryBuilder};
use tracing::instrument;

#[derive(Debug, Clone, Default)]
pub struct OrganizationFilter {
    pub skip: i64,
    pub limit: i64,
    pub status: Option<OrganizationStatus>,
    pub tier: Option<Tier>,
    pub search: Option<String>,
}

impl OrganizationFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            ..Default::default()
        }
    }
}

fn push_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &OrganizationFilter) {
    if let Some(status) = filter.status {
        query.push(" AND status = ");
        query.push_bind(status);
    }
    if let Some(tier) = filter.tier {
        query.push(" AND tier = ");
        query.push_bind(tier);
    }
    if let Some(ref search) = filter.search {
        query.push(" AND LOWER(name) LIKE ");
        query.push_bind(format!("%{}%", search.to_lowercase()));
    }
}

pub struct Organizations<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Organizations<'c> {
    type CreateRequest = OrganizationCreateDBRequest;
    type UpdateRequest = OrganizationUpdateDBRequest;
    type Response = OrganizationDBResponse;
    type Id = OrganizationId;
    type Filter = OrganizationFilter;

    #[instrument(skip(self, request), fields(name = %request.name, tier = %request.tier), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let org = sqlx::query_as::<_, OrganizationDBResponse>(
            r#"
            INSERT INTO organizations (
                name, tier, status, mrr, seats_purchased, seats_active, renewal_date,
                trial_ends_at, last_active_at, open_tickets, payment_failed, contact_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *
            "#,
        )
        .bind(&request.name)
        .bind(request.tier)
        .bind(request.status)
        .bind(request.mrr)
        .bind(request.seats_purchased)
        .bind(request.seats_active)
        .bind(request.renewal_date)
        .bind(request.trial_ends_at)
        .bind(request.last_active_at)
        .bind(request.open_tickets)
        .bind(request.payment_failed)
        .bind(request.contact_id)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(org)
    }

    #[instrument(skip(self), fields(organization_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let org = sqlx::query_as::<_, OrganizationDBResponse>("SELECT * FROM organizations WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(org)
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::new("SELECT * FROM organizations WHERE 1=1");
        push_filters(&mut query, filter);

        query.push(" ORDER BY name, id LIMIT ");
        query.push_bind(filter.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.skip);

        let orgs = query.build_query_as::<OrganizationDBResponse>().fetch_all(&mut *self.db).await?;
        Ok(orgs)
    }

    #[instrument(skip(self, filter), err)]
    async fn count(&mut self, filter: &Self::Filter) -> Result<i64> {
        let mut query = QueryBuilder::new("SELECT COUNT(*) FROM organizations WHERE 1=1");
        push_filters(&mut query, filter);

        let count: i64 = query.build_query_scalar().fetch_one(&mut *self.db).await?;
        Ok(count)
    }

    #[instrument(skip(self), fields(organization_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM organizations WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(organization_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let org = sqlx::query_as::<_, OrganizationDBResponse>(
            r#"
            UPDATE organizations SET
                name = COALESCE($2, name),
                tier = COALESCE($3, tier),
                status = COALESCE($4, status),
                mrr = COALESCE($5, mrr),
                seats_purchased = COALESCE($6, seats_purchased),
                seats_active = COALESCE($7, seats_active),
                renewal_date = COALESCE($8, renewal_date),
                trial_ends_at = COALESCE($9, trial_ends_at),
                last_active_at = COALESCE($10, last_active_at),
                open_tickets = COALESCE($11, open_tickets),
                payment_failed = COALESCE($12, payment_failed),
                contact_id = COALESCE($13, contact_id),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&request.name)
        .bind(request.tier)
        .bind(request.status)
        .bind(request.mrr)
        .bind(request.seats_purchased)
        .bind(request.seats_active)
        .bind(request.renewal_date)
        .bind(request.trial_ends_at)
        .bind(request.last_active_at)
        .bind(request.open_tickets)
        .bind(request.payment_failed)
        .bind(request.contact_id)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(org)
    }
}

impl<'c> Organizations<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Every organization, for portfolio-wide insights
    #[instrument(skip(self), err)]
    pub async fn list_all(&mut self) -> Result<Vec<OrganizationDBResponse>> {
        let orgs = sqlx::query_as::<_, OrganizationDBResponse>("SELECT * FROM organizations ORDER BY name, id")
            .fetch_all(&mut *self.db)
            .await?;

        Ok(orgs)
    }

    /// Load an organization and hold its row lock until the surrounding transaction ends
    #[instrument(skip(self), fields(organization_id = %abbrev_uuid(&id)), err)]
    pub async fn get_for_update(&mut self, id: OrganizationId) -> Result<Option<OrganizationDBResponse>> {
        let org = sqlx::query_as::<_, OrganizationDBResponse>("SELECT * FROM organizations WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(org)
    }

    /// Set status to churned and zero the recurring revenue
    #[instrument(skip(self), fields(organization_id = %abbrev_uuid(&id)), err)]
    pub async fn mark_churned(&mut self, id: OrganizationId) -> Result<OrganizationDBResponse> {
        let org = sqlx::query_as::<_, OrganizationDBResponse>(
            r#"
            UPDATE organizations SET
                status = 'churned',
                mrr = 0,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(org)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use sqlx::PgPool;

    fn org(name: &str, tier: Tier, mrr: i64) -> OrganizationCreateDBRequest {
        OrganizationCreateDBRequest {
            name: name.to_string(),
            tier,
            status: OrganizationStatus::Active,
            mrr: Decimal::from(mrr),
            seats_purchased: 10,
            seats_active: 5,
            renewal_date: None,
            trial_ends_at: None,
            last_active_at: None,
            open_tickets: 0,
            payment_failed: false,
            contact_id: None,
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_filter_and_update(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Organizations::new(&mut conn);

        let acme = repo.create(&org("Acme", Tier::Pro, 499)).await.unwrap();
        repo.create(&org("Globex", Tier::Starter, 49)).await.unwrap();
        let mut trial = org("Initech", Tier::Free, 0);
        trial.status = OrganizationStatus::Trial;
        repo.create(&trial).await.unwrap();

        let pro = OrganizationFilter {
            tier: Some(Tier::Pro),
            ..OrganizationFilter::new(0, 10)
        };
        assert_eq!(repo.count(&pro).await.unwrap(), 1);

        let trials = OrganizationFilter {
            status: Some(OrganizationStatus::Trial),
            ..OrganizationFilter::new(0, 10)
        };
        assert_eq!(repo.list(&trials).await.unwrap()[0].name, "Initech");

        let updated = repo
            .update(
                acme.id,
                &OrganizationUpdateDBRequest {
                    seats_active: Some(10),
                    open_tickets: Some(3),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.seats_active, 10);
        assert_eq!(updated.open_tickets, 3);
        assert_eq!(updated.mrr, Decimal::from(499));
        assert_eq!(repo.list_all().await.unwrap().len(), 3);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_seats_cannot_be_negative(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Organizations::new(&mut conn);

        let mut bad = org("Negative", Tier::Free, 0);
        bad.seats_active = -1;
        assert!(matches!(repo.create(&bad).await, Err(DbError::CheckViolation { .. })));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_mark_churned_zeroes_mrr(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Organizations::new(&mut conn);

        let created = repo.create(&org("Leaving", Tier::Starter, 99)).await.unwrap();
        let churned = repo.mark_churned(created.id).await.unwrap();
        assert_eq!(churned.status, OrganizationStatus::Churned);
        assert_eq!(churned.mrr, Decimal::ZERO);
    }
}
