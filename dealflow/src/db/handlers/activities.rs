//! Database repository for activities.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::activities::{ActivityCreateDBRequest, ActivityDBResponse, ActivityKind, ActivityUpdateDBRequest},
};
use crate::types::{ActivityId, ContactId, DealId, abbrev_uuid};
use sqlx::{PgConnection, Postgres, QueryBuilder};
use tracing::instrument;

/// Filter for listing activities
#[derive(Debug, Clone, Default)]
pub struct ActivityFilter {
    pub skip: i64,
    pub limit: i64,
    pub deal_id: Option<DealId>,
    pub contact_id: Option<ContactId>,
    pub kind: Option<ActivityKind>,
}

impl ActivityFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            ..Default::default()
        }
    }
}

fn push_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &ActivityFilter) {
    if let Some(deal_id) = filter.deal_id {
        query.push(" AND deal_id = ");
        query.push_bind(deal_id);
    }
    if let Some(contact_id) = filter.contact_id {
        query.push(" AND contact_id = ");
        query.push_bind(contact_id);
    }
    if let Some(kind) = filter.kind {
        query.push(" AND kind = ");
        query.push_bind(kind);
    }
}

pub struct Activities<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Activities<'c> {
    type CreateRequest = ActivityCreateDBRequest;
    type UpdateRequest = ActivityUpdateDBRequest;
    type Response = ActivityDBResponse;
    type Id = ActivityId;
    type Filter = ActivityFilter;

    #[instrument(skip(self, request), fields(kind = ?request.kind), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let activity = sqlx::query_as::<_, ActivityDBResponse>(
            r#"
            INSERT INTO activities (kind, subject, body, occurred_at, deal_id, contact_id, created_by)
            VALUES ($1, $2, $3, COALESCE($4, NOW()), $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(request.kind)
        .bind(&request.subject)
        .bind(&request.body)
        .bind(request.occurred_at)
        .bind(request.deal_id)
        .bind(request.contact_id)
        .bind(request.created_by)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(activity)
    }

    #[instrument(skip(self), fields(activity_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let activity = sqlx::query_as::<_, ActivityDBResponse>("SELECT * FROM activities WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(activity)
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::new("SELECT * FROM activities WHERE 1=1");
        push_filters(&mut query, filter);

        // Newest first
        query.push(" ORDER BY occurred_at DESC, created_at DESC LIMIT ");
        query.push_bind(filter.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.skip);

        let activities = query.build_query_as::<ActivityDBResponse>().fetch_all(&mut *self.db).await?;
        Ok(activities)
    }

    #[instrument(skip(self, filter), err)]
    async fn count(&mut self, filter: &Self::Filter) -> Result<i64> {
        let mut query = QueryBuilder::new("SELECT COUNT(*) FROM activities WHERE 1=1");
        push_filters(&mut query, filter);

        let count: i64 = query.build_query_scalar().fetch_one(&mut *self.db).await?;
        Ok(count)
    }

    #[instrument(skip(self), fields(activity_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM activities WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(activity_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let activity = sqlx::query_as::<_, ActivityDBResponse>(
            r#"
            UPDATE activities SET
                kind = COALESCE($2, kind),
                subject = COALESCE($3, subject),
                body = COALESCE($4, body),
                occurred_at = COALESCE($5, occurred_at),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(request.kind)
        .bind(&request.subject)
        .bind(&request.body)
        .bind(request.occurred_at)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(activity)
    }
}

impl<'c> Activities<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::handlers::Contacts;
    use crate::db::models::contacts::ContactCreateDBRequest;
    use chrono::{Duration, Utc};
    use sqlx::PgPool;

    async fn contact_id(conn: &mut PgConnection) -> ContactId {
        Contacts::new(conn)
            .create(&ContactCreateDBRequest {
                first_name: "Margaret".to_string(),
                last_name: Some("Hamilton".to_string()),
                email: None,
                phone: None,
                company: None,
                title: None,
                notes: None,
                owner_id: None,
            })
            .await
            .unwrap()
            .id
    }

    fn note(subject: &str, contact_id: Option<ContactId>) -> ActivityCreateDBRequest {
        ActivityCreateDBRequest {
            kind: ActivityKind::Note,
            subject: subject.to_string(),
            body: None,
            occurred_at: None,
            deal_id: None,
            contact_id,
            created_by: None,
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_activity_requires_deal_or_contact(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Activities::new(&mut conn);

        let err = repo.create(&note("orphan", None)).await.unwrap_err();
        assert!(matches!(err, DbError::CheckViolation { .. }));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_newest_first_and_filter_by_kind(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let contact = contact_id(&mut conn).await;
        let mut repo = Activities::new(&mut conn);

        let mut older = note("first call", Some(contact));
        older.kind = ActivityKind::Call;
        older.occurred_at = Some(Utc::now() - Duration::days(2));
        repo.create(&older).await.unwrap();
        let newer = repo.create(&note("follow-up note", Some(contact))).await.unwrap();

        let filter = ActivityFilter {
            contact_id: Some(contact),
            ..ActivityFilter::new(0, 10)
        };
        let listed = repo.list(&filter).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, newer.id);

        let calls = ActivityFilter {
            kind: Some(ActivityKind::Call),
            ..filter
        };
        assert_eq!(repo.count(&calls).await.unwrap(), 1);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_and_cascade_on_contact_delete(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let contact = contact_id(&mut conn).await;

        let activity = {
            let mut repo = Activities::new(&mut conn);
            let activity = repo.create(&note("draft", Some(contact))).await.unwrap();
            let updated = repo
                .update(
                    activity.id,
                    &ActivityUpdateDBRequest {
                        subject: Some("final".to_string()),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
            assert_eq!(updated.subject, "final");
            assert_eq!(updated.kind, ActivityKind::Note);
            activity
        };

        assert!(Contacts::new(&mut conn).delete(contact).await.unwrap());
        assert!(Activities::new(&mut conn).get_by_id(activity.id).await.unwrap().is_none());
    }
}
