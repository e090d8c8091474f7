//! Database repository for reminders.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::reminders::{ReminderCreateDBRequest, ReminderDBResponse, ReminderStatus, ReminderUpdateDBRequest},
};
use crate::types::{ContactId, DealId, ReminderId, UserId, abbrev_uuid};
use chrono::{DateTime, Duration, Utc};
use sqlx::{PgConnection, Postgres, QueryBuilder};
use tracing::instrument;

/// Filter for listing reminders
#[derive(Debug, Clone)]
pub struct ReminderFilter {
    pub skip: i64,
    pub limit: i64,
    /// Reference time for the `overdue` and `due_today` statuses, fixed so `list` and `count` agree
    pub as_of: DateTime<Utc>,
    pub status: Option<ReminderStatus>,
    pub owner_id: Option<UserId>,
    pub deal_id: Option<DealId>,
    pub contact_id: Option<ContactId>,
}

impl ReminderFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            as_of: Utc::now(),
            status: None,
            owner_id: None,
            deal_id: None,
            contact_id: None,
        }
    }

    pub fn with_as_of(mut self, as_of: DateTime<Utc>) -> Self {
        self.as_of = as_of;
        self
    }
}

/// Start and end of the UTC day containing `now`
fn day_bounds(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = now
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
        .unwrap_or(now);
    (start, start + Duration::days(1))
}

fn push_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &ReminderFilter) {
    let now = filter.as_of;
    match filter.status {
        Some(ReminderStatus::Open) => {
            query.push(" AND completed_at IS NULL");
        }
        Some(ReminderStatus::Completed) => {
            query.push(" AND completed_at IS NOT NULL");
        }
        Some(ReminderStatus::Overdue) => {
            query.push(" AND completed_at IS NULL AND due_at < ");
            query.push_bind(now);
        }
        Some(ReminderStatus::DueToday) => {
            let (start, end) = day_bounds(now);
            query.push(" AND completed_at IS NULL AND due_at >= ");
            query.push_bind(start);
            query.push(" AND due_at < ");
            query.push_bind(end);
        }
        None => {}
    }
    if let Some(owner_id) = filter.owner_id {
        query.push(" AND owner_id = ");
        query.push_bind(owner_id);
    }
    if let Some(deal_id) = filter.deal_id {
        query.push(" AND deal_id = ");
        query.push_bind(deal_id);
    }
    if let Some(contact_id) = filter.contact_id {
        query.push(" AND contact_id = ");
        query.push_bind(contact_id);
    }
}

pub struct Reminders<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Reminders<'c> {
    type CreateRequest = ReminderCreateDBRequest;
    type UpdateRequest = ReminderUpdateDBRequest;
    type Response = ReminderDBResponse;
    type Id = ReminderId;
    type Filter = ReminderFilter;

    #[instrument(skip(self, request), fields(title = %request.title), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let reminder = sqlx::query_as::<_, ReminderDBResponse>(
            r#"
            INSERT INTO reminders (title, notes, due_at, deal_id, contact_id, owner_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(&request.title)
        .bind(&request.notes)
        .bind(request.due_at)
        .bind(request.deal_id)
        .bind(request.contact_id)
        .bind(request.owner_id)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(reminder)
    }

    #[instrument(skip(self), fields(reminder_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let reminder = sqlx::query_as::<_, ReminderDBResponse>("SELECT * FROM reminders WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(reminder)
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip, status = ?filter.status), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::new("SELECT * FROM reminders WHERE 1=1");
        push_filters(&mut query, filter);

        query.push(" ORDER BY due_at, id LIMIT ");
        query.push_bind(filter.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.skip);

        let reminders = query.build_query_as::<ReminderDBResponse>().fetch_all(&mut *self.db).await?;
        Ok(reminders)
    }

    #[instrument(skip(self, filter), err)]
    async fn count(&mut self, filter: &Self::Filter) -> Result<i64> {
        let mut query = QueryBuilder::new("SELECT COUNT(*) FROM reminders WHERE 1=1");
        push_filters(&mut query, filter);

        let count: i64 = query.build_query_scalar().fetch_one(&mut *self.db).await?;
        Ok(count)
    }

    #[instrument(skip(self), fields(reminder_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM reminders WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(reminder_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let reminder = sqlx::query_as::<_, ReminderDBResponse>(
            r#"
            UPDATE reminders SET
                title = COALESCE($2, title),
                notes = COALESCE($3, notes),
                due_at = COALESCE($4, due_at),
                owner_id = COALESCE($5, owner_id),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&request.title)
        .bind(&request.notes)
        .bind(request.due_at)
        .bind(request.owner_id)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(reminder)
    }
}

impl<'c> Reminders<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Mark a reminder done. An already completed reminder keeps its original timestamp.
    #[instrument(skip(self), fields(reminder_id = %abbrev_uuid(&id)), err)]
    pub async fn complete(&mut self, id: ReminderId) -> Result<ReminderDBResponse> {
        let reminder = sqlx::query_as::<_, ReminderDBResponse>(
            r#"
            UPDATE reminders SET
                completed_at = COALESCE(completed_at, NOW()),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(reminder)
    }

    #[instrument(skip(self), fields(reminder_id = %abbrev_uuid(&id)), err)]
    pub async fn reopen(&mut self, id: ReminderId) -> Result<ReminderDBResponse> {
        let reminder = sqlx::query_as::<_, ReminderDBResponse>(
            "UPDATE reminders SET completed_at = NULL, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(reminder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::PgPool;

    fn reminder(title: &str, due_at: DateTime<Utc>) -> ReminderCreateDBRequest {
        ReminderCreateDBRequest {
            title: title.to_string(),
            notes: None,
            due_at,
            deal_id: None,
            contact_id: None,
            owner_id: None,
        }
    }

    #[test]
    fn test_day_bounds() {
        let now = "2025-05-20T15:42:00Z".parse::<DateTime<Utc>>().unwrap();
        let (start, end) = day_bounds(now);
        assert_eq!(start, "2025-05-20T00:00:00Z".parse::<DateTime<Utc>>().unwrap());
        assert_eq!(end - start, Duration::days(1));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_complete_is_idempotent_and_reopen_clears(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Reminders::new(&mut conn);

        let created = repo.create(&reminder("Send proposal", Utc::now())).await.unwrap();
        assert!(created.completed_at.is_none());

        let first = repo.complete(created.id).await.unwrap();
        let second = repo.complete(created.id).await.unwrap();
        assert!(first.completed_at.is_some());
        assert_eq!(first.completed_at, second.completed_at);

        let reopened = repo.reopen(created.id).await.unwrap();
        assert!(reopened.completed_at.is_none());

        assert!(matches!(repo.complete(uuid::Uuid::new_v4()).await, Err(DbError::NotFound)));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_status_filters(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Reminders::new(&mut conn);

        let now = Utc::now();
        let overdue = repo.create(&reminder("Overdue", now - Duration::days(3))).await.unwrap();
        repo.create(&reminder("Next week", now + Duration::days(7))).await.unwrap();
        let done = repo.create(&reminder("Done", now - Duration::days(1))).await.unwrap();
        repo.complete(done.id).await.unwrap();

        let count = |status| ReminderFilter {
            status: Some(status),
            ..ReminderFilter::new(0, 10)
        };
        assert_eq!(repo.count(&count(ReminderStatus::Open)).await.unwrap(), 2);
        assert_eq!(repo.count(&count(ReminderStatus::Completed)).await.unwrap(), 1);

        let overdue_list = repo.list(&count(ReminderStatus::Overdue)).await.unwrap();
        assert_eq!(overdue_list.len(), 1);
        assert_eq!(overdue_list[0].id, overdue.id);
        assert!(overdue_list[0].is_overdue(now));

        // Ordered by due date
        let all = repo.list(&ReminderFilter::new(0, 10)).await.unwrap();
        assert_eq!(all[0].id, overdue.id);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_due_today_filter(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Reminders::new(&mut conn);

        let as_of = "2025-05-20T09:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let later_today = repo.create(&reminder("Call back", as_of + Duration::hours(8))).await.unwrap();
        let this_morning = repo.create(&reminder("Standup notes", as_of - Duration::hours(2))).await.unwrap();
        repo.create(&reminder("Tomorrow", as_of + Duration::days(1))).await.unwrap();
        let done = repo.create(&reminder("Already done", as_of + Duration::hours(1))).await.unwrap();
        repo.complete(done.id).await.unwrap();

        let due_today = ReminderFilter {
            status: Some(ReminderStatus::DueToday),
            ..ReminderFilter::new(0, 10).with_as_of(as_of)
        };
        let listed = repo.list(&due_today).await.unwrap();
        assert_eq!(
            listed.iter().map(|r| r.id).collect::<Vec<_>>(),
            vec![this_morning.id, later_today.id]
        );
        assert_eq!(repo.count(&due_today).await.unwrap(), 2);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_and_count_share_reference_time(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Reminders::new(&mut conn);

        let as_of = "2025-05-20T23:59:59Z".parse::<DateTime<Utc>>().unwrap();
        repo.create(&reminder("Last minute", as_of + Duration::milliseconds(500))).await.unwrap();

        let overdue = ReminderFilter {
            status: Some(ReminderStatus::Overdue),
            ..ReminderFilter::new(0, 10).with_as_of(as_of)
        };
        assert!(repo.list(&overdue).await.unwrap().is_empty());
        assert_eq!(repo.count(&overdue).await.unwrap(), 0);

        let overdue_later = overdue.clone().with_as_of(as_of + Duration::seconds(1));
        assert_eq!(repo.list(&overdue_later).await.unwrap().len(), 1);
        assert_eq!(repo.count(&overdue_later).await.unwrap(), 1);
    }
}
