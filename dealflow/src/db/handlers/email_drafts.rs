//! Database repository for email drafts and their delivery state.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::email_drafts::{DraftStatus, EmailDraftCreateDBRequest, EmailDraftDBResponse, EmailDraftUpdateDBRequest},
};
use crate::types::{ContactId, DealId, EmailDraftId, abbrev_uuid};
use sqlx::{PgConnection, Postgres, QueryBuilder};
use tracing::instrument;

#[derive(Debug, Clone, Default)]
pub struct EmailDraftFilter {
    pub skip: i64,
    pub limit: i64,
    pub status: Option<DraftStatus>,
    pub deal_id: Option<DealId>,
    pub contact_id: Option<ContactId>,
}

impl EmailDraftFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            ..Default::default()
        }
    }
}

fn push_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &EmailDraftFilter) {
    if let Some(status) = filter.status {
        query.push(" AND status = ");
        query.push_bind(status);
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

pub struct EmailDrafts<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for EmailDrafts<'c> {
    type CreateRequest = EmailDraftCreateDBRequest;
    type UpdateRequest = EmailDraftUpdateDBRequest;
    type Response = EmailDraftDBResponse;
    type Id = EmailDraftId;
    type Filter = EmailDraftFilter;

    #[instrument(skip(self, request), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let draft = sqlx::query_as::<_, EmailDraftDBResponse>(
            r#"
            INSERT INTO email_drafts (subject, body, to_email, deal_id, contact_id, mail_account_id, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(&request.subject)
        .bind(&request.body)
        .bind(&request.to_email)
        .bind(request.deal_id)
        .bind(request.contact_id)
        .bind(request.mail_account_id)
        .bind(request.created_by)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(draft)
    }

    #[instrument(skip(self), fields(draft_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let draft = sqlx::query_as::<_, EmailDraftDBResponse>("SELECT * FROM email_drafts WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(draft)
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::new("SELECT * FROM email_drafts WHERE 1=1");
        push_filters(&mut query, filter);

        query.push(" ORDER BY created_at DESC, id LIMIT ");
        query.push_bind(filter.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.skip);

        let drafts = query.build_query_as::<EmailDraftDBResponse>().fetch_all(&mut *self.db).await?;
        Ok(drafts)
    }

    #[instrument(skip(self, filter), err)]
    async fn count(&mut self, filter: &Self::Filter) -> Result<i64> {
        let mut query = QueryBuilder::new("SELECT COUNT(*) FROM email_drafts WHERE 1=1");
        push_filters(&mut query, filter);

        let count: i64 = query.build_query_scalar().fetch_one(&mut *self.db).await?;
        Ok(count)
    }

    #[instrument(skip(self), fields(draft_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM email_drafts WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Content edits. Status is only changed by [`EmailDrafts::mark_sent`] and [`EmailDrafts::mark_failed`].
    #[instrument(skip(self, request), fields(draft_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let draft = sqlx::query_as::<_, EmailDraftDBResponse>(
            r#"
            UPDATE email_drafts SET
                subject = COALESCE($2, subject),
                body = COALESCE($3, body),
                to_email = COALESCE($4, to_email),
                mail_account_id = COALESCE($5, mail_account_id),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&request.subject)
        .bind(&request.body)
        .bind(&request.to_email)
        .bind(request.mail_account_id)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(draft)
    }
}

impl<'c> EmailDrafts<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Load a draft and hold its row lock until the surrounding transaction ends
    #[instrument(skip(self), fields(draft_id = %abbrev_uuid(&id)), err)]
    pub async fn get_for_update(&mut self, id: EmailDraftId) -> Result<Option<EmailDraftDBResponse>> {
        let draft = sqlx::query_as::<_, EmailDraftDBResponse>("SELECT * FROM email_drafts WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(draft)
    }

    #[instrument(skip(self), fields(draft_id = %abbrev_uuid(&id)), err)]
    pub async fn mark_sent(&mut self, id: EmailDraftId) -> Result<EmailDraftDBResponse> {
        let draft = sqlx::query_as::<_, EmailDraftDBResponse>(
            r#"
            UPDATE email_drafts SET
                status = 'sent',
                sent_at = NOW(),
                error = NULL,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(draft)
    }

    #[instrument(skip(self, error), fields(draft_id = %abbrev_uuid(&id)), err)]
    pub async fn mark_failed(&mut self, id: EmailDraftId, error: &str) -> Result<EmailDraftDBResponse> {
        let draft = sqlx::query_as::<_, EmailDraftDBResponse>(
            r#"
            UPDATE email_drafts SET
                status = 'failed',
                error = $2,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(error)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(draft)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::PgPool;

    fn draft(subject: &str) -> EmailDraftCreateDBRequest {
        EmailDraftCreateDBRequest {
            subject: subject.to_string(),
            body: "Hello".to_string(),
            to_email: "buyer@example.com".to_string(),
            deal_id: None,
            contact_id: None,
            mail_account_id: None,
            created_by: None,
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_draft_delivery_states(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = EmailDrafts::new(&mut conn);

        let created = repo.create(&draft("Quote")).await.unwrap();
        assert_eq!(created.status, DraftStatus::Draft);

        let failed = repo.mark_failed(created.id, "connection refused").await.unwrap();
        assert_eq!(failed.status, DraftStatus::Failed);
        assert_eq!(failed.error.as_deref(), Some("connection refused"));
        assert!(failed.sent_at.is_none());

        let sent = repo.mark_sent(created.id).await.unwrap();
        assert_eq!(sent.status, DraftStatus::Sent);
        assert!(sent.sent_at.is_some());
        assert!(sent.error.is_none());

        let filter = EmailDraftFilter {
            status: Some(DraftStatus::Sent),
            ..EmailDraftFilter::new(0, 10)
        };
        assert_eq!(repo.count(&filter).await.unwrap(), 1);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_draft_content(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = EmailDrafts::new(&mut conn);

        let created = repo.create(&draft("Intro")).await.unwrap();
        let updated = repo
            .update(
                created.id,
                &EmailDraftUpdateDBRequest {
                    body: Some("Updated body".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.subject, "Intro");
        assert_eq!(updated.body, "Updated body");
    }
}
