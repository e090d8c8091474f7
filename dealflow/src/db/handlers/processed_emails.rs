//! Database repository for ingested inbound messages.

use sqlx::PgConnection;
use tracing::instrument;

use crate::db::errors::Result;
use crate::db::models::processed_emails::{ProcessedEmailCreateDBRequest, ProcessedEmailDBResponse};
use crate::types::ContactId;

pub struct ProcessedEmails<'c> {
    db: &'c mut PgConnection,
}

impl<'c> ProcessedEmails<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(message_id = %request.message_id), err)]
    pub async fn create(&mut self, request: &ProcessedEmailCreateDBRequest) -> Result<ProcessedEmailDBResponse> {
        let email = sqlx::query_as::<_, ProcessedEmailDBResponse>(
            r#"
            INSERT INTO processed_emails (
                message_id, from_email, subject, received_at, mail_account_id, contact_id, activity_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(&request.message_id)
        .bind(&request.from_email)
        .bind(&request.subject)
        .bind(request.received_at)
        .bind(request.mail_account_id)
        .bind(request.contact_id)
        .bind(request.activity_id)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(email)
    }

    #[instrument(skip(self), err)]
    pub async fn get_by_message_id(&mut self, message_id: &str) -> Result<Option<ProcessedEmailDBResponse>> {
        let email = sqlx::query_as::<_, ProcessedEmailDBResponse>("SELECT * FROM processed_emails WHERE message_id = $1")
            .bind(message_id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(email)
    }

    /// Most recently received first
    #[instrument(skip(self), err)]
    pub async fn list(&mut self, contact_id: Option<ContactId>, skip: i64, limit: i64) -> Result<Vec<ProcessedEmailDBResponse>> {
        let emails = sqlx::query_as::<_, ProcessedEmailDBResponse>(
            r#"
            SELECT * FROM processed_emails
            WHERE ($1::uuid IS NULL OR contact_id = $1)
            ORDER BY received_at DESC, id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(contact_id)
        .bind(limit)
        .bind(skip)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(emails)
    }

    #[instrument(skip(self), err)]
    pub async fn count(&mut self, contact_id: Option<ContactId>) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM processed_emails WHERE ($1::uuid IS NULL OR contact_id = $1)")
            .bind(contact_id)
            .fetch_one(&mut *self.db)
            .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::errors::DbError;
    use chrono::{Duration, Utc};
    use sqlx::PgPool;

    fn inbound(message_id: &str, hours_ago: i64) -> ProcessedEmailCreateDBRequest {
        ProcessedEmailCreateDBRequest {
            message_id: message_id.to_string(),
            from_email: "prospect@example.com".to_string(),
            subject: Some("Re: pricing".to_string()),
            received_at: Utc::now() - Duration::hours(hours_ago),
            mail_account_id: None,
            contact_id: None,
            activity_id: None,
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_message_id_is_unique(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = ProcessedEmails::new(&mut conn);

        repo.create(&inbound("<a@mail>", 1)).await.unwrap();
        let err = repo.create(&inbound("<a@mail>", 1)).await.unwrap_err();
        match err {
            DbError::UniqueViolation { conflicting_value, .. } => {
                assert_eq!(conflicting_value.as_deref(), Some("<a@mail>"))
            }
            other => panic!("expected unique violation, got {other:?}"),
        }

        assert!(repo.get_by_message_id("<a@mail>").await.unwrap().is_some());
        assert!(repo.get_by_message_id("<b@mail>").await.unwrap().is_none());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_newest_first(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = ProcessedEmails::new(&mut conn);

        repo.create(&inbound("<old@mail>", 5)).await.unwrap();
        repo.create(&inbound("<new@mail>", 1)).await.unwrap();

        let listed = repo.list(None, 0, 10).await.unwrap();
        assert_eq!(listed[0].message_id, "<new@mail>");
        assert_eq!(repo.count(None).await.unwrap(), 2);
    }
}
