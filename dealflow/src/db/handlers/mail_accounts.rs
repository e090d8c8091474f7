//! Database repository for mail accounts.

use sqlx::PgConnection;
use tracing::instrument;

use crate::db::errors::Result;
use crate::db::models::mail_accounts::{MailAccountCreateDBRequest, MailAccountDBResponse};
use crate::types::{MailAccountId, abbrev_uuid};

pub struct MailAccounts<'c> {
    db: &'c mut PgConnection,
}

impl<'c> MailAccounts<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(email = %request.email), err)]
    pub async fn create(&mut self, request: &MailAccountCreateDBRequest) -> Result<MailAccountDBResponse> {
        let account = sqlx::query_as::<_, MailAccountDBResponse>(
            r#"
            INSERT INTO mail_accounts (email, display_name, user_id)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(&request.email)
        .bind(&request.display_name)
        .bind(request.user_id)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(account)
    }

    #[instrument(skip(self), fields(mail_account_id = %abbrev_uuid(&id)), err)]
    pub async fn get_by_id(&mut self, id: MailAccountId) -> Result<Option<MailAccountDBResponse>> {
        let account = sqlx::query_as::<_, MailAccountDBResponse>("SELECT * FROM mail_accounts WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(account)
    }

    #[instrument(skip(self), err)]
    pub async fn list(&mut self, skip: i64, limit: i64) -> Result<Vec<MailAccountDBResponse>> {
        let accounts = sqlx::query_as::<_, MailAccountDBResponse>(
            "SELECT * FROM mail_accounts ORDER BY LOWER(email) LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(skip)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(accounts)
    }

    #[instrument(skip(self), err)]
    pub async fn count(&mut self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM mail_accounts")
            .fetch_one(&mut *self.db)
            .await?;

        Ok(count)
    }

    /// Drafts and processed emails sent through the account keep existing with no account.
    #[instrument(skip(self), fields(mail_account_id = %abbrev_uuid(&id)), err)]
    pub async fn delete(&mut self, id: MailAccountId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM mail_accounts WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
