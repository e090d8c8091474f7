//! Database repository for contacts and their tags.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::contacts::{ContactCreateDBRequest, ContactDBResponse, ContactUpdateDBRequest},
};
use crate::types::{ContactId, TagId, UserId, abbrev_uuid};
use sqlx::{PgConnection, Postgres, QueryBuilder};
use tracing::instrument;

/// Filter for listing contacts
#[derive(Debug, Clone, Default)]
pub struct ContactFilter {
    pub skip: i64,
    pub limit: i64,
    /// Case-insensitive substring match on name, email and company
    pub search: Option<String>,
    pub tag_id: Option<TagId>,
    pub owner_id: Option<UserId>,
}

impl ContactFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            ..Default::default()
        }
    }
}

fn push_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &ContactFilter) {
    if let Some(ref search) = filter.search {
        let pattern = format!("%{}%", search.to_lowercase());
        query.push(" AND (LOWER(first_name) LIKE ");
        query.push_bind(pattern.clone());
        query.push(" OR LOWER(COALESCE(last_name, '')) LIKE ");
        query.push_bind(pattern.clone());
        query.push(" OR LOWER(COALESCE(email, '')) LIKE ");
        query.push_bind(pattern.clone());
        query.push(" OR LOWER(COALESCE(company, '')) LIKE ");
        query.push_bind(pattern);
        query.push(")");
    }

    if let Some(tag_id) = filter.tag_id {
        query.push(" AND id IN (SELECT contact_id FROM contact_tags WHERE tag_id = ");
        query.push_bind(tag_id);
        query.push(")");
    }

    if let Some(owner_id) = filter.owner_id {
        query.push(" AND owner_id = ");
        query.push_bind(owner_id);
    }
}

pub struct Contacts<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Contacts<'c> {
    type CreateRequest = ContactCreateDBRequest;
    type UpdateRequest = ContactUpdateDBRequest;
    type Response = ContactDBResponse;
    type Id = ContactId;
    type Filter = ContactFilter;

    #[instrument(skip(self, request), fields(first_name = %request.first_name), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let contact = sqlx::query_as::<_, ContactDBResponse>(
            r#"
            INSERT INTO contacts (first_name, last_name, email, phone, company, title, notes, owner_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(&request.first_name)
        .bind(&request.last_name)
        .bind(&request.email)
        .bind(&request.phone)
        .bind(&request.company)
        .bind(&request.title)
        .bind(&request.notes)
        .bind(request.owner_id)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(contact)
    }

    #[instrument(skip(self), fields(contact_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let contact = sqlx::query_as::<_, ContactDBResponse>("SELECT * FROM contacts WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(contact)
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::new("SELECT * FROM contacts WHERE 1=1");
        push_filters(&mut query, filter);

        query.push(" ORDER BY first_name, last_name NULLS FIRST, id LIMIT ");
        query.push_bind(filter.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.skip);

        let contacts = query.build_query_as::<ContactDBResponse>().fetch_all(&mut *self.db).await?;
        Ok(contacts)
    }

    #[instrument(skip(self, filter), err)]
    async fn count(&mut self, filter: &Self::Filter) -> Result<i64> {
        let mut query = QueryBuilder::new("SELECT COUNT(*) FROM contacts WHERE 1=1");
        push_filters(&mut query, filter);

        let count: i64 = query.build_query_scalar().fetch_one(&mut *self.db).await?;
        Ok(count)
    }

    #[instrument(skip(self), fields(contact_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        // Deals, drafts and organizations keep the row with a NULL contact; activities and reminders cascade
        let result = sqlx::query("DELETE FROM contacts WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(contact_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let contact = sqlx::query_as::<_, ContactDBResponse>(
            r#"
            UPDATE contacts SET
                first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                email = COALESCE($4, email),
                phone = COALESCE($5, phone),
                company = COALESCE($6, company),
                title = COALESCE($7, title),
                notes = COALESCE($8, notes),
                owner_id = COALESCE($9, owner_id),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&request.first_name)
        .bind(&request.last_name)
        .bind(&request.email)
        .bind(&request.phone)
        .bind(&request.company)
        .bind(&request.title)
        .bind(&request.notes)
        .bind(request.owner_id)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(contact)
    }
}

impl<'c> Contacts<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Match an email address to a contact, ignoring case
    #[instrument(skip(self), err)]
    pub async fn get_by_email(&mut self, email: &str) -> Result<Option<ContactDBResponse>> {
        let contact = sqlx::query_as::<_, ContactDBResponse>("SELECT * FROM contacts WHERE LOWER(email) = LOWER($1)")
            .bind(email.trim())
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(contact)
    }

    /// Tag a contact. Tagging twice is a no-op; an unknown contact or tag is `NotFound`.
    #[instrument(skip(self), fields(contact_id = %abbrev_uuid(&contact_id), tag_id = %abbrev_uuid(&tag_id)), err)]
    pub async fn add_tag(&mut self, contact_id: ContactId, tag_id: TagId) -> Result<()> {
        match sqlx::query("INSERT INTO contact_tags (contact_id, tag_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(contact_id)
            .bind(tag_id)
            .execute(&mut *self.db)
            .await
        {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_foreign_key_violation() => Err(DbError::NotFound),
            Err(e) => Err(DbError::from(e)),
        }
    }

    /// Returns false when the contact did not carry the tag
    #[instrument(skip(self), fields(contact_id = %abbrev_uuid(&contact_id), tag_id = %abbrev_uuid(&tag_id)), err)]
    pub async fn remove_tag(&mut self, contact_id: ContactId, tag_id: TagId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM contact_tags WHERE contact_id = $1 AND tag_id = $2")
            .bind(contact_id)
            .bind(tag_id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
