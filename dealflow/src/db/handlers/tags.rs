//! Database repository for tags.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::tags::{TagCreateDBRequest, TagDBResponse, TagUpdateDBRequest},
};
use crate::types::{ContactId, DealId, TagId, abbrev_uuid};
use sqlx::{FromRow, PgConnection, Postgres, QueryBuilder};
use std::collections::HashMap;
use tracing::instrument;
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct TagFilter {
    pub skip: i64,
    pub limit: i64,
    pub search: Option<String>,
}

impl TagFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self { skip, limit, search: None }
    }
}

fn push_filters(query: &mut QueryBuilder<'_, Postgres>, filter: &TagFilter) {
    if let Some(ref search) = filter.search {
        query.push(" AND LOWER(name) LIKE ");
        query.push_bind(format!("%{}%", search.to_lowercase()));
    }
}

// A tag joined to the record it is attached to
#[derive(FromRow)]
struct AttachedTag {
    owner_id: Uuid,
    #[sqlx(flatten)]
    tag: TagDBResponse,
}

fn group_by_owner(rows: Vec<AttachedTag>) -> HashMap<Uuid, Vec<TagDBResponse>> {
    let mut grouped: HashMap<Uuid, Vec<TagDBResponse>> = HashMap::new();
    for row in rows {
        grouped.entry(row.owner_id).or_default().push(row.tag);
    }
    grouped
}

pub struct Tags<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Tags<'c> {
    type CreateRequest = TagCreateDBRequest;
    type UpdateRequest = TagUpdateDBRequest;
    type Response = TagDBResponse;
    type Id = TagId;
    type Filter = TagFilter;

    #[instrument(skip(self, request), fields(name = %request.name), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let tag = sqlx::query_as::<_, TagDBResponse>("INSERT INTO tags (name, color) VALUES ($1, $2) RETURNING *")
            .bind(&request.name)
            .bind(&request.color)
            .fetch_one(&mut *self.db)
            .await?;

        Ok(tag)
    }

    #[instrument(skip(self), fields(tag_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let tag = sqlx::query_as::<_, TagDBResponse>("SELECT * FROM tags WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(tag)
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut query = QueryBuilder::new("SELECT * FROM tags WHERE 1=1");
        push_filters(&mut query, filter);

        query.push(" ORDER BY LOWER(name) LIMIT ");
        query.push_bind(filter.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.skip);

        let tags = query.build_query_as::<TagDBResponse>().fetch_all(&mut *self.db).await?;
        Ok(tags)
    }

    #[instrument(skip(self, filter), err)]
    async fn count(&mut self, filter: &Self::Filter) -> Result<i64> {
        let mut query = QueryBuilder::new("SELECT COUNT(*) FROM tags WHERE 1=1");
        push_filters(&mut query, filter);

        let count: i64 = query.build_query_scalar().fetch_one(&mut *self.db).await?;
        Ok(count)
    }

    #[instrument(skip(self), fields(tag_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM tags WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(tag_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let tag = sqlx::query_as::<_, TagDBResponse>(
            r#"
            UPDATE tags SET
                name = COALESCE($2, name),
                color = COALESCE($3, color),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&request.name)
        .bind(&request.color)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(tag)
    }
}

impl<'c> Tags<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Tags on each of the given contacts
    #[instrument(skip(self, contact_ids), fields(count = contact_ids.len()), err)]
    pub async fn list_for_contacts(&mut self, contact_ids: &[ContactId]) -> Result<HashMap<ContactId, Vec<TagDBResponse>>> {
        if contact_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, AttachedTag>(
            r#"
            SELECT ct.contact_id AS owner_id, t.*
            FROM contact_tags ct
            JOIN tags t ON t.id = ct.tag_id
            WHERE ct.contact_id = ANY($1)
            ORDER BY LOWER(t.name)
            "#,
        )
        .bind(contact_ids)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(group_by_owner(rows))
    }

    /// Tags on each of the given deals
    #[instrument(skip(self, deal_ids), fields(count = deal_ids.len()), err)]
    pub async fn list_for_deals(&mut self, deal_ids: &[DealId]) -> Result<HashMap<DealId, Vec<TagDBResponse>>> {
        if deal_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, AttachedTag>(
            r#"
            SELECT dt.deal_id AS owner_id, t.*
            FROM deal_tags dt
            JOIN tags t ON t.id = dt.tag_id
            WHERE dt.deal_id = ANY($1)
            ORDER BY LOWER(t.name)
            "#,
        )
        .bind(deal_ids)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(group_by_owner(rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::handlers::Contacts;
    use crate::db::models::contacts::ContactCreateDBRequest;
    use sqlx::PgPool;

    fn tag(name: &str) -> TagCreateDBRequest {
        TagCreateDBRequest {
            name: name.to_string(),
            color: Some("#ff8800".to_string()),
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_tag_names_unique_case_insensitive(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Tags::new(&mut conn);

        repo.create(&tag("Enterprise")).await.unwrap();
        let err = repo.create(&tag("enterprise")).await.unwrap_err();
        match err {
            DbError::UniqueViolation { table, .. } => assert_eq!(table.as_deref(), Some("tags")),
            other => panic!("expected unique violation, got {other:?}"),
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_search_and_delete(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Tags::new(&mut conn);

        let hot = repo.create(&tag("hot lead")).await.unwrap();
        repo.create(&tag("cold")).await.unwrap();

        let renamed = repo
            .update(
                hot.id,
                &TagUpdateDBRequest {
                    name: Some("hot".to_string()),
                    color: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed.name, "hot");
        assert_eq!(renamed.color.as_deref(), Some("#ff8800"));

        let filter = TagFilter {
            search: Some("HO".to_string()),
            ..TagFilter::new(0, 10)
        };
        assert_eq!(repo.count(&filter).await.unwrap(), 1);

        assert!(repo.delete(hot.id).await.unwrap());
        assert_eq!(repo.count(&TagFilter::new(0, 10)).await.unwrap(), 1);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_for_contacts(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();

        let (a, b) = {
            let mut repo = Tags::new(&mut conn);
            (repo.create(&tag("beta")).await.unwrap(), repo.create(&tag("alpha")).await.unwrap())
        };

        let contact = {
            let mut contacts = Contacts::new(&mut conn);
            let contact = contacts
                .create(&ContactCreateDBRequest {
                    first_name: "Tim".to_string(),
                    last_name: None,
                    email: None,
                    phone: None,
                    company: None,
                    title: None,
                    notes: None,
                    owner_id: None,
                })
                .await
                .unwrap();
            contacts.add_tag(contact.id, a.id).await.unwrap();
            contacts.add_tag(contact.id, b.id).await.unwrap();
            contact
        };

        let tags = Tags::new(&mut conn).list_for_contacts(&[contact.id]).await.unwrap();
        let names: Vec<&str> = tags[&contact.id].iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "beta"]);
    }
}
