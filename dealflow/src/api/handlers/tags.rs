//! HTTP handlers for tags.

use super::or_not_found;
use crate::{
    AppState,
    api::models::{
        pagination::PaginatedResponse,
        tags::{ListTagsQuery, TagCreate, TagResponse, TagUpdate},
        users::CurrentUser,
    },
    db::{
        handlers::{Repository, Tags, tags::TagFilter},
        models::tags::{TagCreateDBRequest, TagUpdateDBRequest},
    },
    errors::{Error, Result},
    types::TagId,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

#[utoipa::path(
    get,
    path = "/tags",
    tag = "tags",
    summary = "List tags",
    params(ListTagsQuery),
    responses(
        (status = 200, description = "Page of tags, by name", body = PaginatedResponse<TagResponse>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("X-Dealflow-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_tags(
    State(state): State<AppState>,
    Query(query): Query<ListTagsQuery>,
    _user: CurrentUser,
) -> Result<Json<PaginatedResponse<TagResponse>>> {
    let (skip, limit) = query.pagination.params();
    let filter = TagFilter {
        search: query.search,
        ..TagFilter::new(skip, limit)
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Tags::new(&mut conn);
    let tags = repo.list(&filter).await?;
    let total_count = repo.count(&filter).await?;

    Ok(Json(PaginatedResponse::new(
        tags.into_iter().map(TagResponse::from).collect(),
        total_count,
        skip,
        limit,
    )))
}

#[utoipa::path(
    post,
    path = "/tags",
    tag = "tags",
    summary = "Create tag",
    request_body = TagCreate,
    responses(
        (status = 201, description = "Tag created", body = TagResponse),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "A tag with this name already exists"),
    ),
    security(("X-Dealflow-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_tag(
    State(state): State<AppState>,
    _user: CurrentUser,
    Json(create): Json<TagCreate>,
) -> Result<(StatusCode, Json<TagResponse>)> {
    if create.name.trim().is_empty() {
        return Err(Error::bad_request("name must not be empty"));
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let tag = Tags::new(&mut conn).create(&TagCreateDBRequest::from(create)).await?;

    Ok((StatusCode::CREATED, Json(TagResponse::from(tag))))
}

#[utoipa::path(
    patch,
    path = "/tags/{id}",
    tag = "tags",
    summary = "Update tag",
    request_body = TagUpdate,
    params(("id" = uuid::Uuid, Path, description = "Tag ID")),
    responses(
        (status = 200, description = "Updated tag", body = TagResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Tag not found"),
        (status = 409, description = "A tag with this name already exists"),
    ),
    security(("X-Dealflow-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_tag(
    State(state): State<AppState>,
    Path(id): Path<TagId>,
    _user: CurrentUser,
    Json(update): Json<TagUpdate>,
) -> Result<Json<TagResponse>> {
    if update.name.as_deref().is_some_and(|name| name.trim().is_empty()) {
        return Err(Error::bad_request("name must not be empty"));
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let tag = Tags::new(&mut conn)
        .update(id, &TagUpdateDBRequest::from(update))
        .await
        .map_err(or_not_found("Tag", id))?;

    Ok(Json(TagResponse::from(tag)))
}

#[utoipa::path(
    delete,
    path = "/tags/{id}",
    tag = "tags",
    summary = "Delete tag",
    description = "Detaches the tag from every contact and deal.",
    params(("id" = uuid::Uuid, Path, description = "Tag ID")),
    responses(
        (status = 204, description = "Tag deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Tag not found"),
    ),
    security(("X-Dealflow-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_tag(State(state): State<AppState>, Path(id): Path<TagId>, _user: CurrentUser) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if Tags::new(&mut conn).delete(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(Error::not_found("Tag", id))
    }
}

#[cfg(test)]
mod tests {
    use crate::api::models::{pagination::PaginatedResponse, tags::TagResponse, users::Role};
    use crate::test_utils::{add_auth_headers, create_test_app, create_test_user};
    use axum::http::StatusCode;
    use serde_json::{Value, json};
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_duplicate_tag_name_conflicts(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let user = create_test_user(&pool, Role::Rep).await;
        let headers = add_auth_headers(&user);

        app.post("/api/v1/tags")
            .add_header(&headers[0].0, &headers[0].1)
            .json(&json!({ "name": "Enterprise", "color": "#7c3aed" }))
            .await
            .assert_status(StatusCode::CREATED);

        let response = app
            .post("/api/v1/tags")
            .add_header(&headers[0].0, &headers[0].1)
            .json(&json!({ "name": "enterprise" }))
            .await;
        response.assert_status(StatusCode::CONFLICT);
        let body: Value = response.json();
        assert_eq!(body["resource"], "tag");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_search_rename_and_delete(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let user = create_test_user(&pool, Role::Rep).await;
        let headers = add_auth_headers(&user);

        for name in ["hot", "cold", "partner"] {
            app.post("/api/v1/tags")
                .add_header(&headers[0].0, &headers[0].1)
                .json(&json!({ "name": name }))
                .await
                .assert_status(StatusCode::CREATED);
        }

        let page: PaginatedResponse<TagResponse> = app
            .get("/api/v1/tags?search=OL")
            .add_header(&headers[0].0, &headers[0].1)
            .await
            .json();
        assert_eq!(page.total_count, 1);
        let cold = page.data[0].clone();

        let renamed: TagResponse = app
            .patch(&format!("/api/v1/tags/{}", cold.id))
            .add_header(&headers[0].0, &headers[0].1)
            .json(&json!({ "name": "lukewarm" }))
            .await
            .json();
        assert_eq!(renamed.name, "lukewarm");

        app.delete(&format!("/api/v1/tags/{}", cold.id))
            .add_header(&headers[0].0, &headers[0].1)
            .await
            .assert_status(StatusCode::NO_CONTENT);
        app.delete(&format!("/api/v1/tags/{}", cold.id))
            .add_header(&headers[0].0, &headers[0].1)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
