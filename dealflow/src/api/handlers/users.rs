//! HTTP handlers for users.

use super::or_not_found;
use crate::{
    AppState,
    api::models::{
        pagination::PaginatedResponse,
        users::{CurrentUser, ListUsersQuery, UserResponse, UserUpdate},
    },
    auth::permissions::RequiresAdmin,
    db::{
        handlers::{Repository, Users, users::UserFilter},
        models::users::UserUpdateDBRequest,
    },
    errors::{Error, Result},
    types::UserId,
};
use axum::{
    Json,
    extract::{Path, Query, State},
};

#[utoipa::path(
    get,
    path = "/users/current",
    tag = "users",
    summary = "Get current user",
    responses(
        (status = 200, description = "The authenticated user", body = UserResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("X-Dealflow-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_current_user(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<UserResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let user = Users::new(&mut conn)
        .get_by_id(current_user.id)
        .await?
        .ok_or_else(|| Error::not_found("User", current_user.id))?;

    Ok(Json(UserResponse::from(user)))
}

#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    summary = "List users",
    params(ListUsersQuery),
    responses(
        (status = 200, description = "Page of users", body = PaginatedResponse<UserResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin role required"),
    ),
    security(("X-Dealflow-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<ListUsersQuery>,
    _: RequiresAdmin,
) -> Result<Json<PaginatedResponse<UserResponse>>> {
    let (skip, limit) = query.pagination.params();
    let mut filter = UserFilter::new(skip, limit);
    if let Some(search) = query.search {
        filter = filter.with_search(search);
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Users::new(&mut conn);
    let users = repo.list(&filter).await?;
    let total_count = repo.count(&filter).await?;

    Ok(Json(PaginatedResponse::new(
        users.into_iter().map(UserResponse::from).collect(),
        total_count,
        skip,
        limit,
    )))
}

#[utoipa::path(
    patch,
    path = "/users/{id}",
    tag = "users",
    summary = "Update user",
    request_body = UserUpdate,
    params(("id" = uuid::Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Updated user", body = UserResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "User not found"),
    ),
    security(("X-Dealflow-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    _: RequiresAdmin,
    Json(update): Json<UserUpdate>,
) -> Result<Json<UserResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let user = Users::new(&mut conn)
        .update(id, &UserUpdateDBRequest::from(update))
        .await
        .map_err(or_not_found("User", id))?;

    Ok(Json(UserResponse::from(user)))
}

#[cfg(test)]
mod tests {
    use crate::api::models::{
        pagination::PaginatedResponse,
        users::{Role, UserResponse},
    };
    use crate::test_utils::{add_auth_headers, create_test_admin_user, create_test_app, create_test_user};
    use axum::http::StatusCode;
    use serde_json::json;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_get_current_user(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let user = create_test_user(&pool, Role::Rep).await;
        let headers = add_auth_headers(&user);

        let response = app.get("/api/v1/users/current").add_header(&headers[0].0, &headers[0].1).await;

        response.assert_status(StatusCode::OK);
        let body: UserResponse = response.json();
        assert_eq!(body.id, user.id);
        assert_eq!(body.role, Role::Rep);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_users_requires_admin(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let rep = create_test_user(&pool, Role::Rep).await;
        let admin = create_test_admin_user(&pool).await;

        let rep_headers = add_auth_headers(&rep);
        app.get("/api/v1/users")
            .add_header(&rep_headers[0].0, &rep_headers[0].1)
            .await
            .assert_status(StatusCode::FORBIDDEN);

        let admin_headers = add_auth_headers(&admin);
        let response = app
            .get("/api/v1/users?limit=1")
            .add_header(&admin_headers[0].0, &admin_headers[0].1)
            .await;
        response.assert_status(StatusCode::OK);
        let page: PaginatedResponse<UserResponse> = response.json();
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.limit, 1);
        // rep, admin and the configured initial admin
        assert_eq!(page.total_count, 3);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_admin_can_promote_user(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let rep = create_test_user(&pool, Role::Rep).await;
        let admin = create_test_admin_user(&pool).await;
        let headers = add_auth_headers(&admin);

        let response = app
            .patch(&format!("/api/v1/users/{}", rep.id))
            .add_header(&headers[0].0, &headers[0].1)
            .json(&json!({ "role": "admin", "display_name": "Team Lead" }))
            .await;

        response.assert_status(StatusCode::OK);
        let body: UserResponse = response.json();
        assert_eq!(body.role, Role::Admin);
        assert_eq!(body.display_name.as_deref(), Some("Team Lead"));

        app.patch(&format!("/api/v1/users/{}", uuid::Uuid::new_v4()))
            .add_header(&headers[0].0, &headers[0].1)
            .json(&json!({ "role": "rep" }))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
