//! HTTP handlers for reminders (follow-up tasks with a due time).

use super::or_not_found;
use crate::{
    AppState,
    api::models::{
        pagination::PaginatedResponse,
        reminders::{ListRemindersQuery, ReminderCreate, ReminderResponse, ReminderUpdate},
        users::CurrentUser,
    },
    db::{
        handlers::{Reminders, Repository, reminders::ReminderFilter},
        models::reminders::{ReminderCreateDBRequest, ReminderUpdateDBRequest},
    },
    errors::{Error, Result},
    types::ReminderId,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;

#[utoipa::path(
    get,
    path = "/reminders",
    tag = "reminders",
    summary = "List reminders",
    description = "Ordered by due time. `status` is one of `open`, `completed`, `overdue` or `due_today` (UTC day).",
    params(ListRemindersQuery),
    responses(
        (status = 200, description = "Page of reminders", body = PaginatedResponse<ReminderResponse>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("X-Dealflow-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_reminders(
    State(state): State<AppState>,
    Query(query): Query<ListRemindersQuery>,
    _user: CurrentUser,
) -> Result<Json<PaginatedResponse<ReminderResponse>>> {
    let (skip, limit) = query.pagination.params();
    let filter = ReminderFilter {
        status: query.status,
        owner_id: query.owner_id,
        deal_id: query.deal_id,
        contact_id: query.contact_id,
        ..ReminderFilter::new(skip, limit)
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Reminders::new(&mut conn);
    let reminders = repo.list(&filter).await?;
    let total_count = repo.count(&filter).await?;

    let now = Utc::now();
    Ok(Json(PaginatedResponse::new(
        reminders.into_iter().map(|r| ReminderResponse::new(r, now)).collect(),
        total_count,
        skip,
        limit,
    )))
}

#[utoipa::path(
    post,
    path = "/reminders",
    tag = "reminders",
    summary = "Create reminder",
    request_body = ReminderCreate,
    responses(
        (status = 201, description = "Reminder created", body = ReminderResponse),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("X-Dealflow-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_reminder(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(create): Json<ReminderCreate>,
) -> Result<(StatusCode, Json<ReminderResponse>)> {
    if create.title.trim().is_empty() {
        return Err(Error::bad_request("title must not be empty"));
    }

    let request = ReminderCreateDBRequest {
        title: create.title,
        notes: create.notes,
        due_at: create.due_at,
        deal_id: create.deal_id,
        contact_id: create.contact_id,
        owner_id: Some(create.owner_id.unwrap_or(current_user.id)),
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let reminder = Reminders::new(&mut conn).create(&request).await?;

    Ok((StatusCode::CREATED, Json(ReminderResponse::new(reminder, Utc::now()))))
}

#[utoipa::path(
    get,
    path = "/reminders/{id}",
    tag = "reminders",
    summary = "Get reminder",
    params(("id" = uuid::Uuid, Path, description = "Reminder ID")),
    responses(
        (status = 200, description = "Reminder", body = ReminderResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Reminder not found"),
    ),
    security(("X-Dealflow-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_reminder(
    State(state): State<AppState>,
    Path(id): Path<ReminderId>,
    _user: CurrentUser,
) -> Result<Json<ReminderResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let reminder = Reminders::new(&mut conn)
        .get_by_id(id)
        .await?
        .ok_or_else(|| Error::not_found("Reminder", id))?;

    Ok(Json(ReminderResponse::new(reminder, Utc::now())))
}

#[utoipa::path(
    patch,
    path = "/reminders/{id}",
    tag = "reminders",
    summary = "Update reminder",
    request_body = ReminderUpdate,
    params(("id" = uuid::Uuid, Path, description = "Reminder ID")),
    responses(
        (status = 200, description = "Updated reminder", body = ReminderResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Reminder not found"),
    ),
    security(("X-Dealflow-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_reminder(
    State(state): State<AppState>,
    Path(id): Path<ReminderId>,
    _user: CurrentUser,
    Json(update): Json<ReminderUpdate>,
) -> Result<Json<ReminderResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let reminder = Reminders::new(&mut conn)
        .update(id, &ReminderUpdateDBRequest::from(update))
        .await
        .map_err(or_not_found("Reminder", id))?;

    Ok(Json(ReminderResponse::new(reminder, Utc::now())))
}

#[utoipa::path(
    delete,
    path = "/reminders/{id}",
    tag = "reminders",
    summary = "Delete reminder",
    params(("id" = uuid::Uuid, Path, description = "Reminder ID")),
    responses(
        (status = 204, description = "Reminder deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Reminder not found"),
    ),
    security(("X-Dealflow-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_reminder(
    State(state): State<AppState>,
    Path(id): Path<ReminderId>,
    _user: CurrentUser,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if Reminders::new(&mut conn).delete(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(Error::not_found("Reminder", id))
    }
}

#[utoipa::path(
    post,
    path = "/reminders/{id}/complete",
    tag = "reminders",
    summary = "Complete reminder",
    description = "Completing an already completed reminder keeps the original completion time.",
    params(("id" = uuid::Uuid, Path, description = "Reminder ID")),
    responses(
        (status = 200, description = "Completed reminder", body = ReminderResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Reminder not found"),
    ),
    security(("X-Dealflow-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn complete_reminder(
    State(state): State<AppState>,
    Path(id): Path<ReminderId>,
    _user: CurrentUser,
) -> Result<Json<ReminderResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let reminder = Reminders::new(&mut conn)
        .complete(id)
        .await
        .map_err(or_not_found("Reminder", id))?;

    Ok(Json(ReminderResponse::new(reminder, Utc::now())))
}

#[utoipa::path(
    post,
    path = "/reminders/{id}/reopen",
    tag = "reminders",
    summary = "Reopen reminder",
    params(("id" = uuid::Uuid, Path, description = "Reminder ID")),
    responses(
        (status = 200, description = "Reopened reminder", body = ReminderResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Reminder not found"),
    ),
    security(("X-Dealflow-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn reopen_reminder(
    State(state): State<AppState>,
    Path(id): Path<ReminderId>,
    _user: CurrentUser,
) -> Result<Json<ReminderResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let reminder = Reminders::new(&mut conn)
        .reopen(id)
        .await
        .map_err(or_not_found("Reminder", id))?;

    Ok(Json(ReminderResponse::new(reminder, Utc::now())))
}

#[cfg(test)]
mod tests {
    use crate::api::models::{pagination::PaginatedResponse, reminders::ReminderResponse, users::Role};
    use crate::test_utils::{add_auth_headers, create_test_app, create_test_user};
    use axum::http::StatusCode;
    use chrono::{Duration, Utc};
    use serde_json::json;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_overdue_and_completion(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let user = create_test_user(&pool, Role::Rep).await;
        let headers = add_auth_headers(&user);

        let response = app
            .post("/api/v1/reminders")
            .add_header(&headers[0].0, &headers[0].1)
            .json(&json!({ "title": "Chase invoice", "due_at": Utc::now() - Duration::days(2) }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let late: ReminderResponse = response.json();
        assert!(late.overdue);
        assert_eq!(late.owner_id, Some(user.id));

        app.post("/api/v1/reminders")
            .add_header(&headers[0].0, &headers[0].1)
            .json(&json!({ "title": "Quarterly review", "due_at": Utc::now() + Duration::days(30) }))
            .await
            .assert_status(StatusCode::CREATED);

        let page: PaginatedResponse<ReminderResponse> = app
            .get("/api/v1/reminders?status=overdue")
            .add_header(&headers[0].0, &headers[0].1)
            .await
            .json();
        assert_eq!(page.total_count, 1);
        assert_eq!(page.data[0].id, late.id);

        let first: ReminderResponse = app
            .post(&format!("/api/v1/reminders/{}/complete", late.id))
            .add_header(&headers[0].0, &headers[0].1)
            .await
            .json();
        assert!(!first.overdue);
        let second: ReminderResponse = app
            .post(&format!("/api/v1/reminders/{}/complete", late.id))
            .add_header(&headers[0].0, &headers[0].1)
            .await
            .json();
        assert_eq!(first.completed_at, second.completed_at);

        let page: PaginatedResponse<ReminderResponse> = app
            .get("/api/v1/reminders?status=completed")
            .add_header(&headers[0].0, &headers[0].1)
            .await
            .json();
        assert_eq!(page.total_count, 1);

        let reopened: ReminderResponse = app
            .post(&format!("/api/v1/reminders/{}/reopen", late.id))
            .add_header(&headers[0].0, &headers[0].1)
            .await
            .json();
        assert!(reopened.completed_at.is_none());
        assert!(reopened.overdue);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_and_delete_reminder(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let user = create_test_user(&pool, Role::Rep).await;
        let headers = add_auth_headers(&user);

        let created: ReminderResponse = app
            .post("/api/v1/reminders")
            .add_header(&headers[0].0, &headers[0].1)
            .json(&json!({ "title": "Send deck", "due_at": Utc::now() + Duration::hours(3) }))
            .await
            .json();

        let updated: ReminderResponse = app
            .patch(&format!("/api/v1/reminders/{}", created.id))
            .add_header(&headers[0].0, &headers[0].1)
            .json(&json!({ "notes": "v2 of the deck" }))
            .await
            .json();
        assert_eq!(updated.title, "Send deck");
        assert_eq!(updated.notes.as_deref(), Some("v2 of the deck"));

        app.delete(&format!("/api/v1/reminders/{}", created.id))
            .add_header(&headers[0].0, &headers[0].1)
            .await
            .assert_status(StatusCode::NO_CONTENT);
        app.post(&format!("/api/v1/reminders/{}/complete", created.id))
            .add_header(&headers[0].0, &headers[0].1)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
