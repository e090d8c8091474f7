//! HTTP handlers for the activity log.

use super::or_not_found;
use crate::{
    AppState,
    api::models::{
        activities::{ActivityCreate, ActivityResponse, ActivityUpdate, ListActivitiesQuery},
        pagination::PaginatedResponse,
        users::CurrentUser,
    },
    db::{
        handlers::{Activities, Repository, activities::ActivityFilter},
        models::activities::{ActivityCreateDBRequest, ActivityUpdateDBRequest},
    },
    errors::{Error, Result},
    types::ActivityId,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

#[utoipa::path(
    get,
    path = "/activities",
    tag = "activities",
    summary = "List activities",
    description = "Most recent first, by `occurred_at`.",
    params(ListActivitiesQuery),
    responses(
        (status = 200, description = "Page of activities", body = PaginatedResponse<ActivityResponse>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("X-Dealflow-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_activities(
    State(state): State<AppState>,
    Query(query): Query<ListActivitiesQuery>,
    _user: CurrentUser,
) -> Result<Json<PaginatedResponse<ActivityResponse>>> {
    let (skip, limit) = query.pagination.params();
    let filter = ActivityFilter {
        deal_id: query.deal_id,
        contact_id: query.contact_id,
        kind: query.kind,
        ..ActivityFilter::new(skip, limit)
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Activities::new(&mut conn);
    let activities = repo.list(&filter).await?;
    let total_count = repo.count(&filter).await?;

    Ok(Json(PaginatedResponse::new(
        activities.into_iter().map(ActivityResponse::from).collect(),
        total_count,
        skip,
        limit,
    )))
}

#[utoipa::path(
    post,
    path = "/activities",
    tag = "activities",
    summary = "Log activity",
    request_body = ActivityCreate,
    responses(
        (status = 201, description = "Activity logged", body = ActivityResponse),
        (status = 400, description = "Missing deal and contact, or unknown reference"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("X-Dealflow-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_activity(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(create): Json<ActivityCreate>,
) -> Result<(StatusCode, Json<ActivityResponse>)> {
    if create.deal_id.is_none() && create.contact_id.is_none() {
        return Err(Error::bad_request("An activity must reference a deal or a contact"));
    }
    if create.subject.trim().is_empty() {
        return Err(Error::bad_request("subject must not be empty"));
    }

    let request = ActivityCreateDBRequest {
        kind: create.kind,
        subject: create.subject,
        body: create.body,
        occurred_at: create.occurred_at,
        deal_id: create.deal_id,
        contact_id: create.contact_id,
        created_by: Some(current_user.id),
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let activity = Activities::new(&mut conn).create(&request).await?;

    Ok((StatusCode::CREATED, Json(ActivityResponse::from(activity))))
}

#[utoipa::path(
    get,
    path = "/activities/{id}",
    tag = "activities",
    summary = "Get activity",
    params(("id" = uuid::Uuid, Path, description = "Activity ID")),
    responses(
        (status = 200, description = "Activity", body = ActivityResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Activity not found"),
    ),
    security(("X-Dealflow-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_activity(
    State(state): State<AppState>,
    Path(id): Path<ActivityId>,
    _user: CurrentUser,
) -> Result<Json<ActivityResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let activity = Activities::new(&mut conn)
        .get_by_id(id)
        .await?
        .ok_or_else(|| Error::not_found("Activity", id))?;

    Ok(Json(ActivityResponse::from(activity)))
}

#[utoipa::path(
    patch,
    path = "/activities/{id}",
    tag = "activities",
    summary = "Update activity",
    request_body = ActivityUpdate,
    params(("id" = uuid::Uuid, Path, description = "Activity ID")),
    responses(
        (status = 200, description = "Updated activity", body = ActivityResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Activity not found"),
    ),
    security(("X-Dealflow-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_activity(
    State(state): State<AppState>,
    Path(id): Path<ActivityId>,
    _user: CurrentUser,
    Json(update): Json<ActivityUpdate>,
) -> Result<Json<ActivityResponse>> {
    if update.subject.as_deref().is_some_and(|s| s.trim().is_empty()) {
        return Err(Error::bad_request("subject must not be empty"));
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let activity = Activities::new(&mut conn)
        .update(id, &ActivityUpdateDBRequest::from(update))
        .await
        .map_err(or_not_found("Activity", id))?;

    Ok(Json(ActivityResponse::from(activity)))
}

#[utoipa::path(
    delete,
    path = "/activities/{id}",
    tag = "activities",
    summary = "Delete activity",
    params(("id" = uuid::Uuid, Path, description = "Activity ID")),
    responses(
        (status = 204, description = "Activity deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Activity not found"),
    ),
    security(("X-Dealflow-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_activity(
    State(state): State<AppState>,
    Path(id): Path<ActivityId>,
    _user: CurrentUser,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if Activities::new(&mut conn).delete(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(Error::not_found("Activity", id))
    }
}
