//! HTTP handlers for customer organizations and churn, under `/admin`.

use super::or_not_found;
use crate::{
    AppState,
    api::models::{
        organizations::{
            ChurnEventResponse, ChurnRequest, ListChurnEventsQuery, ListOrganizationsQuery, OrganizationCreate,
            OrganizationResponse, OrganizationUpdate,
        },
        pagination::PaginatedResponse,
    },
    auth::permissions::RequiresAdmin,
    db::{
        handlers::{ChurnEvents, Organizations, Repository, organizations::OrganizationFilter},
        models::organizations::{
            ChurnEventCreateDBRequest, OrganizationCreateDBRequest, OrganizationStatus, OrganizationUpdateDBRequest,
        },
    },
    errors::{Error, Result},
    insights::{self, HealthBreakdown},
    types::OrganizationId,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use rust_decimal::Decimal;
use tracing::info;

fn validate_mrr(mrr: Option<Decimal>) -> Result<()> {
    match mrr {
        Some(mrr) if mrr < Decimal::ZERO => Err(Error::bad_request("mrr must not be negative")),
        _ => Ok(()),
    }
}

fn reject_churned_status(status: Option<OrganizationStatus>) -> Result<()> {
    if status == Some(OrganizationStatus::Churned) {
        return Err(Error::bad_request("Use the churn endpoint to mark an organization as churned"));
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/admin/organizations",
    tag = "organizations",
    summary = "List organizations",
    params(ListOrganizationsQuery),
    responses(
        (status = 200, description = "Page of organizations, by name", body = PaginatedResponse<OrganizationResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin role required"),
    ),
    security(("X-Dealflow-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_organizations(
    State(state): State<AppState>,
    Query(query): Query<ListOrganizationsQuery>,
    _: RequiresAdmin,
) -> Result<Json<PaginatedResponse<OrganizationResponse>>> {
    let (skip, limit) = query.pagination.params();
    let filter = OrganizationFilter {
        status: query.status,
        tier: query.tier,
        search: query.search,
        ..OrganizationFilter::new(skip, limit)
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Organizations::new(&mut conn);
    let orgs = repo.list(&filter).await?;
    let total_count = repo.count(&filter).await?;

    Ok(Json(PaginatedResponse::new(
        orgs.into_iter().map(OrganizationResponse::from).collect(),
        total_count,
        skip,
        limit,
    )))
}

#[utoipa::path(
    post,
    path = "/admin/organizations",
    tag = "organizations",
    summary = "Create organization",
    request_body = OrganizationCreate,
    responses(
        (status = 201, description = "Organization created", body = OrganizationResponse),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin role required"),
    ),
    security(("X-Dealflow-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_organization(
    State(state): State<AppState>,
    _: RequiresAdmin,
    Json(create): Json<OrganizationCreate>,
) -> Result<(StatusCode, Json<OrganizationResponse>)> {
    if create.name.trim().is_empty() {
        return Err(Error::bad_request("name must not be empty"));
    }
    validate_mrr(create.mrr)?;
    reject_churned_status(create.status)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let org = Organizations::new(&mut conn)
        .create(&OrganizationCreateDBRequest::from(create))
        .await?;

    Ok((StatusCode::CREATED, Json(OrganizationResponse::from(org))))
}

#[utoipa::path(
    get,
    path = "/admin/organizations/{id}",
    tag = "organizations",
    summary = "Get organization",
    params(("id" = uuid::Uuid, Path, description = "Organization ID")),
    responses(
        (status = 200, description = "Organization", body = OrganizationResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "Organization not found"),
    ),
    security(("X-Dealflow-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_organization(
    State(state): State<AppState>,
    Path(id): Path<OrganizationId>,
    _: RequiresAdmin,
) -> Result<Json<OrganizationResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let org = Organizations::new(&mut conn)
        .get_by_id(id)
        .await?
        .ok_or_else(|| Error::not_found("Organization", id))?;

    Ok(Json(OrganizationResponse::from(org)))
}

#[utoipa::path(
    patch,
    path = "/admin/organizations/{id}",
    tag = "organizations",
    summary = "Update organization",
    request_body = OrganizationUpdate,
    params(("id" = uuid::Uuid, Path, description = "Organization ID")),
    responses(
        (status = 200, description = "Updated organization", body = OrganizationResponse),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "Organization not found"),
    ),
    security(("X-Dealflow-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_organization(
    State(state): State<AppState>,
    Path(id): Path<OrganizationId>,
    _: RequiresAdmin,
    Json(update): Json<OrganizationUpdate>,
) -> Result<Json<OrganizationResponse>> {
    if update.name.as_deref().is_some_and(|name| name.trim().is_empty()) {
        return Err(Error::bad_request("name must not be empty"));
    }
    validate_mrr(update.mrr)?;
    reject_churned_status(update.status)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let org = Organizations::new(&mut conn)
        .update(id, &OrganizationUpdateDBRequest::from(update))
        .await
        .map_err(or_not_found("Organization", id))?;

    Ok(Json(OrganizationResponse::from(org)))
}

#[utoipa::path(
    delete,
    path = "/admin/organizations/{id}",
    tag = "organizations",
    summary = "Delete organization",
    description = "Also deletes the organization's churn history.",
    params(("id" = uuid::Uuid, Path, description = "Organization ID")),
    responses(
        (status = 204, description = "Organization deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "Organization not found"),
    ),
    security(("X-Dealflow-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_organization(
    State(state): State<AppState>,
    Path(id): Path<OrganizationId>,
    _: RequiresAdmin,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if Organizations::new(&mut conn).delete(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(Error::not_found("Organization", id))
    }
}

#[utoipa::path(
    get,
    path = "/admin/organizations/{id}/health",
    tag = "organizations",
    summary = "Organization health",
    description = "Health score out of 100 with the points from usage, engagement, support and billing.",
    params(("id" = uuid::Uuid, Path, description = "Organization ID")),
    responses(
        (status = 200, description = "Health breakdown", body = HealthBreakdown),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "Organization not found"),
    ),
    security(("X-Dealflow-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_organization_health(
    State(state): State<AppState>,
    Path(id): Path<OrganizationId>,
    _: RequiresAdmin,
) -> Result<Json<HealthBreakdown>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let org = Organizations::new(&mut conn)
        .get_by_id(id)
        .await?
        .ok_or_else(|| Error::not_found("Organization", id))?;

    Ok(Json(insights::health_breakdown(&org, Utc::now())))
}

#[utoipa::path(
    post,
    path = "/admin/organizations/{id}/churn",
    tag = "organizations",
    summary = "Record churn",
    description = "Records a churn event carrying the organization's current MRR, then marks it churned with zero MRR.",
    request_body = ChurnRequest,
    params(("id" = uuid::Uuid, Path, description = "Organization ID")),
    responses(
        (status = 201, description = "Churn recorded", body = ChurnEventResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "Organization not found"),
        (status = 409, description = "Organization has already churned"),
    ),
    security(("X-Dealflow-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn churn_organization(
    State(state): State<AppState>,
    Path(id): Path<OrganizationId>,
    RequiresAdmin(admin): RequiresAdmin,
    Json(request): Json<ChurnRequest>,
) -> Result<(StatusCode, Json<ChurnEventResponse>)> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let org = Organizations::new(&mut tx)
        .get_for_update(id)
        .await?
        .ok_or_else(|| Error::not_found("Organization", id))?;
    if org.status == OrganizationStatus::Churned {
        return Err(Error::Conflict {
            message: format!("Organization {} has already churned", org.name),
        });
    }

    let event = ChurnEvents::new(&mut tx)
        .create(
            &ChurnEventCreateDBRequest {
                organization_id: id,
                reason: request.reason,
                details: request.details,
                recorded_by: Some(admin.id),
            },
            org.mrr,
        )
        .await?;
    Organizations::new(&mut tx)
        .mark_churned(id)
        .await
        .map_err(or_not_found("Organization", id))?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    info!(organization = %org.name, reason = %event.reason, lost_mrr = %event.lost_mrr, "Organization churned");
    metrics::counter!("dealflow_churn_events_total").increment(1);

    Ok((StatusCode::CREATED, Json(ChurnEventResponse::from(event))))
}

#[utoipa::path(
    get,
    path = "/admin/churn-events",
    tag = "organizations",
    summary = "List churn events",
    params(ListChurnEventsQuery),
    responses(
        (status = 200, description = "Page of churn events, newest first", body = PaginatedResponse<ChurnEventResponse>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin role required"),
    ),
    security(("X-Dealflow-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_churn_events(
    State(state): State<AppState>,
    Query(query): Query<ListChurnEventsQuery>,
    _: RequiresAdmin,
) -> Result<Json<PaginatedResponse<ChurnEventResponse>>> {
    let (skip, limit) = query.pagination.params();

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = ChurnEvents::new(&mut conn);
    let events = repo.list(query.organization_id, skip, limit).await?;
    let total_count = repo.count(query.organization_id).await?;

    Ok(Json(PaginatedResponse::new(
        events.into_iter().map(ChurnEventResponse::from).collect(),
        total_count,
        skip,
        limit,
    )))
}
