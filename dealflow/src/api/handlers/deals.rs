//! HTTP handlers for deals and the pipeline summary.

use super::{or_not_found, parse_includes};
use crate::{
    AppState,
    api::models::{
        activities::ActivityResponse,
        deals::{DealCreate, DealResponse, DealUpdate, GetDealQuery, ListDealsQuery, PipelineQuery},
        pagination::{MAX_LIMIT, PaginatedResponse},
        tags::TagResponse,
        users::CurrentUser,
    },
    db::{
        handlers::{Activities, Deals, Repository, Tags, activities::ActivityFilter, deals::DealFilter},
        models::deals::{DealCreateDBRequest, DealDBResponse, DealUpdateDBRequest},
    },
    errors::{Error, Result},
    pipeline::{self, PipelineSummary},
    types::{DealId, TagId},
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, info};

fn validate_value(value: Option<Decimal>) -> Result<()> {
    match value {
        Some(v) if v < Decimal::ZERO => Err(Error::bad_request("value must not be negative")),
        _ => Ok(()),
    }
}

fn record_close(deal: &DealDBResponse) {
    info!(deal_id = %deal.id, stage = %deal.stage.as_str(), "Deal closed");
    metrics::counter!("dealflow_deals_closed_total", "outcome" => deal.stage.as_str()).increment(1);
}

#[utoipa::path(
    get,
    path = "/deals",
    tag = "deals",
    summary = "List deals",
    params(ListDealsQuery),
    responses(
        (status = 200, description = "Page of deals, newest first", body = PaginatedResponse<DealResponse>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("X-Dealflow-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_deals(
    State(state): State<AppState>,
    Query(query): Query<ListDealsQuery>,
    _user: CurrentUser,
) -> Result<Json<PaginatedResponse<DealResponse>>> {
    let (skip, limit) = query.pagination.params();
    let filter = DealFilter {
        stage: query.stage,
        owner_id: query.owner_id,
        contact_id: query.contact_id,
        tag_id: query.tag,
        search: query.search,
        ..DealFilter::new(skip, limit)
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Deals::new(&mut conn);
    let deals = repo.list(&filter).await?;
    let total_count = repo.count(&filter).await?;

    Ok(Json(PaginatedResponse::new(
        deals.into_iter().map(DealResponse::from).collect(),
        total_count,
        skip,
        limit,
    )))
}

#[utoipa::path(
    get,
    path = "/deals/pipeline",
    tag = "deals",
    summary = "Pipeline summary",
    description = "Count, value and probability-weighted value per stage, plus open totals and win rate.",
    params(PipelineQuery),
    responses(
        (status = 200, description = "Pipeline summary", body = PipelineSummary),
        (status = 401, description = "Unauthorized"),
    ),
    security(("X-Dealflow-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_pipeline(
    State(state): State<AppState>,
    Query(query): Query<PipelineQuery>,
    _user: CurrentUser,
) -> Result<Json<PipelineSummary>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let deals = Deals::new(&mut conn).list_all(query.owner_id).await?;

    Ok(Json(pipeline::summarize(&deals)))
}

#[utoipa::path(
    post,
    path = "/deals",
    tag = "deals",
    summary = "Create deal",
    description = "Stage defaults to `lead` and probability to the stage default. Creating a deal in a closed stage stamps `closed_at`.",
    request_body = DealCreate,
    responses(
        (status = 201, description = "Deal created", body = DealResponse),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("X-Dealflow-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_deal(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(create): Json<DealCreate>,
) -> Result<(StatusCode, Json<DealResponse>)> {
    if create.title.trim().is_empty() {
        return Err(Error::bad_request("title must not be empty"));
    }
    pipeline::validate_probability(create.probability).map_err(Error::bad_request)?;
    validate_value(create.value)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let deal = Deals::new(&mut conn)
        .create(&DealCreateDBRequest::new(current_user.id, create, Utc::now()))
        .await?;

    if deal.stage.is_closed() {
        record_close(&deal);
    }
    Ok((StatusCode::CREATED, Json(DealResponse::from(deal))))
}

#[utoipa::path(
    get,
    path = "/deals/{id}",
    tag = "deals",
    summary = "Get deal",
    params(("id" = uuid::Uuid, Path, description = "Deal ID"), GetDealQuery),
    responses(
        (status = 200, description = "Deal details", body = DealResponse),
        (status = 400, description = "Unknown include"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Deal not found"),
    ),
    security(("X-Dealflow-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_deal(
    State(state): State<AppState>,
    Path(id): Path<DealId>,
    Query(query): Query<GetDealQuery>,
    _user: CurrentUser,
) -> Result<Json<DealResponse>> {
    let includes = parse_includes(query.include.as_deref(), &["tags", "activities"])?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let deal = Deals::new(&mut tx)
        .get_by_id(id)
        .await?
        .ok_or_else(|| Error::not_found("Deal", id))?;
    let mut response = DealResponse::from(deal);

    if includes.contains(&"tags") {
        let mut tags = Tags::new(&mut tx).list_for_deals(&[id]).await?;
        response = response.with_tags(tags.remove(&id).unwrap_or_default().into_iter().map(TagResponse::from).collect());
    }
    if includes.contains(&"activities") {
        let filter = ActivityFilter {
            deal_id: Some(id),
            ..ActivityFilter::new(0, MAX_LIMIT)
        };
        let activities = Activities::new(&mut tx).list(&filter).await?;
        response = response.with_activities(activities.into_iter().map(ActivityResponse::from).collect());
    }

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    Ok(Json(response))
}

#[utoipa::path(
    patch,
    path = "/deals/{id}",
    tag = "deals",
    summary = "Update deal",
    description = "Stage changes are applied to the locked row: closing stamps `closed_at` and fixes the probability, reopening clears `closed_at` and `lost_reason`.",
    request_body = DealUpdate,
    params(("id" = uuid::Uuid, Path, description = "Deal ID")),
    responses(
        (status = 200, description = "Updated deal", body = DealResponse),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Deal not found"),
    ),
    security(("X-Dealflow-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_deal(
    State(state): State<AppState>,
    Path(id): Path<DealId>,
    _user: CurrentUser,
    Json(update): Json<DealUpdate>,
) -> Result<Json<DealResponse>> {
    if update.title.as_deref().is_some_and(|title| title.trim().is_empty()) {
        return Err(Error::bad_request("title must not be empty"));
    }
    pipeline::validate_probability(update.probability).map_err(Error::bad_request)?;
    validate_value(update.value)?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let transition = Deals::new(&mut tx)
        .update_tracked(id, &DealUpdateDBRequest::from(update))
        .await
        .map_err(or_not_found("Deal", id))?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    if transition.closed_now() {
        record_close(&transition.deal);
    } else if transition.previous_stage != transition.deal.stage {
        debug!(
            "Deal {} moved from {} to {}",
            id,
            transition.previous_stage.as_str(),
            transition.deal.stage.as_str()
        );
    }
    Ok(Json(DealResponse::from(transition.deal)))
}

#[utoipa::path(
    delete,
    path = "/deals/{id}",
    tag = "deals",
    summary = "Delete deal",
    params(("id" = uuid::Uuid, Path, description = "Deal ID")),
    responses(
        (status = 204, description = "Deal deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Deal not found"),
    ),
    security(("X-Dealflow-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_deal(State(state): State<AppState>, Path(id): Path<DealId>, _user: CurrentUser) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if Deals::new(&mut conn).delete(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(Error::not_found("Deal", id))
    }
}

#[utoipa::path(
    post,
    path = "/deals/{id}/tags/{tag_id}",
    tag = "deals",
    summary = "Tag deal",
    params(
        ("id" = uuid::Uuid, Path, description = "Deal ID"),
        ("tag_id" = uuid::Uuid, Path, description = "Tag ID"),
    ),
    responses(
        (status = 204, description = "Tag attached"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Deal or tag not found"),
    ),
    security(("X-Dealflow-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn add_deal_tag(
    State(state): State<AppState>,
    Path((id, tag_id)): Path<(DealId, TagId)>,
    _user: CurrentUser,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Deals::new(&mut conn);
    if repo.get_by_id(id).await?.is_none() {
        return Err(Error::not_found("Deal", id));
    }
    repo.add_tag(id, tag_id).await.map_err(or_not_found("Tag", tag_id))?;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/deals/{id}/tags/{tag_id}",
    tag = "deals",
    summary = "Untag deal",
    params(
        ("id" = uuid::Uuid, Path, description = "Deal ID"),
        ("tag_id" = uuid::Uuid, Path, description = "Tag ID"),
    ),
    responses(
        (status = 204, description = "Tag detached"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Deal not found"),
    ),
    security(("X-Dealflow-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn remove_deal_tag(
    State(state): State<AppState>,
    Path((id, tag_id)): Path<(DealId, TagId)>,
    _user: CurrentUser,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Deals::new(&mut conn);
    if repo.get_by_id(id).await?.is_none() {
        return Err(Error::not_found("Deal", id));
    }
    if !repo.remove_tag(id, tag_id).await? {
        debug!("Deal {} did not carry tag {}", id, tag_id);
    }

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use crate::api::models::{deals::DealResponse, pagination::PaginatedResponse, users::Role};
    use crate::pipeline::{DealStage, PipelineSummary};
    use crate::test_utils::{
        add_auth_headers, create_test_app, create_test_contact, create_test_deal, create_test_tag, create_test_user,
    };
    use axum::http::StatusCode;
    use rust_decimal::Decimal;
    use serde_json::json;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_deal_defaults(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let user = create_test_user(&pool, Role::Rep).await;
        let headers = add_auth_headers(&user);

        let response = app
            .post("/api/v1/deals")
            .add_header(&headers[0].0, &headers[0].1)
            .json(&json!({ "title": "Annual plan", "value": "1200.00", "tier": "pro" }))
            .await;

        response.assert_status(StatusCode::CREATED);
        let deal: DealResponse = response.json();
        assert_eq!(deal.stage, DealStage::Lead);
        assert_eq!(deal.probability, 10);
        assert_eq!(deal.owner_id, Some(user.id));
        assert!(deal.closed_at.is_none());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_closed_deal_applies_close_rule(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let user = create_test_user(&pool, Role::Rep).await;
        let headers = add_auth_headers(&user);

        let response = app
            .post("/api/v1/deals")
            .add_header(&headers[0].0, &headers[0].1)
            .json(&json!({ "title": "Signed", "stage": "closed_won", "probability": 40, "lost_reason": "n/a" }))
            .await;

        response.assert_status(StatusCode::CREATED);
        let deal: DealResponse = response.json();
        assert_eq!(deal.probability, 100);
        assert!(deal.closed_at.is_some());
        assert!(deal.lost_reason.is_none());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_deal_rejects_bad_probability(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let user = create_test_user(&pool, Role::Rep).await;
        let headers = add_auth_headers(&user);

        app.post("/api/v1/deals")
            .add_header(&headers[0].0, &headers[0].1)
            .json(&json!({ "title": "Too sure", "probability": 150 }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        app.post("/api/v1/deals")
            .add_header(&headers[0].0, &headers[0].1)
            .json(&json!({ "title": "Refund", "value": "-5" }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        app.post("/api/v1/deals")
            .add_header(&headers[0].0, &headers[0].1)
            .json(&json!({ "title": "Orphan", "contact_id": uuid::Uuid::new_v4() }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_stage_transitions_through_api(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let user = create_test_user(&pool, Role::Rep).await;
        let headers = add_auth_headers(&user);
        let deal = create_test_deal(&pool, user.id, None, "Renewal").await;

        let response = app
            .patch(&format!("/api/v1/deals/{}", deal.id))
            .add_header(&headers[0].0, &headers[0].1)
            .json(&json!({ "stage": "closed_lost", "lost_reason": "budget" }))
            .await;
        response.assert_status(StatusCode::OK);
        let lost: DealResponse = response.json();
        assert_eq!(lost.probability, 0);
        assert!(lost.closed_at.is_some());
        assert_eq!(lost.lost_reason.as_deref(), Some("budget"));

        let response = app
            .patch(&format!("/api/v1/deals/{}", deal.id))
            .add_header(&headers[0].0, &headers[0].1)
            .json(&json!({ "stage": "negotiation" }))
            .await;
        let reopened: DealResponse = response.json();
        assert_eq!(reopened.probability, 75);
        assert!(reopened.closed_at.is_none());
        assert!(reopened.lost_reason.is_none());

        app.patch(&format!("/api/v1/deals/{}", uuid::Uuid::new_v4()))
            .add_header(&headers[0].0, &headers[0].1)
            .json(&json!({ "title": "Ghost" }))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_pipeline_summary(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let user = create_test_user(&pool, Role::Rep).await;
        let other = create_test_user(&pool, Role::Rep).await;
        let headers = add_auth_headers(&user);

        for (title, stage, value) in [("A", "proposal", "1000"), ("B", "closed_won", "500"), ("C", "closed_lost", "300")] {
            app.post("/api/v1/deals")
                .add_header(&headers[0].0, &headers[0].1)
                .json(&json!({ "title": title, "stage": stage, "value": value }))
                .await
                .assert_status(StatusCode::CREATED);
        }
        create_test_deal(&pool, other.id, None, "Someone else's").await;

        let response = app
            .get(&format!("/api/v1/deals/pipeline?owner_id={}", user.id))
            .add_header(&headers[0].0, &headers[0].1)
            .await;
        response.assert_status(StatusCode::OK);
        let summary: PipelineSummary = response.json();
        assert_eq!(summary.open_count, 1);
        assert_eq!(summary.open_value, Decimal::from(1000));
        assert_eq!(summary.weighted_open_value, Decimal::from(500));
        assert_eq!(summary.won_value, Decimal::from(500));
        assert_eq!(summary.win_rate, Some(0.5));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_filter_tags_and_delete(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let user = create_test_user(&pool, Role::Rep).await;
        let headers = add_auth_headers(&user);
        let contact = create_test_contact(&pool, user.id, "Grace").await;
        let deal = create_test_deal(&pool, user.id, Some(contact.id), "Tagged").await;
        create_test_deal(&pool, user.id, None, "Untagged").await;
        let tag = create_test_tag(&pool, "q4").await;

        app.post(&format!("/api/v1/deals/{}/tags/{}", deal.id, tag.id))
            .add_header(&headers[0].0, &headers[0].1)
            .await
            .assert_status(StatusCode::NO_CONTENT);

        let page: PaginatedResponse<DealResponse> = app
            .get(&format!("/api/v1/deals?tag={}", tag.id))
            .add_header(&headers[0].0, &headers[0].1)
            .await
            .json();
        assert_eq!(page.total_count, 1);

        let page: PaginatedResponse<DealResponse> = app
            .get(&format!("/api/v1/deals?contact_id={}", contact.id))
            .add_header(&headers[0].0, &headers[0].1)
            .await
            .json();
        assert_eq!(page.data[0].id, deal.id);

        let detail: DealResponse = app
            .get(&format!("/api/v1/deals/{}?include=tags,activities", deal.id))
            .add_header(&headers[0].0, &headers[0].1)
            .await
            .json();
        assert_eq!(detail.tags.unwrap()[0].name, "q4");

        app.delete(&format!("/api/v1/deals/{}/tags/{}", deal.id, tag.id))
            .add_header(&headers[0].0, &headers[0].1)
            .await
            .assert_status(StatusCode::NO_CONTENT);
        app.delete(&format!("/api/v1/deals/{}", deal.id))
            .add_header(&headers[0].0, &headers[0].1)
            .await
            .assert_status(StatusCode::NO_CONTENT);
        app.get(&format!("/api/v1/deals/{}", deal.id))
            .add_header(&headers[0].0, &headers[0].1)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
