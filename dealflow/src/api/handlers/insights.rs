//! HTTP handlers for portfolio insights over customer organizations.
//!
//! Each endpoint loads the whole organization table and computes its report in memory with the
//! functions in [`crate::insights`].

use crate::{
    AppState,
    api::models::organizations::ChurnStatsQuery,
    auth::permissions::RequiresAdmin,
    db::handlers::{ChurnEvents, Organizations},
    errors::{Error, Result},
    insights::{self, ChurnStats, PortfolioHealth, RenewalReport, RevenueSummary, UpgradeOpportunity},
};
use axum::{
    Json,
    extract::{Query, State},
};
use chrono::{Duration, Utc};

const MAX_CHURN_WINDOW_DAYS: i64 = 3650;

#[utoipa::path(
    get,
    path = "/admin/insights/health",
    tag = "insights",
    summary = "Portfolio health",
    description = "Health of every organization that has not churned, weakest first, with a count per category.",
    responses(
        (status = 200, description = "Scored portfolio", body = PortfolioHealth),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin role required"),
    ),
    security(("X-Dealflow-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_portfolio_health(State(state): State<AppState>, _: RequiresAdmin) -> Result<Json<PortfolioHealth>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let orgs = Organizations::new(&mut conn).list_all().await?;

    Ok(Json(insights::portfolio_health(&orgs, Utc::now())))
}

#[utoipa::path(
    get,
    path = "/admin/insights/renewals",
    tag = "insights",
    summary = "Upcoming renewals",
    description = "Renewals grouped into overdue, next 30, next 60 and next 90 days.",
    responses(
        (status = 200, description = "Renewal report", body = RenewalReport),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin role required"),
    ),
    security(("X-Dealflow-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_renewals(State(state): State<AppState>, _: RequiresAdmin) -> Result<Json<RenewalReport>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let orgs = Organizations::new(&mut conn).list_all().await?;

    Ok(Json(insights::renewal_buckets(
        &orgs,
        Utc::now().date_naive(),
        &state.config.insights,
    )))
}

#[utoipa::path(
    get,
    path = "/admin/insights/churn",
    tag = "insights",
    summary = "Churn statistics",
    params(ChurnStatsQuery),
    responses(
        (status = 200, description = "Churn over the look-back window", body = ChurnStats),
        (status = 400, description = "Invalid window"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin role required"),
    ),
    security(("X-Dealflow-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_churn_stats(
    State(state): State<AppState>,
    Query(query): Query<ChurnStatsQuery>,
    _: RequiresAdmin,
) -> Result<Json<ChurnStats>> {
    let days = query.days.unwrap_or(state.config.insights.churn_lookback_days);
    if !(1..=MAX_CHURN_WINDOW_DAYS).contains(&days) {
        return Err(Error::bad_request(format!(
            "days must be between 1 and {MAX_CHURN_WINDOW_DAYS}, got {days}"
        )));
    }
    let since = Utc::now() - Duration::days(days);

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let orgs = Organizations::new(&mut tx).list_all().await?;
    let events = ChurnEvents::new(&mut tx).list_since(since).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(insights::churn_stats(&orgs, &events, since)))
}

#[utoipa::path(
    get,
    path = "/admin/insights/upgrades",
    tag = "insights",
    summary = "Upgrade opportunities",
    description = "Seat expansion, tier upgrade and trial conversion candidates, highest MRR first.",
    responses(
        (status = 200, description = "Upgrade opportunities", body = Vec<UpgradeOpportunity>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin role required"),
    ),
    security(("X-Dealflow-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_upgrade_opportunities(
    State(state): State<AppState>,
    _: RequiresAdmin,
) -> Result<Json<Vec<UpgradeOpportunity>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let orgs = Organizations::new(&mut conn).list_all().await?;

    Ok(Json(insights::upgrade_opportunities(&orgs, Utc::now(), &state.config.insights)))
}

#[utoipa::path(
    get,
    path = "/admin/insights/revenue",
    tag = "insights",
    summary = "Revenue summary",
    responses(
        (status = 200, description = "MRR and ARR by tier", body = RevenueSummary),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin role required"),
    ),
    security(("X-Dealflow-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_revenue(State(state): State<AppState>, _: RequiresAdmin) -> Result<Json<RevenueSummary>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let orgs = Organizations::new(&mut conn).list_all().await?;

    Ok(Json(insights::revenue_summary(&orgs)))
}

#[cfg(test)]
mod tests {
    use crate::api::models::users::Role;
    use crate::insights::{ChurnStats, OpportunityKind, PortfolioHealth, RevenueSummary, UpgradeOpportunity};
    use crate::test_utils::{add_auth_headers, create_test_admin_user, create_test_app, create_test_organization, create_test_user};
    use crate::types::Tier;
    use axum::http::StatusCode;
    use rust_decimal::Decimal;
    use serde_json::json;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_insights_require_admin(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let rep = create_test_user(&pool, Role::Rep).await;
        let headers = add_auth_headers(&rep);

        for path in ["health", "renewals", "churn", "upgrades", "revenue"] {
            app.get(&format!("/api/v1/admin/insights/{path}"))
                .add_header(&headers[0].0, &headers[0].1)
                .await
                .assert_status(StatusCode::FORBIDDEN);
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_revenue_and_churn_after_churning(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let admin = create_test_admin_user(&pool).await;
        let headers = add_auth_headers(&admin);
        create_test_organization(&pool, "Stays", Tier::Pro, 400).await;
        let leaving = create_test_organization(&pool, "Leaves", Tier::Starter, 100).await;

        app.post(&format!("/api/v1/admin/organizations/{}/churn", leaving.id))
            .add_header(&headers[0].0, &headers[0].1)
            .json(&json!({ "reason": "competitor" }))
            .await
            .assert_status(StatusCode::CREATED);

        let revenue: RevenueSummary = app
            .get("/api/v1/admin/insights/revenue")
            .add_header(&headers[0].0, &headers[0].1)
            .await
            .json();
        assert_eq!(revenue.mrr, Decimal::from(400));
        assert_eq!(revenue.arr, Decimal::from(4800));
        assert_eq!(revenue.paying_organizations, 1);

        let churn: ChurnStats = app
            .get("/api/v1/admin/insights/churn?days=30")
            .add_header(&headers[0].0, &headers[0].1)
            .await
            .json();
        assert_eq!(churn.churned_count, 1);
        assert_eq!(churn.lost_mrr, Decimal::from(100));
        assert_eq!(churn.churn_rate, Some(0.5));

        app.get("/api/v1/admin/insights/churn?days=0")
            .add_header(&headers[0].0, &headers[0].1)
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let health: PortfolioHealth = app
            .get("/api/v1/admin/insights/health")
            .add_header(&headers[0].0, &headers[0].1)
            .await
            .json();
        assert_eq!(health.organizations.len(), 1);
        assert_eq!(health.organizations[0].name, "Stays");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_upgrade_opportunities(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let admin = create_test_admin_user(&pool).await;
        let headers = add_auth_headers(&admin);
        let org = create_test_organization(&pool, "Crowded", Tier::Starter, 200).await;

        app.patch(&format!("/api/v1/admin/organizations/{}", org.id))
            .add_header(&headers[0].0, &headers[0].1)
            .json(&json!({ "seats_purchased": 10, "seats_active": 10 }))
            .await
            .assert_status(StatusCode::OK);

        let opportunities: Vec<UpgradeOpportunity> = app
            .get("/api/v1/admin/insights/upgrades")
            .add_header(&headers[0].0, &headers[0].1)
            .await
            .json();
        let kinds: Vec<OpportunityKind> = opportunities.iter().map(|o| o.kind).collect();
        assert!(kinds.contains(&OpportunityKind::SeatExpansion));
        let upgrade = opportunities
            .iter()
            .find(|o| o.kind == OpportunityKind::TierUpgrade)
            .unwrap();
        assert_eq!(upgrade.suggested_tier, Some(Tier::Pro));
    }
}
