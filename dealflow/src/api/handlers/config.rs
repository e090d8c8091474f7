//! HTTP handler for client configuration metadata.

use axum::{Json, extract::State};

use crate::{
    AppState,
    api::models::{config::ConfigResponse, users::CurrentUser},
};

#[utoipa::path(
    get,
    path = "/config",
    tag = "config",
    summary = "Get config",
    description = "Branding and currency settings for clients",
    responses(
        (status = 200, description = "Client metadata", body = ConfigResponse),
        (status = 401, description = "Unauthorized"),
    ),
    security(("X-Dealflow-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_config(State(state): State<AppState>, _user: CurrentUser) -> Json<ConfigResponse> {
    Json(ConfigResponse {
        organization: state.config.metadata.organization.clone(),
        title: state.config.metadata.title.clone(),
        currency: state.config.pipeline.default_currency.clone(),
    })
}

#[cfg(test)]
mod tests {
    use crate::api::models::users::Role;
    use crate::test_utils::{add_auth_headers, create_test_app, create_test_user};
    use axum::http::StatusCode;
    use serde_json::Value;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_get_config_returns_metadata(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let user = create_test_user(&pool, Role::Rep).await;

        let headers = add_auth_headers(&user);
        let response = app.get("/api/v1/config").add_header(&headers[0].0, &headers[0].1).await;

        response.assert_status(StatusCode::OK);
        let json: Value = response.json();
        assert_eq!(json["currency"], "USD");
        assert!(json.get("organization").is_some());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_get_config_requires_authentication(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;

        let response = app.get("/api/v1/config").await;

        response.assert_status(StatusCode::UNAUTHORIZED);
    }
}
