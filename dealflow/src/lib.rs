//! # dealflow: a self-hostable sales CRM API
//!
//! `dealflow` is the backend for a small sales team. Reps keep their contacts, move deals through
//! a pipeline, log calls and meetings, set follow-up reminders and send templated email from their
//! own mailboxes. Admins additionally see the paying side of the business: customer
//! organizations, their health scores, upcoming renewals, churn and expansion opportunities.
//!
//! ## Architecture
//!
//! The service is an [Axum](https://github.com/tokio-rs/axum) JSON API over PostgreSQL. It can run
//! against an external database or, with the `embedded-db` feature, start a bundled PostgreSQL
//! for development.
//!
//! Authentication is delegated to a reverse proxy that puts the user's email in a trusted header
//! (see [`auth`]). Every request under `/api/v1` resolves that header to a user, then reaches a
//! handler in [`api::handlers`], which validates input, runs its queries through the repositories in
//! [`db::handlers`] and returns an API model. Pure business rules live outside the HTTP layer:
//!
//! - [`pipeline`]: deal stages, default probabilities and the pipeline summary
//! - [`insights`]: health scoring, renewals, churn statistics, upgrade suggestions and revenue
//! - [`email`]: template rendering and delivery over SMTP or to `.eml` files
//!
//! ### Observability
//!
//! Spans and logs go through `tracing`, optionally exported over OTLP (see [`telemetry`]).
//! With `enable_metrics`, Prometheus metrics are served at `/internal/metrics`, including
//! `dealflow_deals_closed_total`, `dealflow_email_drafts_sent_total` and
//! `dealflow_churn_events_total`.
//!
//! ## Getting Started
//!
//! ```bash
//! DATABASE_URL=postgres://localhost/dealflow dealflow -f config.yaml
//! ```
//!
//! API documentation is served at `/docs`.

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod email;
pub mod errors;
pub mod insights;
mod openapi;
pub mod pipeline;
pub mod telemetry;
mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use crate::{
    api::models::users::Role,
    config::CorsOrigin,
    db::{
        handlers::{Repository, Users},
        models::users::UserCreateDBRequest,
    },
    email::EmailService,
    openapi::ApiDoc,
};
use axum::{
    Router,
    http::{self, HeaderValue},
    routing::{delete, get, patch, post},
};
use axum_prometheus::PrometheusMetricLayer;
use bon::Builder;
pub use config::Config;
use sqlx::{PgPool, postgres::PgPoolOptions};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use types::{ContactId, DealId, OrganizationId, UserId};

/// Application state shared across all request handlers.
///
/// ```ignore
/// let state = AppState::builder()
///     .db(pool)
///     .config(config)
///     .email(Arc::new(EmailService::new(&config)?))
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
    pub email: Arc<EmailService>,
}

/// Get the dealflow database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Create the initial admin user if it doesn't exist.
///
/// An existing user with this email is promoted to admin rather than duplicated, so the configured
/// address can always reach `/admin`.
#[instrument(skip_all)]
pub async fn create_initial_admin_user(email: &str, db: &PgPool) -> Result<UserId, sqlx::Error> {
    let mut tx = db.begin().await?;
    let mut user_repo = Users::new(&mut tx);

    if let Some(existing_user) = user_repo
        .get_user_by_email(email)
        .await
        .map_err(|e| sqlx::Error::Protocol(format!("Failed to check existing user: {e}")))?
    {
        if existing_user.role != Role::Admin {
            sqlx::query("UPDATE users SET role = 'admin', updated_at = NOW() WHERE id = $1")
                .bind(existing_user.id)
                .execute(&mut *tx)
                .await?;
            info!("Promoted existing user {} to admin", email);
        }
        tx.commit().await?;
        return Ok(existing_user.id);
    }

    let user_create = UserCreateDBRequest {
        email: email.to_string(),
        display_name: None,
        role: Role::Admin,
        auth_source: "system".to_string(),
    };

    let created_user = user_repo
        .create(&user_create)
        .await
        .map_err(|e| sqlx::Error::Protocol(format!("Failed to create admin user: {e}")))?;

    tx.commit().await?;
    Ok(created_user.id)
}

/// Connect to the configured database (starting the embedded one if asked) and run migrations.
async fn setup_database(config: &Config) -> anyhow::Result<(Option<db::embedded::EmbeddedDatabase>, PgPool)> {
    let (embedded_db, database_url) = match &config.database {
        config::DatabaseConfig::Embedded { .. } => {
            let persistent = config.database.embedded_persistent();
            info!("Starting with embedded database (persistent: {})", persistent);
            if !persistent {
                info!("persistent=false: database will be ephemeral and data will be lost on shutdown");
            }
            #[cfg(feature = "embedded-db")]
            {
                let data_dir = config.database.embedded_data_dir();
                let embedded_db = db::embedded::EmbeddedDatabase::start(data_dir, persistent).await?;
                let url = embedded_db.connection_string().to_string();
                (Some(embedded_db), url)
            }
            #[cfg(not(feature = "embedded-db"))]
            {
                anyhow::bail!(
                    "Embedded database is configured but the feature is not enabled. \
                     Rebuild with --features embedded-db to use embedded database."
                );
            }
        }
        config::DatabaseConfig::External { url, .. } => {
            info!("Using external database");
            (None::<db::embedded::EmbeddedDatabase>, url.clone())
        }
    };

    let settings = config.database.pool_settings();
    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(settings.acquire_timeout)
        .idle_timeout(settings.idle_timeout)
        .max_lifetime(settings.max_lifetime)
        .connect(&database_url)
        .await?;
    migrator().run(&pool).await?;

    Ok((embedded_db, pool))
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    // `*` cannot be mixed into an origin list
    let allow_origin = if config
        .auth
        .cors
        .allowed_origins
        .iter()
        .any(|origin| matches!(origin, CorsOrigin::Wildcard))
    {
        AllowOrigin::any()
    } else {
        let mut origins = Vec::new();
        for origin in &config.auth.cors.allowed_origins {
            if let CorsOrigin::Url(url) = origin {
                origins.push(url.as_str().trim_end_matches('/').parse::<HeaderValue>()?);
            }
        }
        AllowOrigin::list(origins)
    };

    let mut cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            http::Method::GET,
            http::Method::POST,
            http::Method::PATCH,
            http::Method::DELETE,
            http::Method::OPTIONS,
        ])
        .allow_headers([
            http::header::CONTENT_TYPE,
            http::HeaderName::from_bytes(config.auth.proxy_header.header_name.as_bytes())?,
        ])
        .allow_credentials(config.auth.cors.allow_credentials)
        .expose_headers(vec![http::header::LOCATION]);

    if let Some(max_age) = config.auth.cors.max_age {
        cors = cors.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the application router: the CRM API under `/api/v1`, docs, health check, optional
/// Prometheus metrics, CORS and request tracing.
#[instrument(skip_all)]
pub fn build_router(state: &AppState) -> anyhow::Result<Router> {
    use api::handlers::{
        activities, config as config_handler, contacts, deals, email_drafts, insights as insights_handler, mail_accounts,
        organizations, processed_emails, reminders, tags, users,
    };

    let api_routes = Router::new()
        .route("/config", get(config_handler::get_config))
        // Users
        .route("/users", get(users::list_users))
        .route("/users/current", get(users::get_current_user))
        .route("/users/{id}", patch(users::update_user))
        // Contacts
        .route("/contacts", get(contacts::list_contacts).post(contacts::create_contact))
        .route(
            "/contacts/{id}",
            get(contacts::get_contact)
                .patch(contacts::update_contact)
                .delete(contacts::delete_contact),
        )
        .route(
            "/contacts/{id}/tags/{tag_id}",
            post(contacts::add_contact_tag).delete(contacts::remove_contact_tag),
        )
        // Deals
        .route("/deals", get(deals::list_deals).post(deals::create_deal))
        .route("/deals/pipeline", get(deals::get_pipeline))
        .route(
            "/deals/{id}",
            get(deals::get_deal).patch(deals::update_deal).delete(deals::delete_deal),
        )
        .route(
            "/deals/{id}/tags/{tag_id}",
            post(deals::add_deal_tag).delete(deals::remove_deal_tag),
        )
        // Activities
        .route("/activities", get(activities::list_activities).post(activities::create_activity))
        .route(
            "/activities/{id}",
            get(activities::get_activity)
                .patch(activities::update_activity)
                .delete(activities::delete_activity),
        )
        // Reminders
        .route("/reminders", get(reminders::list_reminders).post(reminders::create_reminder))
        .route(
            "/reminders/{id}",
            get(reminders::get_reminder)
                .patch(reminders::update_reminder)
                .delete(reminders::delete_reminder),
        )
        .route("/reminders/{id}/complete", post(reminders::complete_reminder))
        .route("/reminders/{id}/reopen", post(reminders::reopen_reminder))
        // Tags
        .route("/tags", get(tags::list_tags).post(tags::create_tag))
        .route("/tags/{id}", patch(tags::update_tag).delete(tags::delete_tag))
        // Mail
        .route(
            "/mail-accounts",
            get(mail_accounts::list_mail_accounts).post(mail_accounts::create_mail_account),
        )
        .route("/mail-accounts/{id}", delete(mail_accounts::delete_mail_account))
        .route(
            "/email-drafts",
            get(email_drafts::list_email_drafts).post(email_drafts::create_email_draft),
        )
        .route(
            "/email-drafts/{id}",
            get(email_drafts::get_email_draft)
                .patch(email_drafts::update_email_draft)
                .delete(email_drafts::delete_email_draft),
        )
        .route("/email-drafts/{id}/send", post(email_drafts::send_email_draft))
        .route(
            "/processed-emails",
            get(processed_emails::list_processed_emails).post(processed_emails::ingest_processed_email),
        )
        // Customer organizations (admin only)
        .route(
            "/admin/organizations",
            get(organizations::list_organizations).post(organizations::create_organization),
        )
        .route(
            "/admin/organizations/{id}",
            get(organizations::get_organization)
                .patch(organizations::update_organization)
                .delete(organizations::delete_organization),
        )
        .route("/admin/organizations/{id}/health", get(organizations::get_organization_health))
        .route("/admin/organizations/{id}/churn", post(organizations::churn_organization))
        .route("/admin/churn-events", get(organizations::list_churn_events))
        // Insights (admin only)
        .route("/admin/insights/health", get(insights_handler::get_portfolio_health))
        .route("/admin/insights/renewals", get(insights_handler::get_renewals))
        .route("/admin/insights/churn", get(insights_handler::get_churn_stats))
        .route("/admin/insights/upgrades", get(insights_handler::get_upgrade_opportunities))
        .route("/admin/insights/revenue", get(insights_handler::get_revenue))
        .with_state(state.clone());

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .nest("/api/v1", api_routes)
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()))
        .route("/api-docs/openapi.json", get(|| async { axum::Json(ApiDoc::openapi()) }));

    let cors_layer = create_cors_layer(&state.config)?;
    let mut router = router.layer(cors_layer);

    if state.config.enable_metrics {
        let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();
        router = router
            .route("/internal/metrics", get(|| async move { metric_handle.render() }))
            .layer(prometheus_layer);
    }

    let router = router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

pub struct Application {
    router: Router,
    config: Config,
    pool: PgPool,
    _embedded_db: Option<db::embedded::EmbeddedDatabase>,
}

impl Application {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        Self::new_with_pool(config, None).await
    }

    /// Build the application, reusing `pool` when given instead of connecting from the config.
    /// Migrations run either way.
    pub async fn new_with_pool(config: Config, pool: Option<PgPool>) -> anyhow::Result<Self> {
        debug!("Starting dealflow with configuration: {:#?}", config);

        let (_embedded_db, pool) = match pool {
            Some(pool) => {
                migrator().run(&pool).await?;
                (None, pool)
            }
            None => setup_database(&config).await?,
        };

        create_initial_admin_user(&config.admin_email, &pool)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to create initial admin user: {}", e))?;

        let email = EmailService::new(&config).map_err(|e| anyhow::anyhow!("Failed to create email service: {}", e))?;

        let app_state = AppState::builder()
            .db(pool.clone())
            .config(config.clone())
            .email(Arc::new(email))
            .build();

        let router = build_router(&app_state)?;

        Ok(Self {
            router,
            config,
            pool,
            _embedded_db,
        })
    }

    #[cfg(any(test, feature = "test-utils"))]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router.into_make_service()).expect("Failed to create test server")
    }

    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "Dealflow listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Closing database connections...");
        self.pool.close().await;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        if let Some(embedded_db) = self._embedded_db {
            info!("Shutting down embedded database...");
            embedded_db.stop().await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::create_initial_admin_user;
    use crate::{
        api::models::users::{Role, UserResponse},
        db::handlers::Users,
        test_utils::*,
    };
    use axum::http::StatusCode;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_initial_admin_user_is_idempotent(pool: PgPool) {
        let first = create_initial_admin_user("boss@example.com", &pool).await.unwrap();
        let second = create_initial_admin_user("boss@example.com", &pool).await.unwrap();
        assert_eq!(first, second);

        let mut conn = pool.acquire().await.unwrap();
        let user = Users::new(&mut conn).get_user_by_email("boss@example.com").await.unwrap().unwrap();
        assert_eq!(user.role, Role::Admin);
        assert_eq!(user.auth_source, "system");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_initial_admin_promotes_existing_rep(pool: PgPool) {
        let rep = create_test_user(&pool, Role::Rep).await;
        let id = create_initial_admin_user(&rep.email, &pool).await.unwrap();
        assert_eq!(id, rep.id);

        let mut conn = pool.acquire().await.unwrap();
        let user = Users::new(&mut conn).get_user_by_email(&rep.email).await.unwrap().unwrap();
        assert_eq!(user.role, Role::Admin);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_configured_admin_can_sign_in(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;

        let response = app.get("/api/v1/users/current").add_header("x-dealflow-user", "admin@test.com").await;
        response.assert_status_ok();
        let user: UserResponse = response.json();
        assert_eq!(user.role, Role::Admin);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_healthz_and_openapi(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;

        app.get("/healthz").await.assert_status_ok();

        let response = app.get("/api-docs/openapi.json").await;
        response.assert_status_ok();
        let doc: serde_json::Value = response.json();
        assert!(doc["paths"]["/deals/{id}"].is_object());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_missing_identity_header_is_unauthorized(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        app.get("/api/v1/contacts").await.assert_status(StatusCode::UNAUTHORIZED);
    }
}
