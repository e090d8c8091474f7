//! Test utilities for integration testing (available with `test-utils` feature).

use crate::api::models::{
    contacts::ContactCreate,
    deals::DealCreate,
    users::{Role, UserResponse},
};
use crate::config::{Config, DatabaseConfig, EmailTransportConfig, PoolSettings, ProxyHeaderAuthConfig};
use crate::db::{
    handlers::{Contacts, Deals, Organizations, Repository, Tags, Users},
    models::{
        contacts::{ContactCreateDBRequest, ContactDBResponse},
        deals::{DealCreateDBRequest, DealDBResponse},
        organizations::{OrganizationCreateDBRequest, OrganizationDBResponse, OrganizationStatus},
        tags::{TagCreateDBRequest, TagDBResponse},
        users::UserCreateDBRequest,
    },
};
use crate::email::EmailService;
use crate::types::{ContactId, Tier, UserId};
use crate::AppState;
use axum_test::TestServer;
use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

pub async fn create_test_app(pool: PgPool) -> TestServer {
    create_test_app_with_config(pool, create_test_config()).await
}

pub async fn create_test_app_with_config(pool: PgPool, config: Config) -> TestServer {
    let app = crate::Application::new_with_pool(config, Some(pool))
        .await
        .expect("Failed to create application");

    app.into_test_server()
}

pub fn create_test_config() -> Config {
    // Use temp directory for test emails
    let temp_dir = std::env::temp_dir().join(format!("dealflow-test-emails-{}", std::process::id()));

    let mut config = Config {
        database: DatabaseConfig::External {
            // Will get overriden by the pool sqlx::test hands us
            url: "Something".to_string(),
            pool: PoolSettings {
                max_connections: 1,
                min_connections: 1,
                ..Default::default()
            },
        },
        host: "127.0.0.1".to_string(),
        port: 0,
        admin_email: "admin@test.com".to_string(),
        enable_metrics: false,
        enable_otel_export: false,
        ..Default::default()
    };
    config.auth.proxy_header = ProxyHeaderAuthConfig {
        enabled: true,
        auto_create_users: true,
        ..Default::default()
    };
    config.email.transport = EmailTransportConfig::File {
        path: temp_dir.to_string_lossy().to_string(),
    };
    config.email.from_email = "sales@test.com".to_string();
    config.email.from_name = "Dealflow Test".to_string();
    config
}

/// Application state for exercising extractors directly, without a router
pub fn create_test_state(pool: PgPool, config: Config) -> AppState {
    let email = EmailService::new(&config).expect("Failed to create email service");
    AppState::builder().db(pool).config(config).email(Arc::new(email)).build()
}

pub async fn create_test_user(pool: &PgPool, role: Role) -> UserResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let mut users_repo = Users::new(&mut conn);
    let email = format!("testuser_{}@example.com", Uuid::new_v4().simple());

    let user_create = UserCreateDBRequest {
        email,
        display_name: Some("Test User".to_string()),
        role,
        auth_source: "test".to_string(),
    };

    let user = users_repo.create(&user_create).await.expect("Failed to create test user");
    UserResponse::from(user)
}

pub async fn create_test_admin_user(pool: &PgPool) -> UserResponse {
    create_test_user(pool, Role::Admin).await
}

pub fn add_auth_headers(user: &UserResponse) -> Vec<(String, String)> {
    let config = ProxyHeaderAuthConfig::default();
    vec![(config.header_name, user.email.clone())]
}

/// A contact owned by `owner_id`, emailable at `<first_name>@example.com`
pub async fn create_test_contact(pool: &PgPool, owner_id: UserId, first_name: &str) -> ContactDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let create = ContactCreate {
        first_name: first_name.to_string(),
        last_name: Some("Tester".to_string()),
        email: Some(format!("{}@example.com", first_name.to_lowercase())),
        phone: None,
        company: Some("Example Corp".to_string()),
        title: None,
        notes: None,
        owner_id: None,
    };

    Contacts::new(&mut conn)
        .create(&ContactCreateDBRequest::new(owner_id, create))
        .await
        .expect("Failed to create test contact")
}

pub async fn create_test_tag(pool: &PgPool, name: &str) -> TagDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    Tags::new(&mut conn)
        .create(&TagCreateDBRequest {
            name: name.to_string(),
            color: None,
        })
        .await
        .expect("Failed to create test tag")
}

/// An open `lead` deal with no value
pub async fn create_test_deal(pool: &PgPool, owner_id: UserId, contact_id: Option<ContactId>, title: &str) -> DealDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let create = DealCreate {
        title: title.to_string(),
        stage: None,
        probability: None,
        lost_reason: None,
        tier: None,
        value: None,
        expected_close_date: None,
        notes: None,
        contact_id,
        owner_id: None,
    };

    Deals::new(&mut conn)
        .create(&DealCreateDBRequest::new(owner_id, create, Utc::now()))
        .await
        .expect("Failed to create test deal")
}

/// An active organization using half of its ten seats, last seen now
pub async fn create_test_organization(pool: &PgPool, name: &str, tier: Tier, mrr: i64) -> OrganizationDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    Organizations::new(&mut conn)
        .create(&OrganizationCreateDBRequest {
            name: name.to_string(),
            tier,
            status: OrganizationStatus::Active,
            mrr: Decimal::from(mrr),
            seats_purchased: 10,
            seats_active: 5,
            renewal_date: None,
            trial_ends_at: None,
            last_active_at: Some(Utc::now()),
            open_tickets: 0,
            payment_failed: false,
            contact_id: None,
        })
        .await
        .expect("Failed to create test organization")
}
