use crate::{
    AppState,
    api::models::users::CurrentUser,
    config::Config,
    db::{
        errors::DbError,
        handlers::{Repository, Users},
        models::users::UserCreateDBRequest,
    },
    errors::{Error, Result},
};
use axum::{extract::FromRequestParts, http::request::Parts};
use sqlx::PgPool;
use tracing::{debug, instrument, trace};

/// Resolve the email in the identity header to a user row.
///
/// `Ok(None)` means there is no usable header, or the email is unknown and auto-creation is off.
#[instrument(skip_all)]
async fn resolve_proxy_user(parts: &Parts, config: &Config, db: &PgPool) -> Result<Option<CurrentUser>> {
    let Some(email) = parts
        .headers
        .get(&config.auth.proxy_header.header_name)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|email| !email.is_empty())
    else {
        return Ok(None);
    };

    let mut conn = db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut users = Users::new(&mut conn);

    if let Some(user) = users.get_user_by_email(email).await? {
        return Ok(Some(user.into()));
    }
    if !config.auth.proxy_header.auto_create_users {
        return Ok(None);
    }

    match users.create(&UserCreateDBRequest::from_proxy_header(email)).await {
        Ok(user) => {
            debug!(user_id = %user.id, "Provisioned rep from proxy header");
            Ok(Some(user.into()))
        }
        // A concurrent first request provisioned the same email
        Err(DbError::UniqueViolation { .. }) => Ok(users.get_user_by_email(email).await?.map(CurrentUser::from)),
        Err(e) => Err(e.into()),
    }
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    #[instrument(skip_all)]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        if !state.config.auth.proxy_header.enabled {
            return Err(Error::Unauthenticated { message: None });
        }

        match resolve_proxy_user(parts, &state.config, &state.db).await? {
            Some(user) => {
                trace!(user_id = %user.id, "Authenticated from proxy header");
                Ok(user)
            }
            None => Err(Error::Unauthenticated { message: None }),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        api::models::users::{CurrentUser, Role},
        db::handlers::Users,
        test_utils::{create_test_config, create_test_state},
    };
    use axum::{extract::FromRequestParts as _, http::request::Parts};
    use sqlx::PgPool;

    fn create_test_parts_with_header(header_name: &str, header_value: &str) -> Parts {
        let request = axum::http::Request::builder()
            .uri("http://localhost/test")
            .header(header_name, header_value)
            .body(())
            .unwrap();

        let (parts, _body) = request.into_parts();
        parts
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_existing_user_extraction(pool: PgPool) {
        let state = create_test_state(pool.clone(), create_test_config());
        let test_user = crate::test_utils::create_test_user(&pool, Role::Rep).await;

        let mut parts = create_test_parts_with_header("x-dealflow-user", &test_user.email);
        let current_user = CurrentUser::from_request_parts(&mut parts, &state).await.unwrap();

        assert_eq!(current_user.id, test_user.id);
        assert_eq!(current_user.role, Role::Rep);
        assert!(!current_user.is_admin());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_auto_create_nonexistent_user(pool: PgPool) {
        let state = create_test_state(pool.clone(), create_test_config());

        let new_email = "newrep@example.com";
        let mut parts = create_test_parts_with_header("x-dealflow-user", new_email);

        let mut pool_conn = pool.acquire().await.unwrap();
        let mut users_repo = Users::new(&mut pool_conn);
        assert!(users_repo.get_user_by_email(new_email).await.unwrap().is_none());

        let current_user = CurrentUser::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(current_user.email, new_email);
        assert_eq!(current_user.role, Role::Rep);

        let db_user = users_repo.get_user_by_email(new_email).await.unwrap().unwrap();
        assert_eq!(db_user.auth_source, "proxy-header");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_unknown_user_rejected_without_auto_create(pool: PgPool) {
        let mut config = create_test_config();
        config.auth.proxy_header.auto_create_users = false;
        let state = create_test_state(pool.clone(), config);

        let mut parts = create_test_parts_with_header("x-dealflow-user", "stranger@example.com");
        let error = CurrentUser::from_request_parts(&mut parts, &state).await.unwrap_err();
        assert_eq!(error.status_code(), axum::http::StatusCode::UNAUTHORIZED);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_missing_header_returns_unauthorized(pool: PgPool) {
        let state = create_test_state(pool.clone(), create_test_config());

        let request = axum::http::Request::builder().uri("http://localhost/test").body(()).unwrap();
        let (mut parts, _body) = request.into_parts();

        let error = CurrentUser::from_request_parts(&mut parts, &state).await.unwrap_err();
        assert_eq!(error.status_code(), axum::http::StatusCode::UNAUTHORIZED);
    }
}
