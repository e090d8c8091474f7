//! HTTP handlers for mail accounts, the addresses drafts are sent from.

use crate::{
    AppState,
    api::models::{
        mail::{MailAccountCreate, MailAccountResponse},
        pagination::{PaginatedResponse, Pagination},
        users::CurrentUser,
    },
    db::{handlers::MailAccounts, models::mail_accounts::MailAccountCreateDBRequest},
    errors::{Error, Result},
    types::MailAccountId,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

#[utoipa::path(
    get,
    path = "/mail-accounts",
    tag = "mail",
    summary = "List mail accounts",
    params(Pagination),
    responses(
        (status = 200, description = "Page of mail accounts", body = PaginatedResponse<MailAccountResponse>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("X-Dealflow-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_mail_accounts(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
    _user: CurrentUser,
) -> Result<Json<PaginatedResponse<MailAccountResponse>>> {
    let (skip, limit) = pagination.params();

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = MailAccounts::new(&mut conn);
    let accounts = repo.list(skip, limit).await?;
    let total_count = repo.count().await?;

    Ok(Json(PaginatedResponse::new(
        accounts.into_iter().map(MailAccountResponse::from).collect(),
        total_count,
        skip,
        limit,
    )))
}

#[utoipa::path(
    post,
    path = "/mail-accounts",
    tag = "mail",
    summary = "Add mail account",
    request_body = MailAccountCreate,
    responses(
        (status = 201, description = "Mail account created", body = MailAccountResponse),
        (status = 400, description = "Invalid email address"),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "A mail account with this email address already exists"),
    ),
    security(("X-Dealflow-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_mail_account(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(create): Json<MailAccountCreate>,
) -> Result<(StatusCode, Json<MailAccountResponse>)> {
    if create.email.parse::<lettre::Address>().is_err() {
        return Err(Error::bad_request(format!("Invalid email address '{}'", create.email)));
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let account = MailAccounts::new(&mut conn)
        .create(&MailAccountCreateDBRequest::new(current_user.id, create))
        .await?;

    Ok((StatusCode::CREATED, Json(MailAccountResponse::from(account))))
}

#[utoipa::path(
    delete,
    path = "/mail-accounts/{id}",
    tag = "mail",
    summary = "Remove mail account",
    description = "Drafts that referenced the account fall back to the default sender.",
    params(("id" = uuid::Uuid, Path, description = "Mail account ID")),
    responses(
        (status = 204, description = "Mail account deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Mail account not found"),
    ),
    security(("X-Dealflow-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_mail_account(
    State(state): State<AppState>,
    Path(id): Path<MailAccountId>,
    _user: CurrentUser,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if MailAccounts::new(&mut conn).delete(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(Error::not_found("Mail account", id))
    }
}

#[cfg(test)]
mod tests {
    use crate::api::models::{mail::MailAccountResponse, pagination::PaginatedResponse, users::Role};
    use crate::test_utils::{add_auth_headers, create_test_app, create_test_user};
    use axum::http::StatusCode;
    use serde_json::json;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_mail_account_lifecycle(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let user = create_test_user(&pool, Role::Rep).await;
        let headers = add_auth_headers(&user);

        let response = app
            .post("/api/v1/mail-accounts")
            .add_header(&headers[0].0, &headers[0].1)
            .json(&json!({ "email": "sales@example.com", "display_name": "Sales Team" }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let account: MailAccountResponse = response.json();
        assert_eq!(account.user_id, Some(user.id));

        app.post("/api/v1/mail-accounts")
            .add_header(&headers[0].0, &headers[0].1)
            .json(&json!({ "email": "SALES@example.com" }))
            .await
            .assert_status(StatusCode::CONFLICT);

        app.post("/api/v1/mail-accounts")
            .add_header(&headers[0].0, &headers[0].1)
            .json(&json!({ "email": "not-an-address" }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let page: PaginatedResponse<MailAccountResponse> = app
            .get("/api/v1/mail-accounts")
            .add_header(&headers[0].0, &headers[0].1)
            .await
            .json();
        assert_eq!(page.total_count, 1);

        app.delete(&format!("/api/v1/mail-accounts/{}", account.id))
            .add_header(&headers[0].0, &headers[0].1)
            .await
            .assert_status(StatusCode::NO_CONTENT);
        app.delete(&format!("/api/v1/mail-accounts/{}", account.id))
            .add_header(&headers[0].0, &headers[0].1)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
