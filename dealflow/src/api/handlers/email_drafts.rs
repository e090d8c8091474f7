//! HTTP handlers for outbound email drafts.
//!
//! A draft's subject and body are rendered from templates when it is created, then edited freely
//! until it is sent. Sending locks the draft row for the duration of delivery, so two concurrent
//! sends of the same draft cannot both go out.

use super::or_not_found;
use crate::{
    AppState,
    api::models::{
        mail::{EmailDraftCreate, EmailDraftResponse, EmailDraftUpdate, ListEmailDraftsQuery},
        pagination::PaginatedResponse,
        users::CurrentUser,
    },
    db::{
        handlers::{Activities, Contacts, Deals, EmailDrafts, MailAccounts, Repository, email_drafts::EmailDraftFilter},
        models::{
            activities::ActivityCreateDBRequest,
            email_drafts::{DraftStatus, EmailDraftCreateDBRequest, EmailDraftUpdateDBRequest},
        },
    },
    email::{ContactContext, DealContext, DraftContext, Sender, render_template},
    errors::{Error, Result},
    types::{EmailDraftId, MailAccountId},
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use sqlx::PgConnection;
use tracing::{info, warn};

/// The mail account's identity, or the configured default when there is none.
async fn resolve_sender(state: &AppState, conn: &mut PgConnection, account_id: Option<MailAccountId>) -> Result<Sender> {
    match account_id {
        Some(id) => {
            let account = MailAccounts::new(conn)
                .get_by_id(id)
                .await?
                .ok_or_else(|| Error::bad_request(format!("Mail account with ID {id} not found")))?;
            Ok(Sender::from(&account))
        }
        None => Ok(state.email.default_sender()),
    }
}

#[utoipa::path(
    get,
    path = "/email-drafts",
    tag = "mail",
    summary = "List email drafts",
    params(ListEmailDraftsQuery),
    responses(
        (status = 200, description = "Page of drafts, newest first", body = PaginatedResponse<EmailDraftResponse>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("X-Dealflow-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_email_drafts(
    State(state): State<AppState>,
    Query(query): Query<ListEmailDraftsQuery>,
    _user: CurrentUser,
) -> Result<Json<PaginatedResponse<EmailDraftResponse>>> {
    let (skip, limit) = query.pagination.params();
    let filter = EmailDraftFilter {
        status: query.status,
        deal_id: query.deal_id,
        contact_id: query.contact_id,
        ..EmailDraftFilter::new(skip, limit)
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = EmailDrafts::new(&mut conn);
    let drafts = repo.list(&filter).await?;
    let total_count = repo.count(&filter).await?;

    Ok(Json(PaginatedResponse::new(
        drafts.into_iter().map(EmailDraftResponse::from).collect(),
        total_count,
        skip,
        limit,
    )))
}

#[utoipa::path(
    post,
    path = "/email-drafts",
    tag = "mail",
    summary = "Create email draft",
    description = "Renders `subject` and `body` against the linked contact, deal and sender. \
                   `to_email` defaults to the contact's address.",
    request_body = EmailDraftCreate,
    responses(
        (status = 201, description = "Draft created", body = EmailDraftResponse),
        (status = 400, description = "Template error, unknown reference or no recipient"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("X-Dealflow-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_email_draft(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(create): Json<EmailDraftCreate>,
) -> Result<(StatusCode, Json<EmailDraftResponse>)> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let contact = match create.contact_id {
        Some(id) => Some(
            Contacts::new(&mut tx)
                .get_by_id(id)
                .await?
                .ok_or_else(|| Error::bad_request(format!("Contact with ID {id} not found")))?,
        ),
        None => None,
    };
    let deal = match create.deal_id {
        Some(id) => Some(
            Deals::new(&mut tx)
                .get_by_id(id)
                .await?
                .ok_or_else(|| Error::bad_request(format!("Deal with ID {id} not found")))?,
        ),
        None => None,
    };
    let sender = resolve_sender(&state, &mut tx, create.mail_account_id).await?;

    let to_email = create
        .to_email
        .filter(|to| !to.trim().is_empty())
        .or_else(|| contact.as_ref().and_then(|c| c.email.clone()))
        .ok_or_else(|| Error::bad_request("to_email is required when the contact has no email address"))?;

    let context = DraftContext {
        contact: contact.as_ref().map(ContactContext::from),
        deal: deal.as_ref().map(DealContext::from),
        sender,
    };
    let request = EmailDraftCreateDBRequest {
        subject: render_template(&create.subject, &context)?,
        body: render_template(&create.body, &context)?,
        to_email,
        deal_id: create.deal_id,
        contact_id: create.contact_id,
        mail_account_id: create.mail_account_id,
        created_by: Some(current_user.id),
    };

    let draft = EmailDrafts::new(&mut tx).create(&request).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok((StatusCode::CREATED, Json(EmailDraftResponse::from(draft))))
}

#[utoipa::path(
    get,
    path = "/email-drafts/{id}",
    tag = "mail",
    summary = "Get email draft",
    params(("id" = uuid::Uuid, Path, description = "Draft ID")),
    responses(
        (status = 200, description = "Draft", body = EmailDraftResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Draft not found"),
    ),
    security(("X-Dealflow-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_email_draft(
    State(state): State<AppState>,
    Path(id): Path<EmailDraftId>,
    _user: CurrentUser,
) -> Result<Json<EmailDraftResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let draft = EmailDrafts::new(&mut conn)
        .get_by_id(id)
        .await?
        .ok_or_else(|| Error::not_found("Email draft", id))?;

    Ok(Json(EmailDraftResponse::from(draft)))
}

#[utoipa::path(
    patch,
    path = "/email-drafts/{id}",
    tag = "mail",
    summary = "Update email draft",
    description = "Only drafts that have not been sent can be edited. Edits are stored as given, without rendering.",
    request_body = EmailDraftUpdate,
    params(("id" = uuid::Uuid, Path, description = "Draft ID")),
    responses(
        (status = 200, description = "Updated draft", body = EmailDraftResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Draft not found"),
        (status = 409, description = "Draft has already been sent"),
    ),
    security(("X-Dealflow-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_email_draft(
    State(state): State<AppState>,
    Path(id): Path<EmailDraftId>,
    _user: CurrentUser,
    Json(update): Json<EmailDraftUpdate>,
) -> Result<Json<EmailDraftResponse>> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = EmailDrafts::new(&mut tx);

    let current = repo
        .get_for_update(id)
        .await?
        .ok_or_else(|| Error::not_found("Email draft", id))?;
    if !current.status.is_editable() {
        return Err(Error::Conflict {
            message: "Draft has already been sent".to_string(),
        });
    }

    let draft = repo
        .update(id, &EmailDraftUpdateDBRequest::from(update))
        .await
        .map_err(or_not_found("Email draft", id))?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(EmailDraftResponse::from(draft)))
}

#[utoipa::path(
    delete,
    path = "/email-drafts/{id}",
    tag = "mail",
    summary = "Delete email draft",
    params(("id" = uuid::Uuid, Path, description = "Draft ID")),
    responses(
        (status = 204, description = "Draft deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Draft not found"),
    ),
    security(("X-Dealflow-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_email_draft(
    State(state): State<AppState>,
    Path(id): Path<EmailDraftId>,
    _user: CurrentUser,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if EmailDrafts::new(&mut conn).delete(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(Error::not_found("Email draft", id))
    }
}

#[utoipa::path(
    post,
    path = "/email-drafts/{id}/send",
    tag = "mail",
    summary = "Send email draft",
    description = "Delivers the draft from its mail account, or the default sender. On success an `email` \
                   activity is logged against the draft's deal and contact. A delivery failure marks the \
                   draft `failed` and stores the error.",
    params(("id" = uuid::Uuid, Path, description = "Draft ID")),
    responses(
        (status = 200, description = "Draft sent", body = EmailDraftResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Draft not found"),
        (status = 409, description = "Draft has already been sent"),
        (status = 502, description = "Mail delivery failed"),
    ),
    security(("X-Dealflow-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn send_email_draft(
    State(state): State<AppState>,
    Path(id): Path<EmailDraftId>,
    current_user: CurrentUser,
) -> Result<Json<EmailDraftResponse>> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let draft = EmailDrafts::new(&mut tx)
        .get_for_update(id)
        .await?
        .ok_or_else(|| Error::not_found("Email draft", id))?;
    if draft.status == DraftStatus::Sent {
        return Err(Error::Conflict {
            message: "Draft has already been sent".to_string(),
        });
    }

    let sender = resolve_sender(&state, &mut tx, draft.mail_account_id).await?;

    if let Err(e) = state.email.send(&sender, &draft.to_email, &draft.subject, &draft.body).await {
        warn!("Failed to send draft {}: {}", id, e);
        EmailDrafts::new(&mut tx).mark_failed(id, &e.user_message()).await?;
        tx.commit().await.map_err(|e| Error::Database(e.into()))?;
        return Err(e);
    }

    let sent = EmailDrafts::new(&mut tx).mark_sent(id).await?;
    if sent.deal_id.is_some() || sent.contact_id.is_some() {
        let activity = ActivityCreateDBRequest::email(
            sent.subject.clone(),
            Some(sent.body.clone()),
            sent.sent_at.unwrap_or_else(chrono::Utc::now),
            sent.deal_id,
            sent.contact_id,
            Some(current_user.id),
        );
        Activities::new(&mut tx).create(&activity).await?;
    }
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    info!(to = %sent.to_email, from = %sender.email, "Email draft sent");
    metrics::counter!("dealflow_email_drafts_sent_total").increment(1);

    Ok(Json(EmailDraftResponse::from(sent)))
}

#[cfg(test)]
mod tests {
    use crate::api::models::{
        activities::ActivityResponse, mail::EmailDraftResponse, pagination::PaginatedResponse, users::Role,
    };
    use crate::config::EmailTransportConfig;
    use crate::db::models::{activities::ActivityKind, email_drafts::DraftStatus};
    use crate::test_utils::{
        add_auth_headers, create_test_app, create_test_app_with_config, create_test_config, create_test_contact,
        create_test_deal, create_test_user,
    };
    use axum::http::StatusCode;
    use serde_json::json;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_renders_templates(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let user = create_test_user(&pool, Role::Rep).await;
        let headers = add_auth_headers(&user);
        let contact = create_test_contact(&pool, user.id, "Grace").await;
        let deal = create_test_deal(&pool, user.id, Some(contact.id), "Compiler licences").await;

        let response = app
            .post("/api/v1/email-drafts")
            .add_header(&headers[0].0, &headers[0].1)
            .json(&json!({
                "subject": "Re: {{ deal.title }}",
                "body": "Hi {{ contact.first_name }}, thanks! {{ sender.name }}",
                "contact_id": contact.id,
                "deal_id": deal.id,
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let draft: EmailDraftResponse = response.json();
        assert_eq!(draft.subject, "Re: Compiler licences");
        assert_eq!(draft.body, "Hi Grace, thanks! Dealflow Test");
        assert_eq!(draft.to_email, contact.email.clone().unwrap());
        assert_eq!(draft.status, DraftStatus::Draft);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_validation(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let user = create_test_user(&pool, Role::Rep).await;
        let headers = add_auth_headers(&user);

        // No contact and no explicit recipient
        app.post("/api/v1/email-drafts")
            .add_header(&headers[0].0, &headers[0].1)
            .json(&json!({ "subject": "Hello", "body": "..." }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        app.post("/api/v1/email-drafts")
            .add_header(&headers[0].0, &headers[0].1)
            .json(&json!({ "subject": "{% if %}", "body": "...", "to_email": "x@example.com" }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        app.post("/api/v1/email-drafts")
            .add_header(&headers[0].0, &headers[0].1)
            .json(&json!({ "subject": "Hi", "body": "...", "contact_id": uuid::Uuid::new_v4() }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_send_logs_activity_and_locks_draft(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let user = create_test_user(&pool, Role::Rep).await;
        let headers = add_auth_headers(&user);
        let contact = create_test_contact(&pool, user.id, "Ada").await;

        let draft: EmailDraftResponse = app
            .post("/api/v1/email-drafts")
            .add_header(&headers[0].0, &headers[0].1)
            .json(&json!({ "subject": "Proposal", "body": "Attached.", "contact_id": contact.id }))
            .await
            .json();

        let response = app
            .post(&format!("/api/v1/email-drafts/{}/send", draft.id))
            .add_header(&headers[0].0, &headers[0].1)
            .await;
        response.assert_status(StatusCode::OK);
        let sent: EmailDraftResponse = response.json();
        assert_eq!(sent.status, DraftStatus::Sent);
        assert!(sent.sent_at.is_some());

        let activities: PaginatedResponse<ActivityResponse> = app
            .get(&format!("/api/v1/activities?contact_id={}", contact.id))
            .add_header(&headers[0].0, &headers[0].1)
            .await
            .json();
        assert_eq!(activities.total_count, 1);
        assert_eq!(activities.data[0].kind, ActivityKind::Email);
        assert_eq!(activities.data[0].subject, "Proposal");

        app.post(&format!("/api/v1/email-drafts/{}/send", draft.id))
            .add_header(&headers[0].0, &headers[0].1)
            .await
            .assert_status(StatusCode::CONFLICT);
        app.patch(&format!("/api/v1/email-drafts/{}", draft.id))
            .add_header(&headers[0].0, &headers[0].1)
            .json(&json!({ "subject": "Too late" }))
            .await
            .assert_status(StatusCode::CONFLICT);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_delivery_failure_marks_draft_failed(pool: PgPool) {
        // A regular file where the outbox directory should be makes every delivery fail
        let outbox = tempfile::NamedTempFile::new().unwrap();
        let mut config = create_test_config();
        config.email.transport = EmailTransportConfig::File {
            path: outbox.path().to_string_lossy().to_string(),
        };
        let app = create_test_app_with_config(pool.clone(), config).await;
        let user = create_test_user(&pool, Role::Rep).await;
        let headers = add_auth_headers(&user);

        let draft: EmailDraftResponse = app
            .post("/api/v1/email-drafts")
            .add_header(&headers[0].0, &headers[0].1)
            .json(&json!({ "subject": "Hello", "body": "Hi", "to_email": "buyer@example.com" }))
            .await
            .json();

        app.post(&format!("/api/v1/email-drafts/{}/send", draft.id))
            .add_header(&headers[0].0, &headers[0].1)
            .await
            .assert_status(StatusCode::BAD_GATEWAY);

        let failed: EmailDraftResponse = app
            .get(&format!("/api/v1/email-drafts/{}", draft.id))
            .add_header(&headers[0].0, &headers[0].1)
            .await
            .json();
        assert_eq!(failed.status, DraftStatus::Failed);
        assert!(failed.error.is_some());

        // Failed drafts stay editable
        app.patch(&format!("/api/v1/email-drafts/{}", draft.id))
            .add_header(&headers[0].0, &headers[0].1)
            .json(&json!({ "to_email": "buyer2@example.com" }))
            .await
            .assert_status(StatusCode::OK);

        let page: PaginatedResponse<EmailDraftResponse> = app
            .get("/api/v1/email-drafts?status=failed")
            .add_header(&headers[0].0, &headers[0].1)
            .await
            .json();
        assert_eq!(page.total_count, 1);
    }
}
