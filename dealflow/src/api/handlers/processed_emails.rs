//! HTTP handlers for ingesting inbound email summaries.

use crate::{
    AppState,
    api::models::{
        mail::{ListProcessedEmailsQuery, ProcessedEmailCreate, ProcessedEmailResponse},
        pagination::PaginatedResponse,
        users::CurrentUser,
    },
    db::{
        errors::DbError,
        handlers::{Activities, Contacts, ProcessedEmails, Repository},
        models::{activities::ActivityCreateDBRequest, processed_emails::ProcessedEmailCreateDBRequest},
    },
    errors::{Error, Result},
};
use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use tracing::{debug, info};

#[utoipa::path(
    get,
    path = "/processed-emails",
    tag = "mail",
    summary = "List processed emails",
    params(ListProcessedEmailsQuery),
    responses(
        (status = 200, description = "Page of ingested messages, most recently received first", body = PaginatedResponse<ProcessedEmailResponse>),
        (status = 401, description = "Unauthorized"),
    ),
    security(("X-Dealflow-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_processed_emails(
    State(state): State<AppState>,
    Query(query): Query<ListProcessedEmailsQuery>,
    _user: CurrentUser,
) -> Result<Json<PaginatedResponse<ProcessedEmailResponse>>> {
    let (skip, limit) = query.pagination.params();

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = ProcessedEmails::new(&mut conn);
    let emails = repo.list(query.contact_id, skip, limit).await?;
    let total_count = repo.count(query.contact_id).await?;

    Ok(Json(PaginatedResponse::new(
        emails.into_iter().map(ProcessedEmailResponse::from).collect(),
        total_count,
        skip,
        limit,
    )))
}

#[utoipa::path(
    post,
    path = "/processed-emails",
    tag = "mail",
    summary = "Ingest inbound email",
    description = "Idempotent on `message_id`: a message that was already ingested is returned with 200. \
                   When the sender's address matches a contact, an `email` activity is logged for them.",
    request_body = ProcessedEmailCreate,
    responses(
        (status = 201, description = "Message ingested", body = ProcessedEmailResponse),
        (status = 200, description = "Message was already ingested", body = ProcessedEmailResponse),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("X-Dealflow-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn ingest_processed_email(
    State(state): State<AppState>,
    _user: CurrentUser,
    Json(create): Json<ProcessedEmailCreate>,
) -> Result<(StatusCode, Json<ProcessedEmailResponse>)> {
    if create.message_id.trim().is_empty() {
        return Err(Error::bad_request("message_id must not be empty"));
    }

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    if let Some(existing) = ProcessedEmails::new(&mut tx).get_by_message_id(&create.message_id).await? {
        debug!("Message {} already ingested", create.message_id);
        return Ok((StatusCode::OK, Json(ProcessedEmailResponse::from(existing))));
    }

    let contact = Contacts::new(&mut tx).get_by_email(create.from_email.trim()).await?;
    let activity = match &contact {
        Some(contact) => {
            let request = ActivityCreateDBRequest::email(
                create.subject.clone().unwrap_or_else(|| "(no subject)".to_string()),
                None,
                create.received_at,
                None,
                Some(contact.id),
                None,
            );
            Some(Activities::new(&mut tx).create(&request).await?)
        }
        None => None,
    };

    let request = ProcessedEmailCreateDBRequest {
        message_id: create.message_id.clone(),
        from_email: create.from_email,
        subject: create.subject,
        received_at: create.received_at,
        mail_account_id: create.mail_account_id,
        contact_id: contact.as_ref().map(|c| c.id),
        activity_id: activity.as_ref().map(|a| a.id),
    };

    match ProcessedEmails::new(&mut tx).create(&request).await {
        Ok(email) => {
            tx.commit().await.map_err(|e| Error::Database(e.into()))?;
            info!(matched = email.contact_id.is_some(), "Ingested inbound email");
            Ok((StatusCode::CREATED, Json(ProcessedEmailResponse::from(email))))
        }
        // A concurrent ingest of the same message won the insert
        Err(DbError::UniqueViolation { .. }) => {
            tx.rollback().await.map_err(|e| Error::Database(e.into()))?;
            let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
            let existing = ProcessedEmails::new(&mut conn)
                .get_by_message_id(&request.message_id)
                .await?
                .ok_or_else(|| Error::Internal {
                    operation: format!("load processed email {}", request.message_id),
                })?;
            Ok((StatusCode::OK, Json(ProcessedEmailResponse::from(existing))))
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use crate::api::models::{
        activities::ActivityResponse, mail::ProcessedEmailResponse, pagination::PaginatedResponse, users::Role,
    };
    use crate::test_utils::{add_auth_headers, create_test_app, create_test_contact, create_test_user};
    use axum::http::StatusCode;
    use serde_json::json;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_ingest_matches_contact_and_is_idempotent(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let user = create_test_user(&pool, Role::Rep).await;
        let headers = add_auth_headers(&user);
        let contact = create_test_contact(&pool, user.id, "Margaret").await;
        let from = contact.email.clone().unwrap().to_uppercase();

        let body = json!({
            "message_id": "<abc123@mail.example.com>",
            "from_email": from,
            "subject": "Question about pricing",
            "received_at": "2026-02-01T09:30:00Z",
        });

        let response = app
            .post("/api/v1/processed-emails")
            .add_header(&headers[0].0, &headers[0].1)
            .json(&body)
            .await;
        response.assert_status(StatusCode::CREATED);
        let first: ProcessedEmailResponse = response.json();
        assert_eq!(first.contact_id, Some(contact.id));
        assert!(first.activity_id.is_some());

        let response = app
            .post("/api/v1/processed-emails")
            .add_header(&headers[0].0, &headers[0].1)
            .json(&body)
            .await;
        response.assert_status(StatusCode::OK);
        let second: ProcessedEmailResponse = response.json();
        assert_eq!(second.id, first.id);

        let activities: PaginatedResponse<ActivityResponse> = app
            .get(&format!("/api/v1/activities?contact_id={}", contact.id))
            .add_header(&headers[0].0, &headers[0].1)
            .await
            .json();
        assert_eq!(activities.total_count, 1);
        assert_eq!(activities.data[0].subject, "Question about pricing");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_unknown_sender_is_stored_unmatched(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let user = create_test_user(&pool, Role::Rep).await;
        let headers = add_auth_headers(&user);

        let response = app
            .post("/api/v1/processed-emails")
            .add_header(&headers[0].0, &headers[0].1)
            .json(&json!({
                "message_id": "<cold@elsewhere.example>",
                "from_email": "stranger@elsewhere.example",
                "received_at": "2026-02-01T09:30:00Z",
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let email: ProcessedEmailResponse = response.json();
        assert!(email.contact_id.is_none());
        assert!(email.activity_id.is_none());

        let page: PaginatedResponse<ProcessedEmailResponse> = app
            .get("/api/v1/processed-emails")
            .add_header(&headers[0].0, &headers[0].1)
            .await
            .json();
        assert_eq!(page.total_count, 1);
    }
}
