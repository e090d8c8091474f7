//! HTTP handlers for contacts and their tags.

use super::{or_not_found, parse_includes};
use crate::{
    AppState,
    api::models::{
        activities::ActivityResponse,
        contacts::{ContactCreate, ContactResponse, ContactUpdate, GetContactQuery, ListContactsQuery},
        deals::DealResponse,
        pagination::{MAX_LIMIT, PaginatedResponse},
        tags::TagResponse,
        users::CurrentUser,
    },
    db::{
        handlers::{
            Activities, Contacts, Deals, Repository, Tags, activities::ActivityFilter, contacts::ContactFilter,
        },
        models::contacts::{ContactCreateDBRequest, ContactUpdateDBRequest},
    },
    errors::{Error, Result},
    types::{ContactId, TagId},
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use tracing::debug;

fn validate_email(email: Option<&str>) -> Result<()> {
    match email {
        Some(email) if !email.contains('@') => Err(Error::bad_request(format!("Invalid email address '{email}'"))),
        _ => Ok(()),
    }
}

#[utoipa::path(
    get,
    path = "/contacts",
    tag = "contacts",
    summary = "List contacts",
    params(ListContactsQuery),
    responses(
        (status = 200, description = "Page of contacts", body = PaginatedResponse<ContactResponse>),
        (status = 400, description = "Unknown include"),
        (status = 401, description = "Unauthorized"),
    ),
    security(("X-Dealflow-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_contacts(
    State(state): State<AppState>,
    Query(query): Query<ListContactsQuery>,
    _user: CurrentUser,
) -> Result<Json<PaginatedResponse<ContactResponse>>> {
    let includes = parse_includes(query.include.as_deref(), &["tags"])?;
    let (skip, limit) = query.pagination.params();
    let filter = ContactFilter {
        search: query.search,
        tag_id: query.tag,
        owner_id: query.owner_id,
        ..ContactFilter::new(skip, limit)
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let contacts;
    let total_count;
    {
        let mut repo = Contacts::new(&mut conn);
        contacts = repo.list(&filter).await?;
        total_count = repo.count(&filter).await?;
    }

    let mut tags_by_contact = if includes.contains(&"tags") {
        let ids: Vec<ContactId> = contacts.iter().map(|c| c.id).collect();
        Some(Tags::new(&mut conn).list_for_contacts(&ids).await?)
    } else {
        None
    };

    let data = contacts
        .into_iter()
        .map(|contact| {
            let tags = tags_by_contact.as_mut().map(|map| map.remove(&contact.id).unwrap_or_default());
            let response = ContactResponse::from(contact);
            match tags {
                Some(tags) => response.with_tags(tags.into_iter().map(TagResponse::from).collect()),
                None => response,
            }
        })
        .collect();

    Ok(Json(PaginatedResponse::new(data, total_count, skip, limit)))
}

#[utoipa::path(
    post,
    path = "/contacts",
    tag = "contacts",
    summary = "Create contact",
    request_body = ContactCreate,
    responses(
        (status = 201, description = "Contact created", body = ContactResponse),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "A contact with this email already exists"),
    ),
    security(("X-Dealflow-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_contact(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(create): Json<ContactCreate>,
) -> Result<(StatusCode, Json<ContactResponse>)> {
    if create.first_name.trim().is_empty() {
        return Err(Error::bad_request("first_name must not be empty"));
    }
    validate_email(create.email.as_deref())?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let contact = Contacts::new(&mut conn)
        .create(&ContactCreateDBRequest::new(current_user.id, create))
        .await?;

    Ok((StatusCode::CREATED, Json(ContactResponse::from(contact))))
}

#[utoipa::path(
    get,
    path = "/contacts/{id}",
    tag = "contacts",
    summary = "Get contact",
    params(("id" = uuid::Uuid, Path, description = "Contact ID"), GetContactQuery),
    responses(
        (status = 200, description = "Contact details", body = ContactResponse),
        (status = 400, description = "Unknown include"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Contact not found"),
    ),
    security(("X-Dealflow-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_contact(
    State(state): State<AppState>,
    Path(id): Path<ContactId>,
    Query(query): Query<GetContactQuery>,
    _user: CurrentUser,
) -> Result<Json<ContactResponse>> {
    let includes = parse_includes(query.include.as_deref(), &["tags", "deals", "activities"])?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let contact = Contacts::new(&mut tx)
        .get_by_id(id)
        .await?
        .ok_or_else(|| Error::not_found("Contact", id))?;
    let mut response = ContactResponse::from(contact);

    if includes.contains(&"tags") {
        let mut tags = Tags::new(&mut tx).list_for_contacts(&[id]).await?;
        response = response.with_tags(tags.remove(&id).unwrap_or_default().into_iter().map(TagResponse::from).collect());
    }
    if includes.contains(&"deals") {
        let mut deals = Deals::new(&mut tx).list_for_contacts(&[id]).await?;
        response = response.with_deals(deals.remove(&id).unwrap_or_default().into_iter().map(DealResponse::from).collect());
    }
    if includes.contains(&"activities") {
        let filter = ActivityFilter {
            contact_id: Some(id),
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
    path = "/contacts/{id}",
    tag = "contacts",
    summary = "Update contact",
    request_body = ContactUpdate,
    params(("id" = uuid::Uuid, Path, description = "Contact ID")),
    responses(
        (status = 200, description = "Updated contact", body = ContactResponse),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Contact not found"),
        (status = 409, description = "A contact with this email already exists"),
    ),
    security(("X-Dealflow-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_contact(
    State(state): State<AppState>,
    Path(id): Path<ContactId>,
    _user: CurrentUser,
    Json(update): Json<ContactUpdate>,
) -> Result<Json<ContactResponse>> {
    if update.first_name.as_deref().is_some_and(|name| name.trim().is_empty()) {
        return Err(Error::bad_request("first_name must not be empty"));
    }
    validate_email(update.email.as_deref())?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let contact = Contacts::new(&mut conn)
        .update(id, &ContactUpdateDBRequest::from(update))
        .await
        .map_err(or_not_found("Contact", id))?;

    Ok(Json(ContactResponse::from(contact)))
}

#[utoipa::path(
    delete,
    path = "/contacts/{id}",
    tag = "contacts",
    summary = "Delete contact",
    description = "Deals and drafts linked to the contact are kept; its activities and reminders are deleted.",
    params(("id" = uuid::Uuid, Path, description = "Contact ID")),
    responses(
        (status = 204, description = "Contact deleted"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Contact not found"),
    ),
    security(("X-Dealflow-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_contact(State(state): State<AppState>, Path(id): Path<ContactId>, _user: CurrentUser) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if Contacts::new(&mut conn).delete(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(Error::not_found("Contact", id))
    }
}

#[utoipa::path(
    post,
    path = "/contacts/{id}/tags/{tag_id}",
    tag = "contacts",
    summary = "Tag contact",
    params(
        ("id" = uuid::Uuid, Path, description = "Contact ID"),
        ("tag_id" = uuid::Uuid, Path, description = "Tag ID"),
    ),
    responses(
        (status = 204, description = "Tag attached"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Contact or tag not found"),
    ),
    security(("X-Dealflow-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn add_contact_tag(
    State(state): State<AppState>,
    Path((id, tag_id)): Path<(ContactId, TagId)>,
    _user: CurrentUser,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Contacts::new(&mut conn);
    if repo.get_by_id(id).await?.is_none() {
        return Err(Error::not_found("Contact", id));
    }
    repo.add_tag(id, tag_id).await.map_err(or_not_found("Tag", tag_id))?;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/contacts/{id}/tags/{tag_id}",
    tag = "contacts",
    summary = "Untag contact",
    params(
        ("id" = uuid::Uuid, Path, description = "Contact ID"),
        ("tag_id" = uuid::Uuid, Path, description = "Tag ID"),
    ),
    responses(
        (status = 204, description = "Tag detached"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Contact not found"),
    ),
    security(("X-Dealflow-User" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn remove_contact_tag(
    State(state): State<AppState>,
    Path((id, tag_id)): Path<(ContactId, TagId)>,
    _user: CurrentUser,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Contacts::new(&mut conn);
    if repo.get_by_id(id).await?.is_none() {
        return Err(Error::not_found("Contact", id));
    }
    if !repo.remove_tag(id, tag_id).await? {
        debug!("Contact {} did not carry tag {}", id, tag_id);
    }

    Ok(StatusCode::NO_CONTENT)
}
