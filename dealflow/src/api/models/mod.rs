//! API request and response data models.
//!
//! Request types (`*Create`, `*Update`, `List*Query`) are deserialized from JSON bodies and query
//! strings; response types (`*Response`) are built from the database records in
//! [`crate::db::models`]. Every model derives [`utoipa::ToSchema`] so it appears in the OpenAPI
//! document, and list queries flatten the shared [`pagination::Pagination`] parameters.

pub mod activities;
pub mod config;
pub mod contacts;
pub mod deals;
pub mod mail;
pub mod organizations;
pub mod pagination;
pub mod reminders;
pub mod tags;
pub mod users;
