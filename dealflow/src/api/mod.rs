//! HTTP layer: route handlers and their request/response types.
//!
//! - **[`handlers`]**: Axum route handlers, one module per resource
//! - **[`models`]**: Request and response bodies, query strings
//!
//! Everything is mounted under `/api/v1`:
//!
//! - `/users` - the current user; listing and role changes for admins
//! - `/contacts`, `/deals`, `/activities`, `/reminders`, `/tags` - the CRM records
//! - `/mail-accounts`, `/email-drafts`, `/processed-emails` - outbound and inbound mail
//! - `/admin/*` - customer organizations, churn, and portfolio insights (admin only)
//! - `/config` - client metadata
//!
//! The OpenAPI document is served at `/docs`.

pub mod handlers;
pub mod models;
