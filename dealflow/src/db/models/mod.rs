//! Database record models matching table schemas.
//!
//! Each module holds the `*CreateDBRequest` / `*UpdateDBRequest` inputs and the `*DBResponse`
//! row type for one table. Row types derive `sqlx::FromRow`; enumerations stored as `TEXT`
//! derive `sqlx::Type`.
//!
//! Database models are distinct from the API models in [`crate::api::models`] so storage and
//! wire representations can evolve independently. API request types convert into the database
//! requests here, and database responses convert into API responses there.
//!
//! - [`users`]: accounts created from the proxy header
//! - [`contacts`], [`deals`], [`activities`], [`reminders`], [`tags`]: the sales CRM
//! - [`mail_accounts`], [`email_drafts`], [`processed_emails`]: outbound and inbound mail
//! - [`organizations`]: paying customers and churn events

pub mod activities;
pub mod contacts;
pub mod deals;
pub mod email_drafts;
pub mod mail_accounts;
pub mod organizations;
pub mod processed_emails;
pub mod reminders;
pub mod tags;
pub mod users;
