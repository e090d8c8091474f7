//! Repository implementations for database access.
//!
//! Each repository wraps a `&mut PgConnection` (a pooled connection or an open transaction) and
//! owns every query for its table. Repositories for the core CRM tables implement the
//! [`Repository`] trait; the narrower ones (mail accounts, processed emails, churn events) only
//! expose the operations their handlers need.
//!
//! ```ignore
//! use dealflow::db::handlers::{Deals, Repository};
//!
//! let mut tx = pool.begin().await?;
//! let transition = Deals::new(&mut tx).update_tracked(deal_id, &request).await?;
//! tx.commit().await?;
//! ```
//!
//! Work that spans tables (sending a draft, recording churn, ingesting an email) runs in one
//! transaction in the API handler, constructing each repository from `tx.acquire()` in turn.

pub mod activities;
pub mod churn_events;
pub mod contacts;
pub mod deals;
pub mod email_drafts;
pub mod mail_accounts;
pub mod organizations;
pub mod processed_emails;
pub mod reminders;
pub mod repository;
pub mod tags;
pub mod users;

pub use activities::Activities;
pub use churn_events::ChurnEvents;
pub use contacts::Contacts;
pub use deals::Deals;
pub use email_drafts::EmailDrafts;
pub use mail_accounts::MailAccounts;
pub use organizations::Organizations;
pub use processed_emails::ProcessedEmails;
pub use reminders::Reminders;
pub use repository::Repository;
pub use tags::Tags;
pub use users::Users;
