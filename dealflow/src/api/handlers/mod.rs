//! HTTP request handlers for all API endpoints.
//!
//! Handlers are grouped by resource. Each one authenticates through an extractor
//! ([`CurrentUser`](crate::api::models::users::CurrentUser) or
//! [`RequiresAdmin`](crate::auth::permissions::RequiresAdmin)), validates its input, talks to the
//! database through the repositories in [`crate::db::handlers`] and converts the result into an
//! API model. Work that touches several tables runs inside one transaction.
//!
//! - [`users`]: the current user and admin user management
//! - [`contacts`], [`deals`], [`activities`], [`reminders`], [`tags`]: the CRM
//! - [`mail_accounts`], [`email_drafts`], [`processed_emails`]: outbound and inbound mail
//! - [`organizations`], [`insights`]: the admin view of paying customers
//! - [`config`]: client metadata
//!
//! Errors are returned as [`crate::errors::Error`], which maps to a status code and a user-safe
//! message.

pub mod activities;
pub mod config;
pub mod contacts;
pub mod deals;
pub mod email_drafts;
pub mod insights;
pub mod mail_accounts;
pub mod organizations;
pub mod processed_emails;
pub mod reminders;
pub mod tags;
pub mod users;

use crate::db::errors::DbError;
use crate::errors::{Error, Result};
use uuid::Uuid;

/// Map a repository `NotFound` to a 404 naming the resource and ID
pub(crate) fn or_not_found(resource: &'static str, id: Uuid) -> impl FnOnce(DbError) -> Error {
    move |e| match e {
        DbError::NotFound => Error::not_found(resource, id),
        other => Error::Database(other),
    }
}

/// Split a comma-separated `include` parameter, rejecting names outside `allowed`.
pub(crate) fn parse_includes<'a>(include: Option<&'a str>, allowed: &[&str]) -> Result<Vec<&'a str>> {
    let includes: Vec<&str> = include
        .unwrap_or("")
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();

    if let Some(unknown) = includes.iter().find(|name| !allowed.contains(name)) {
        return Err(Error::bad_request(format!(
            "Unknown include '{unknown}', expected one of: {}",
            allowed.join(", ")
        )));
    }
    Ok(includes)
}

#[cfg(test)]
mod tests {
    use super::parse_includes;

    #[test]
    fn test_parse_includes() {
        assert!(parse_includes(None, &["tags"]).unwrap().is_empty());
        assert_eq!(parse_includes(Some("tags, deals,"), &["tags", "deals"]).unwrap(), vec!["tags", "deals"]);
        assert!(parse_includes(Some("tags,owners"), &["tags"]).is_err());
    }
}
