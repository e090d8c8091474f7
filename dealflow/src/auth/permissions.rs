//! Role checks.

use crate::{
    AppState,
    api::models::users::CurrentUser,
    errors::{Error, Result},
    types::{Operation, Resource},
};
use axum::{
    extract::FromRequestParts,
    http::{Method, request::Parts},
};

/// Fail with 403 unless the user is an admin
pub fn require_admin(user: &CurrentUser, action: Operation, resource: Resource) -> Result<()> {
    if user.is_admin() {
        Ok(())
    } else {
        Err(Error::InsufficientPermissions { action, resource })
    }
}

/// Extractor for admin-only routes.
///
/// Authenticates like [`CurrentUser`], then rejects non-admins with 403. The operation and
/// resource named in the error are derived from the request method and path.
#[derive(Debug, Clone)]
pub struct RequiresAdmin(pub CurrentUser);

fn operation_for(method: &Method) -> Operation {
    match *method {
        Method::POST => Operation::Create,
        Method::PATCH | Method::PUT => Operation::Update,
        Method::DELETE => Operation::Delete,
        _ => Operation::Read,
    }
}

fn resource_for(path: &str) -> Resource {
    if path.contains("/insights") {
        Resource::Insights
    } else if path.contains("/churn") {
        Resource::ChurnEvents
    } else if path.contains("/organizations") {
        Resource::Organizations
    } else {
        Resource::Users
    }
}

impl FromRequestParts<AppState> for RequiresAdmin {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let user = CurrentUser::from_request_parts(parts, state).await?;
        require_admin(&user, operation_for(&parts.method), resource_for(parts.uri.path()))?;
        Ok(RequiresAdmin(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::users::Role;
    use axum::http::StatusCode;

    fn user(role: Role) -> CurrentUser {
        CurrentUser {
            id: uuid::Uuid::new_v4(),
            email: "someone@example.com".to_string(),
            display_name: None,
            role,
        }
    }

    #[test]
    fn test_require_admin() {
        assert!(require_admin(&user(Role::Admin), Operation::Read, Resource::Users).is_ok());

        let error = require_admin(&user(Role::Rep), Operation::Update, Resource::Users).unwrap_err();
        assert_eq!(error.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(error.user_message(), "Insufficient permissions to update users");
    }

    #[test]
    fn test_operation_and_resource_from_request() {
        assert_eq!(operation_for(&Method::GET), Operation::Read);
        assert_eq!(operation_for(&Method::POST), Operation::Create);
        assert_eq!(operation_for(&Method::PATCH), Operation::Update);
        assert_eq!(operation_for(&Method::DELETE), Operation::Delete);

        assert_eq!(resource_for("/admin/insights/renewals"), Resource::Insights);
        assert_eq!(resource_for("/admin/organizations/abc/churn"), Resource::ChurnEvents);
        assert_eq!(resource_for("/admin/churn-events"), Resource::ChurnEvents);
        assert_eq!(resource_for("/admin/organizations"), Resource::Organizations);
        assert_eq!(resource_for("/users"), Resource::Users);
    }
}
