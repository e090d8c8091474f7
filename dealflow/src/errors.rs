use crate::db::errors::DbError;
use crate::types::{Operation, Resource};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Authentication required but not provided
    #[error("Not authenticated")]
    Unauthenticated { message: Option<String> },

    /// User lacks the role required for the operation
    #[error("Insufficient permissions to {action} {resource}")]
    InsufficientPermissions { action: Operation, resource: Resource },

    /// Invalid request data or business rule violation
    #[error("{message}")]
    BadRequest { message: String },

    /// Requested resource not found
    #[error("{resource} with ID {id} not found")]
    NotFound { resource: String, id: String },

    /// The request conflicts with the current state of the resource
    #[error("Conflict: {message}")]
    Conflict { message: String },

    /// A downstream service (mail transport) rejected the request
    #[error("Upstream failure: {message}")]
    Upstream { message: String },

    /// An internal step failed; only the operation name reaches the client
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Database operation error
    #[error(transparent)]
    Database(#[from] DbError),

    /// Anything else, with its context chain kept for the logs
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn not_found(resource: &str, id: impl ToString) -> Self {
        Error::NotFound {
            resource: resource.to_string(),
            id: id.to_string(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Error::BadRequest { message: message.into() }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            Error::InsufficientPermissions { .. } => StatusCode::FORBIDDEN,
            Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Conflict { .. } => StatusCode::CONFLICT,
            Error::Upstream { .. } => StatusCode::BAD_GATEWAY,
            Error::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Database(db_err) => match db_err {
                DbError::NotFound => StatusCode::NOT_FOUND,
                DbError::UniqueViolation { .. } => StatusCode::CONFLICT,
                DbError::ForeignKeyViolation { .. } => StatusCode::BAD_REQUEST,
                DbError::CheckViolation { .. } => StatusCode::BAD_REQUEST,
                DbError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show the caller. Database and internal detail stays in the logs.
    pub fn user_message(&self) -> String {
        match self {
            Error::Unauthenticated { message } => message.clone().unwrap_or_else(|| "Authentication required".to_string()),
            Error::InsufficientPermissions { action, resource } => {
                format!("Insufficient permissions to {action} {resource}")
            }
            Error::BadRequest { message } => message.clone(),
            Error::NotFound { resource, id } => format!("{resource} with ID {id} not found"),
            Error::Conflict { message } => message.clone(),
            Error::Upstream { message } => format!("Email delivery failed: {message}"),
            Error::Internal { .. } => "Internal server error".to_string(),
            Error::Database(db_err) => match db_err {
                DbError::NotFound => "Resource not found".to_string(),
                DbError::UniqueViolation { table, .. } => unique_violation_details(table.as_deref()).0,
                DbError::ForeignKeyViolation { .. } => "Invalid reference to related resource".to_string(),
                DbError::CheckViolation { .. } => "Invalid data provided".to_string(),
                DbError::Other(_) => "Database error occurred".to_string(),
            },
            Error::Other(_) => "Internal server error".to_string(),
        }
    }
}

/// Friendly message and resource name for a unique violation on the given table
fn unique_violation_details(table: Option<&str>) -> (String, &'static str) {
    match table {
        Some("users") => ("A user with this email address already exists".to_string(), "user"),
        Some("contacts") => ("A contact with this email address already exists".to_string(), "contact"),
        Some("tags") => ("A tag with this name already exists".to_string(), "tag"),
        Some("mail_accounts") => ("A mail account with this email address already exists".to_string(), "mail_account"),
        Some("processed_emails") => ("This email has already been processed".to_string(), "processed_email"),
        _ => ("Resource already exists".to_string(), "unknown"),
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Server faults at error, client mistakes at debug
        match &self {
            Error::Database(DbError::Other(_)) | Error::Internal { .. } | Error::Other(_) => {
                tracing::error!(error = format!("{self:#}"), "Request failed with an internal error");
            }
            Error::Upstream { .. } => {
                tracing::error!(error = %self, "Mail transport rejected the request");
            }
            Error::Database(_) => {
                tracing::warn!(error = %self, "Write rejected by a database constraint");
            }
            Error::Unauthenticated { .. } | Error::InsufficientPermissions { .. } => {
                tracing::info!(error = %self, "Request denied");
            }
            Error::Conflict { .. } => {
                tracing::warn!(error = %self, "Request conflicts with stored state");
            }
            Error::BadRequest { .. } | Error::NotFound { .. } => {
                tracing::debug!(error = %self, "Rejected client request");
            }
        }

        let status = self.status_code();

        match &self {
            // Unique violations get a minimal structured body so clients can tell which resource clashed
            Error::Database(DbError::UniqueViolation {
                table, conflicting_value, ..
            }) => {
                let (message, resource) = unique_violation_details(table.as_deref());
                let body = json!({
                    "message": message,
                    "resource": resource,
                    "value": conflicting_value,
                });
                (status, axum::response::Json(body)).into_response()
            }
            _ => (status, self.user_message()).into_response(),
        }
    }
}

/// Convert from String errors (e.g., from external functions)
impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Internal { operation: msg }
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(Error::not_found("Deal", "abc").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(Error::bad_request("nope").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            Error::Conflict {
                message: "already sent".to_string()
            }
            .status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            Error::Upstream {
                message: "smtp down".to_string()
            }
            .status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            Error::Database(DbError::ForeignKeyViolation {
                constraint: None,
                table: Some("deals".to_string()),
                message: String::new(),
            })
            .status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_user_messages_do_not_leak_internals() {
        let err = Error::Other(anyhow::anyhow!("connection refused at 10.0.0.3:5432"));
        assert_eq!(err.user_message(), "Internal server error");

        let err = Error::not_found("Contact", "1234");
        assert_eq!(err.user_message(), "Contact with ID 1234 not found");

        let err = Error::Database(DbError::UniqueViolation {
            constraint: Some("tags_name_unique".to_string()),
            table: Some("tags".to_string()),
            message: String::new(),
            conflicting_value: Some("vip".to_string()),
        });
        assert_eq!(err.user_message(), "A tag with this name already exists");
    }

    #[test]
    fn test_insufficient_permissions_message() {
        let err = Error::InsufficientPermissions {
            action: Operation::Read,
            resource: Resource::Insights,
        };
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(err.user_message(), "Insufficient permissions to read insights");
    }
}
