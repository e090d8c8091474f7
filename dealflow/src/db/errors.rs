//! Classified database errors.
//!
//! Repositories return [`DbError`] so handlers can tell caller mistakes (a missing row, a
//! duplicate email, a dangling contact id) apart from infrastructure failures.

use sqlx::{error::ErrorKind, postgres::PgDatabaseError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    /// No row matched
    #[error("Row not found")]
    NotFound,

    /// A unique index rejected the write, e.g. a second tag with the same name
    #[error("Duplicate value rejected by {}", constraint.as_deref().unwrap_or("a unique index"))]
    UniqueViolation {
        constraint: Option<String>,
        table: Option<String>,
        message: String,
        /// Parsed from the Postgres detail line when present
        conflicting_value: Option<String>,
    },

    /// The row points at a contact, deal, user or account that does not exist
    #[error("Dangling reference rejected by {}", constraint.as_deref().unwrap_or("a foreign key"))]
    ForeignKeyViolation {
        constraint: Option<String>,
        table: Option<String>,
        message: String,
    },

    /// A CHECK rejected the row: enum text, probability range, stage and closed_at pairing
    #[error("Value rejected by {}", constraint.as_deref().unwrap_or("a check constraint"))]
    CheckViolation {
        constraint: Option<String>,
        table: Option<String>,
        message: String,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        let db_err = match &err {
            sqlx::Error::RowNotFound => return DbError::NotFound,
            sqlx::Error::Database(db_err) => db_err,
            _ => return DbError::Other(err.into()),
        };

        let constraint = db_err.constraint().map(str::to_owned);
        let table = db_err.table().map(str::to_owned);
        let message = db_err.message().to_owned();

        match db_err.kind() {
            ErrorKind::UniqueViolation => {
                let conflicting_value = db_err
                    .try_downcast_ref::<PgDatabaseError>()
                    .and_then(PgDatabaseError::detail)
                    .and_then(extract_conflicting_value);
                DbError::UniqueViolation {
                    constraint,
                    table,
                    message,
                    conflicting_value,
                }
            }
            ErrorKind::ForeignKeyViolation => DbError::ForeignKeyViolation {
                constraint,
                table,
                message,
            },
            ErrorKind::CheckViolation => DbError::CheckViolation {
                constraint,
                table,
                message,
            },
            _ => DbError::Other(err.into()),
        }
    }
}

/// Extract the conflicting value from a PostgreSQL unique violation detail.
///
/// Details look like `Key (lower(email))=(jane@example.com) already exists.`
fn extract_conflicting_value(detail: &str) -> Option<String> {
    let start = detail.find(")=(")? + 3;
    let end = detail[start..].rfind(')')?;
    Some(detail[start..start + end].to_string())
}

pub type Result<T> = std::result::Result<T, DbError>;
