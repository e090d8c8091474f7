//! Database layer for data persistence and access.
//!
//! Data access uses SQLx against PostgreSQL with hand-written queries. Every table has a
//! repository in [`handlers`] that owns its SQL; [`models`] holds the row types and the
//! request structs repositories accept.
//!
//! ```text
//! API handlers ──> db::handlers (repositories) ──> db::models ──> PostgreSQL
//! ```
//!
//! # Modules
//!
//! - [`handlers`]: Repository implementations
//! - [`models`]: Database record structures matching table schemas
//! - [`errors`]: [`errors::DbError`], the classified `sqlx::Error`
//! - [`embedded`]: Embedded PostgreSQL support (`embedded-db` feature)
//!
//! # Transactions
//!
//! Reads can run on a plain pool connection. Anything that writes more than one row, or reads a
//! row and then writes based on what it saw, runs in a transaction:
//!
//! ```ignore
//! let mut tx = pool.begin().await?;
//! let org = Organizations::new(&mut tx).get_for_update(id).await?;
//! // ... decide, then write through other repositories on the same transaction ...
//! tx.commit().await?;
//! ```
//!
//! # Migrations
//!
//! Migrations live in `migrations/` and are embedded at compile time; see [`crate::migrator`].

pub mod embedded;
pub mod errors;
pub mod handlers;
pub mod models;
