//! Authentication and authorization.
//!
//! Dealflow sits behind a trusted reverse proxy that authenticates users and forwards their email
//! address in a header (`x-dealflow-user` by default). There are no passwords, sessions or API
//! keys in the service itself.
//!
//! - [`current_user`]: the [`CurrentUser`](crate::api::models::users::CurrentUser) extractor.
//!   Resolves the header to a user row, creating a `rep` on first sight when
//!   `auth.proxy_header.auto_create_users` is set. A missing header is a 401.
//! - [`permissions`]: role checks. Every authenticated user can read and write CRM data; user
//!   management and everything under `/admin` needs the `admin` role.
//!
//! ```ignore
//! async fn handler(current_user: CurrentUser) -> Result<Json<..>> { .. }
//! async fn admin_handler(RequiresAdmin(admin): RequiresAdmin) -> Result<Json<..>> { .. }
//! ```

pub mod current_user;
pub mod permissions;
