//! The CRUD contract shared by every table repository.

use crate::db::errors::Result;

/// Data access for one table.
///
/// Create and update inputs are separate associated types because the columns a caller may set
/// on insert differ from the ones it may patch. `count` takes the same filter as `list`
/// (ignoring its skip/limit) so list endpoints can report a total alongside a page.
#[async_trait::async_trait]
pub trait Repository {
    type CreateRequest;
    type UpdateRequest;
    type Response;
    type Id: Send + Sync;
    type Filter: Send + Sync;

    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response>;

    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>>;

    /// One page of rows matching the filter
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>>;

    /// Number of rows matching the filter, ignoring pagination
    async fn count(&mut self, filter: &Self::Filter) -> Result<i64>;

    /// Returns false when no row had the ID
    async fn delete(&mut self, id: Self::Id) -> Result<bool>;

    /// Patch a row; fields left as `None` in the request keep their stored value.
    /// Fails with [`crate::db::errors::DbError::NotFound`] when the row does not exist.
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response>;
}
