//! Base repository trait for database operations.
//!
//! A repository is a data access layer for one postgres table, borrowing a connection for its
//! lifetime. Operations that only some tables support (updates, deletes) are inherent methods on
//! the concrete repositories.

use crate::db::errors::Result;

#[async_trait::async_trait]
pub trait Repository {
    /// The request type for creating entities
    type CreateRequest: Sync;

    /// The response/DTO type returned by operations
    type Response;

    /// The identifier type for lookups
    type Id: Send + Sync;

    /// The filter type for list operations
    type Filter: Send + Sync;

    /// Create a new entity
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response>;

    /// Get an entity by ID
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>>;

    /// List entities matching a filter
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>>;
}
