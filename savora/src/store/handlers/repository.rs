//! Base repository trait for store operations.
//!
//! A repository is the data access layer for one entity family in the keyed
//! store. Each repository borrows a [`crate::store::Store`] handle and
//! exposes typed create/read/update/delete operations; entity-specific
//! lookups live on the concrete types.

use crate::store::errors::Result;

/// Base repository trait providing common store operations.
///
/// Separate associated types for create requests, update requests, and
/// responses keep the wire DTOs out of the storage layer.
#[async_trait::async_trait]
pub trait Repository {
    /// The request type for creating entities
    type CreateRequest: Send + Sync;

    /// The request type for updating entities
    type UpdateRequest: Send + Sync;

    /// The record type returned by operations
    type Response;

    /// The identifier type for lookups
    type Id: Send + Sync;

    /// The filter type for list operations
    type Filter: Send + Sync;

    /// Create a new entity
    async fn create(&self, request: &Self::CreateRequest) -> Result<Self::Response>;

    /// Get an entity by ID
    async fn get_by_id(&self, id: Self::Id) -> Result<Option<Self::Response>>;

    /// List entities matching a filter
    async fn list(&self, filter: &Self::Filter) -> Result<Vec<Self::Response>>;

    /// Update an entity by ID
    async fn update(&self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response>;

    /// Delete an entity by ID
    async fn delete(&self, id: Self::Id) -> Result<bool>;
}
