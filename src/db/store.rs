//! Document store abstraction shared by all route collaborators.

use std::sync::Arc;

use async_trait::async_trait;
use mongodb::bson::Document;

use crate::config::DatabaseConfig;

/// Errors surfaced by a document store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The identifier is not a valid document id.
    #[error("invalid document id: {0}")]
    InvalidId(String),

    /// A unique index rejected the write.
    #[error("duplicate value for field {field}")]
    Duplicate { field: String },

    /// Connection string could not be used.
    #[error("invalid connection string: {0}")]
    InvalidUrl(String),

    #[error(transparent)]
    Driver(#[from] mongodb::error::Error),
}

/// CRUD access to named collections of documents.
///
/// One handle is created at startup and shared by every request; the
/// implementation is responsible for its own pooling.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Documents matching `filter`, at most `limit` of them.
    async fn find(
        &self,
        collection: &str,
        filter: Document,
        limit: i64,
    ) -> Result<Vec<Document>, StoreError>;

    async fn find_by_id(&self, collection: &str, id: &str)
        -> Result<Option<Document>, StoreError>;

    /// Insert and return the stored document including its `_id`.
    async fn insert(&self, collection: &str, doc: Document) -> Result<Document, StoreError>;

    /// Apply `changes` as a `$set` and return the updated document.
    async fn update_by_id(
        &self,
        collection: &str,
        id: &str,
        changes: Document,
    ) -> Result<Option<Document>, StoreError>;

    /// Returns whether a document was removed.
    async fn delete_by_id(&self, collection: &str, id: &str) -> Result<bool, StoreError>;

    /// Release the underlying connection.
    async fn close(&self);
}

/// Establishes the shared store handle during startup.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, config: &DatabaseConfig) -> Result<Arc<dyn DocumentStore>, StoreError>;
}
