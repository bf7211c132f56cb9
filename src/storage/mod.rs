pub mod db;
mod documents;
pub mod models;
mod tables;

pub use db::{Database, DatabaseError, PurgeStats};
pub use models::{to_fields, Document, Order, Query};
pub use tables::*;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DocumentStoreError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("Backend error: {0}")]
    Backend(String),
    #[error("Encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Schemaless record store addressed by collection name.
///
/// The store assigns each record's id and `createdAt` from its own clock;
/// callers never supply either.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Append a new record and return its id.
    async fn insert(
        &self,
        collection: &str,
        fields: Map<String, Value>,
    ) -> Result<String, DocumentStoreError>;
    async fn get(&self, collection: &str, id: &str)
        -> Result<Option<Document>, DocumentStoreError>;
    /// Returns whether a record was removed.
    async fn delete(&self, collection: &str, id: &str) -> Result<bool, DocumentStoreError>;
    async fn query(
        &self,
        collection: &str,
        query: &Query,
    ) -> Result<Vec<Document>, DocumentStoreError>;

    async fn count(&self, collection: &str, query: &Query) -> Result<u64, DocumentStoreError> {
        Ok(self.query(collection, query).await?.len() as u64)
    }
}
