use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;

use super::naming::timestamp_of;
use super::{Category, GalleryItem, GALLERY_COLLECTION, GALLERY_PREFIX};
use crate::object_store::{ObjectStore, ObjectStoreError};
use crate::storage::{DocumentStore, DocumentStoreError, Query};

#[derive(Debug, Error)]
pub enum GalleryError {
    #[error("Gallery item not found: {0}")]
    NotFound(String),
    #[error("Object storage error: {0}")]
    ObjectStore(#[from] ObjectStoreError),
    #[error("Document store error: {0}")]
    DocumentStore(#[from] DocumentStoreError),
    #[error("Malformed gallery record: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Read and cleanup side of the gallery.
pub struct GalleryService {
    objects: Arc<dyn ObjectStore>,
    documents: Arc<dyn DocumentStore>,
}

impl GalleryService {
    pub fn new(objects: Arc<dyn ObjectStore>, documents: Arc<dyn DocumentStore>) -> Self {
        Self { objects, documents }
    }

    /// Active items, newest first.
    pub async fn list(&self, category: Option<Category>) -> Result<Vec<GalleryItem>, GalleryError> {
        let mut query = Query::new().filter("active", true).newest_first();
        if let Some(category) = category {
            query = query.filter("category", category.as_str());
        }

        let docs = self.documents.query(GALLERY_COLLECTION, &query).await?;
        docs.iter()
            .map(|doc| doc.decode::<GalleryItem>().map_err(GalleryError::from))
            .collect()
    }

    pub async fn get(&self, id: &str) -> Result<Option<GalleryItem>, GalleryError> {
        match self.documents.get(GALLERY_COLLECTION, id).await? {
            Some(doc) => Ok(Some(doc.decode()?)),
            None => Ok(None),
        }
    }

    /// Number of gallery records, active or not.
    pub async fn count(&self) -> Result<u64, GalleryError> {
        Ok(self.documents.count(GALLERY_COLLECTION, &Query::new()).await?)
    }

    /// Remove an item: the binary first, then its record.
    ///
    /// If the binary cannot be deleted the record is kept, so a record never
    /// outlives a failed storage delete.
    pub async fn delete(&self, id: &str) -> Result<GalleryItem, GalleryError> {
        let item = self
            .get(id)
            .await?
            .ok_or_else(|| GalleryError::NotFound(id.to_string()))?;

        self.objects.delete(&item.object_path).await?;
        self.documents.delete(GALLERY_COLLECTION, id).await?;

        tracing::debug!(item_id = %id, object_path = %item.object_path, "Deleted gallery item");
        Ok(item)
    }

    /// Delete gallery binaries that no record references.
    ///
    /// Objects whose name says they were created less than `min_age` ago are
    /// skipped, since their upload may still be committing metadata.
    pub async fn sweep_orphans(&self, min_age: Duration) -> Result<Vec<String>, GalleryError> {
        let referenced: HashSet<String> = self
            .documents
            .query(GALLERY_COLLECTION, &Query::new())
            .await?
            .iter()
            .filter_map(|doc| doc.field("objectPath").and_then(|v| v.as_str()))
            .map(str::to_string)
            .collect();

        let cutoff = Utc::now().timestamp_millis() - min_age.as_millis() as i64;
        let mut removed = Vec::new();

        for path in self.objects.list(GALLERY_PREFIX).await? {
            if referenced.contains(&path) {
                continue;
            }
            if timestamp_of(&path).is_some_and(|created| created > cutoff) {
                continue;
            }
            self.objects.delete(&path).await?;
            tracing::info!(object_path = %path, "Removed orphaned gallery object");
            removed.push(path);
        }

        Ok(removed)
    }
}
