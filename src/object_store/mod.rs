mod gcs;
mod local;

pub use gcs::GcsStore;
pub use local::LocalStore;

use async_trait::async_trait;
use bytes::Bytes;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC};
use thiserror::Error;
use tokio::sync::mpsc;

/// Characters escaped inside a single URL path segment or query value.
pub(crate) const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Same as [`COMPONENT`] but keeps `/` so object paths stay readable.
pub(crate) const PATH: &AsciiSet = &COMPONENT.remove(b'/');

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Object not found: {0}")]
    NotFound(String),
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("Transfer canceled")]
    Canceled,
    #[error("Backend error ({code}): {message}")]
    Backend { code: String, message: String },
}

impl ObjectStoreError {
    pub fn backend(code: impl Into<String>, message: impl Into<String>) -> Self {
        ObjectStoreError::Backend {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// One progress tick of an in-flight upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadProgress {
    pub bytes_transferred: u64,
    pub total_bytes: u64,
}

impl UploadProgress {
    /// Percentage in `[0, 100]`. An empty transfer counts as complete.
    pub fn percent(&self) -> f64 {
        if self.total_bytes == 0 {
            return 100.0;
        }
        let ratio = self.bytes_transferred as f64 / self.total_bytes as f64;
        (ratio * 100.0).clamp(0.0, 100.0)
    }
}

/// Where a backend pushes progress ticks while it transfers an object.
#[derive(Debug, Clone)]
pub struct ProgressSink {
    tx: Option<mpsc::UnboundedSender<UploadProgress>>,
}

impl ProgressSink {
    pub fn new(tx: mpsc::UnboundedSender<UploadProgress>) -> Self {
        Self { tx: Some(tx) }
    }

    /// A sink that discards every tick.
    pub fn discard() -> Self {
        Self { tx: None }
    }

    pub fn report(&self, bytes_transferred: u64, total_bytes: u64) {
        if let Some(tx) = &self.tx {
            // The receiver going away only means nobody is watching anymore
            let _ = tx.send(UploadProgress {
                bytes_transferred,
                total_bytes,
            });
        }
    }
}

/// Handle to a successfully stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub path: String,
    pub byte_size: u64,
}

/// Abstraction over object storage backends.
/// Paths are slash-separated, e.g. `gallery/1700000000000-title.jpg`.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Transfer `data` to `path`, reporting progress through `progress`.
    /// The object is only visible at `path` once this resolves successfully.
    async fn upload(
        &self,
        path: &str,
        data: Bytes,
        progress: ProgressSink,
    ) -> Result<StoredObject, ObjectStoreError>;
    /// Publicly retrievable URL for a stored object.
    async fn public_url(&self, object: &StoredObject) -> Result<String, ObjectStoreError>;
    async fn get(&self, path: &str) -> Result<Bytes, ObjectStoreError>;
    /// Deleting a missing object is not an error.
    async fn delete(&self, path: &str) -> Result<(), ObjectStoreError>;
    async fn exists(&self, path: &str) -> Result<bool, ObjectStoreError>;
    /// All object paths starting with `prefix`.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, ObjectStoreError>;
}
