//! Two-phase creation of a gallery item: upload the binary, then commit its
//! metadata record.
//!
//! A metadata record is only ever written after the binary upload resolved
//! successfully. When the metadata commit fails the binary stays in object
//! storage as an orphan and the caller is told where it is; nothing is
//! deleted automatically. [`GalleryService::sweep_orphans`] cleans up later.
//!
//! [`GalleryService::sweep_orphans`]: super::GalleryService::sweep_orphans

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::naming::derive_object_name;
use super::{Category, NewGalleryItem, GALLERY_COLLECTION, GALLERY_PREFIX};
use crate::identity::{Actor, IdentityProvider};
use crate::object_store::{
    ObjectStore, ObjectStoreError, ProgressSink, StoredObject, UploadProgress,
};
use crate::state_machine::UploadState;
use crate::storage::{to_fields, DocumentStore, DocumentStoreError};

/// Largest accepted upload unless configured otherwise (5 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024;

/// How long an upload may sit at 0% before the stall advisory fires
pub const DEFAULT_STALL_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct UploadSettings {
    pub max_upload_bytes: u64,
    pub stall_timeout: Duration,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            stall_timeout: DEFAULT_STALL_TIMEOUT,
        }
    }
}

/// The binary being uploaded, as received from the operator.
#[derive(Debug, Clone)]
pub struct UploadFile {
    /// Original file name, used for its extension
    pub file_name: String,
    /// Declared media type, e.g. `image/jpeg`
    pub media_type: String,
    pub data: Bytes,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, media_type: impl Into<String>, data: Bytes) -> Self {
        Self {
            file_name: file_name.into(),
            media_type: media_type.into(),
            data,
        }
    }

    pub fn size_bytes(&self) -> u64 {
        self.data.len() as u64
    }
}

#[derive(Debug, Clone, Default)]
pub struct UploadRequest {
    pub file: Option<UploadFile>,
    pub title: String,
    pub category: String,
    pub description: Option<String>,
}

/// Why the object store refused or lost a transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageFailureKind {
    PermissionDenied,
    Canceled,
    Unknown,
    /// Backend-native error code
    Other(String),
}

impl From<&ObjectStoreError> for StorageFailureKind {
    fn from(e: &ObjectStoreError) -> Self {
        match e {
            ObjectStoreError::PermissionDenied(_) => StorageFailureKind::PermissionDenied,
            ObjectStoreError::Canceled => StorageFailureKind::Canceled,
            ObjectStoreError::Backend { code, .. } => StorageFailureKind::Other(code.clone()),
            ObjectStoreError::Io(_) | ObjectStoreError::NotFound(_) => StorageFailureKind::Unknown,
        }
    }
}

impl fmt::Display for StorageFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageFailureKind::PermissionDenied => f.write_str("permission denied"),
            StorageFailureKind::Canceled => f.write_str("canceled"),
            StorageFailureKind::Unknown => f.write_str("unknown"),
            StorageFailureKind::Other(code) => write!(f, "code {code}"),
        }
    }
}

/// What went wrong after the binary was already stored.
#[derive(Debug, Error)]
pub enum MetadataFailure {
    #[error("could not resolve public URL: {0}")]
    UrlResolution(#[source] ObjectStoreError),
    #[error("could not insert record: {0}")]
    Insert(#[source] DocumentStoreError),
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("You must be signed in to upload images")]
    Unauthenticated,
    #[error("Missing required input: {0}")]
    MissingInput(&'static str),
    #[error("Unknown category: {0}")]
    InvalidCategory(String),
    #[error("File is {size} bytes, the limit is {max} bytes")]
    FileTooLarge { size: u64, max: u64 },
    #[error("Unsupported media type {0}: only images can be uploaded")]
    UnsupportedMediaType(String),
    #[error("Upload failed ({kind}): {message}")]
    StorageWriteFailed {
        kind: StorageFailureKind,
        message: String,
    },
    #[error("Upload succeeded but metadata failed; binary left at {object_path}: {source}")]
    MetadataWriteFailed {
        object_path: String,
        #[source]
        source: MetadataFailure,
    },
}

impl UploadError {
    /// Rejected before any I/O happened.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            UploadError::Unauthenticated
                | UploadError::MissingInput(_)
                | UploadError::InvalidCategory(_)
                | UploadError::FileTooLarge { .. }
                | UploadError::UnsupportedMediaType(_)
        )
    }
}

/// What the caller observes while an upload runs. The terminal
/// [`UploadEvent::State`] is always the last event of an invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadEvent {
    State(UploadState),
    Progress {
        percent: f64,
        bytes_transferred: u64,
        total_bytes: u64,
    },
    /// Advisory only: the transfer keeps going
    Stalled { after: Duration },
}

/// Result of a committed upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedUpload {
    pub item_id: String,
    pub object_path: String,
    pub url: String,
}

struct Validated {
    actor: Actor,
    file: UploadFile,
    title: String,
    category: Category,
    description: Option<String>,
}

/// Drives one invocation through the upload state machine and reports every
/// transition to the caller.
struct Tracker {
    state: UploadState,
    events: Option<mpsc::UnboundedSender<UploadEvent>>,
}

impl Tracker {
    fn new(events: Option<mpsc::UnboundedSender<UploadEvent>>) -> Self {
        Self {
            state: UploadState::Idle,
            events,
        }
    }

    fn enter(&mut self, next: UploadState) {
        if let Err(e) = self.state.advance(next.clone()) {
            tracing::error!(error = %e, "Upload coordinator skipped a state");
            self.state = next.clone();
        }
        self.emit(UploadEvent::State(next));
    }

    fn emit(&self, event: UploadEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }
}

/// Progress bookkeeping for one transfer.
struct Progress {
    last_percent: f64,
    watchdog_armed: bool,
}

impl Progress {
    fn observe(&mut self, tick: UploadProgress, tracker: &Tracker) {
        let percent = tick.percent();
        if percent < self.last_percent {
            debug!(
                percent,
                last = self.last_percent,
                "Dropping regressing progress tick"
            );
            return;
        }
        self.last_percent = percent;
        if percent > 0.0 {
            self.watchdog_armed = false;
        }
        tracker.emit(UploadEvent::Progress {
            percent,
            bytes_transferred: tick.bytes_transferred,
            total_bytes: tick.total_bytes,
        });
    }
}

pub struct UploadCoordinator {
    objects: Arc<dyn ObjectStore>,
    documents: Arc<dyn DocumentStore>,
    settings: UploadSettings,
}

impl UploadCoordinator {
    pub fn new(
        objects: Arc<dyn ObjectStore>,
        documents: Arc<dyn DocumentStore>,
        settings: UploadSettings,
    ) -> Self {
        Self {
            objects,
            documents,
            settings,
        }
    }

    pub fn settings(&self) -> &UploadSettings {
        &self.settings
    }

    /// Create one gallery item end to end.
    ///
    /// `events` receives state transitions, progress ticks and the stall
    /// advisory. `cancel` aborts the transfer while it is in flight; once the
    /// metadata commit has started it is ignored.
    pub async fn upload(
        &self,
        identity: &dyn IdentityProvider,
        request: UploadRequest,
        events: Option<mpsc::UnboundedSender<UploadEvent>>,
        cancel: &CancellationToken,
    ) -> Result<CommittedUpload, UploadError> {
        let mut tracker = Tracker::new(events);

        tracker.enter(UploadState::Validating);
        let upload = match self.validate(identity, request) {
            Ok(v) => v,
            Err(e) => {
                debug!(error = %e, "Upload rejected");
                tracker.enter(UploadState::Rejected {
                    reason: e.to_string(),
                });
                return Err(e);
            }
        };

        let name = derive_object_name(
            Utc::now().timestamp_millis(),
            &upload.title,
            &upload.file.file_name,
            &upload.file.media_type,
        );
        let object_path = format!("{GALLERY_PREFIX}{name}");

        // Phase 1: binary upload
        tracker.enter(UploadState::Uploading);
        info!(
            object_path = %object_path,
            bytes = upload.file.size_bytes(),
            uploader = %upload.actor.id,
            "Starting gallery upload"
        );
        let stored = match self
            .transfer(&object_path, upload.file.data.clone(), &tracker, cancel)
            .await
        {
            Ok(stored) => stored,
            Err(e) => {
                let kind = StorageFailureKind::from(&e);
                warn!(object_path = %object_path, error = %e, "Gallery upload failed");
                tracker.enter(UploadState::UploadFailed {
                    reason: kind.to_string(),
                });
                return Err(UploadError::StorageWriteFailed {
                    kind,
                    message: e.to_string(),
                });
            }
        };
        tracker.enter(UploadState::UploadSucceeded {
            object_path: object_path.clone(),
        });

        // Phase 2: metadata commit, runs to completion regardless of `cancel`
        tracker.enter(UploadState::CommittingMetadata);
        match self.commit(&upload, &stored).await {
            Ok(committed) => {
                info!(
                    item_id = %committed.item_id,
                    object_path = %object_path,
                    "Gallery item committed"
                );
                tracker.enter(UploadState::Committed {
                    item_id: committed.item_id.clone(),
                });
                Ok(committed)
            }
            Err(source) => {
                warn!(
                    object_path = %object_path,
                    error = %source,
                    "Metadata commit failed, binary left orphaned"
                );
                tracker.enter(UploadState::MetadataFailed {
                    object_path: object_path.clone(),
                    reason: source.to_string(),
                });
                Err(UploadError::MetadataWriteFailed {
                    object_path,
                    source,
                })
            }
        }
    }

    fn validate(
        &self,
        identity: &dyn IdentityProvider,
        request: UploadRequest,
    ) -> Result<Validated, UploadError> {
        let actor = identity
            .current_actor()
            .ok_or(UploadError::Unauthenticated)?;
        let file = request.file.ok_or(UploadError::MissingInput("file"))?;

        if file.size_bytes() > self.settings.max_upload_bytes {
            return Err(UploadError::FileTooLarge {
                size: file.size_bytes(),
                max: self.settings.max_upload_bytes,
            });
        }
        if !file.media_type.starts_with("image/") {
            return Err(UploadError::UnsupportedMediaType(file.media_type));
        }

        let title = request.title.trim().to_string();
        if title.is_empty() {
            return Err(UploadError::MissingInput("title"));
        }
        let category = request
            .category
            .parse::<Category>()
            .map_err(UploadError::InvalidCategory)?;
        let description = request
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());

        Ok(Validated {
            actor,
            file,
            title,
            category,
            description,
        })
    }

    /// Run the transfer while forwarding progress, watching for a stall and
    /// honouring cancellation.
    async fn transfer(
        &self,
        object_path: &str,
        data: Bytes,
        tracker: &Tracker,
        cancel: &CancellationToken,
    ) -> Result<StoredObject, ObjectStoreError> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let upload = self
            .objects
            .upload(object_path, data, ProgressSink::new(tx));
        tokio::pin!(upload);

        let stall_timeout = self.settings.stall_timeout;
        let watchdog = tokio::time::sleep(stall_timeout);
        tokio::pin!(watchdog);

        let mut progress = Progress {
            last_percent: 0.0,
            watchdog_armed: true,
        };

        let result = loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break Err(ObjectStoreError::Canceled),
                Some(tick) = rx.recv() => progress.observe(tick, tracker),
                result = &mut upload => break result,
                _ = &mut watchdog, if progress.watchdog_armed => {
                    progress.watchdog_armed = false;
                    warn!(
                        object_path = %object_path,
                        timeout_secs = stall_timeout.as_secs(),
                        "Upload appears to be stuck at 0%"
                    );
                    tracker.emit(UploadEvent::Stalled { after: stall_timeout });
                }
            }
        };

        // Ticks sent in the same poll that completed the upload
        while let Ok(tick) = rx.try_recv() {
            progress.observe(tick, tracker);
        }

        result
    }

    async fn commit(
        &self,
        upload: &Validated,
        stored: &StoredObject,
    ) -> Result<CommittedUpload, MetadataFailure> {
        let url = self
            .objects
            .public_url(stored)
            .await
            .map_err(MetadataFailure::UrlResolution)?;

        let file_name = stored
            .path
            .strip_prefix(GALLERY_PREFIX)
            .unwrap_or(&stored.path);
        let record = NewGalleryItem {
            title: &upload.title,
            category: upload.category,
            description: upload.description.as_deref(),
            file_name,
            object_path: &stored.path,
            url: &url,
            uploader_id: &upload.actor.id,
            uploader_label: &upload.actor.label,
            size_bytes: upload.file.size_bytes(),
            media_type: &upload.file.media_type,
            active: true,
        };
        let fields = to_fields(&record).map_err(|e| MetadataFailure::Insert(e.into()))?;

        let item_id = self
            .documents
            .insert(GALLERY_COLLECTION, fields)
            .await
            .map_err(MetadataFailure::Insert)?;

        Ok(CommittedUpload {
            item_id,
            object_path: stored.path.clone(),
            url,
        })
    }
}
