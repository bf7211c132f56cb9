//! outreach-admin - Backend for a nonprofit website and its admin dashboard
//!
//! This crate provides:
//! - Gallery uploads as a two-phase commit (binary to object storage, then a
//!   metadata record) with progress, stall detection and cancellation
//! - Swappable object storage backends (local filesystem, GCS)
//! - redb embedded document store for gallery metadata and form submissions
//! - Upcoming community events and visitor registrations
//! - REST API for the public site forms and the admin dashboard

pub mod api;
pub mod config;
pub mod events;
pub mod gallery;
pub mod identity;
pub mod object_store;
pub mod state_machine;
pub mod storage;
pub mod submissions;
#[cfg(test)]
pub mod testutil;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use config::Config;
use events::Events;
use gallery::{GalleryService, UploadCoordinator};
use storage::{Database, DocumentStore};
use submissions::Submissions;

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub object_store: Arc<dyn object_store::ObjectStore>,
    pub uploads: UploadCoordinator,
    pub gallery: GalleryService,
    pub submissions: Submissions,
    pub events: Events,
    /// Cancelled on shutdown; in-flight uploads use child tokens
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        config: Config,
        db: Database,
        object_store: Arc<dyn object_store::ObjectStore>,
    ) -> Self {
        let documents: Arc<dyn DocumentStore> = Arc::new(db.clone());
        let uploads = UploadCoordinator::new(
            Arc::clone(&object_store),
            Arc::clone(&documents),
            config.upload.settings(),
        );
        let gallery = GalleryService::new(Arc::clone(&object_store), Arc::clone(&documents));
        let submissions = Submissions::new(Arc::clone(&documents));
        let events = Events::new(documents);

        Self {
            config,
            db,
            object_store,
            uploads,
            gallery,
            submissions,
            events,
            shutdown: CancellationToken::new(),
        }
    }
}
