//! Public gallery: upload coordination, listing and cleanup.

mod coordinator;
mod naming;
mod service;

pub use coordinator::{
    CommittedUpload, MetadataFailure, StorageFailureKind, UploadCoordinator, UploadError,
    UploadEvent, UploadFile, UploadRequest, UploadSettings,
};
pub use naming::{derive_object_name, sanitize_title, timestamp_of};
pub use service::{GalleryError, GalleryService};

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Collection holding gallery metadata records
pub const GALLERY_COLLECTION: &str = "gallery_images";

/// Object storage folder for gallery binaries
pub const GALLERY_PREFIX: &str = "gallery/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Community,
    Events,
    General,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Community, Category::Events, Category::General];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Community => "community",
            Category::Events => "events",
            Category::General => "general",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| s.to_string())
    }
}

/// A public-facing gallery record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryItem {
    pub id: String,
    pub title: String,
    pub category: Category,
    #[serde(default)]
    pub description: Option<String>,
    pub file_name: String,
    pub object_path: String,
    pub url: String,
    pub uploader_id: String,
    pub uploader_label: String,
    pub size_bytes: u64,
    pub media_type: String,
    pub created_at: DateTime<Utc>,
    pub active: bool,
}

/// Fields written for a new gallery record. `id` and `createdAt` come from the
/// document store.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NewGalleryItem<'a> {
    pub title: &'a str,
    pub category: Category,
    pub description: Option<&'a str>,
    pub file_name: &'a str,
    pub object_path: &'a str,
    pub url: &'a str,
    pub uploader_id: &'a str,
    pub uploader_label: &'a str,
    pub size_bytes: u64,
    pub media_type: &'a str,
    pub active: bool,
}
