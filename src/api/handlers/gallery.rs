use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::api::auth::{Caller, RequireAdmin};
use crate::api::response::{ApiError, AppQuery, JSend};
use crate::gallery::{Category, GalleryItem, UploadError, UploadEvent, UploadFile, UploadRequest};
use crate::identity::IdentityProvider;
use crate::state_machine::UploadState;
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ListGalleryParams {
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SweepResponse {
    pub removed: Vec<String>,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn list_gallery(
    State(state): State<Arc<AppState>>,
    AppQuery(params): AppQuery<ListGalleryParams>,
) -> Result<Json<JSend<Vec<GalleryItem>>>, ApiError> {
    let category = match params.category.as_deref() {
        None | Some("all") | Some("") => None,
        Some(raw) => Some(
            raw.parse::<Category>()
                .map_err(|c| ApiError::bad_request(format!("Unknown category: {c}")))?,
        ),
    };

    let items = state.gallery.list(category).await?;
    Ok(JSend::success(items))
}

pub async fn get_gallery_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JSend<GalleryItem>>, ApiError> {
    let item = state
        .gallery
        .get(&id)
        .await?
        .filter(|item| item.active)
        .ok_or_else(|| ApiError::not_found("Gallery item not found"))?;

    Ok(JSend::success(item))
}

pub async fn upload_gallery_item(
    State(state): State<Arc<AppState>>,
    Caller(identity): Caller,
    mut multipart: Multipart,
) -> Result<Json<JSend<GalleryItem>>, ApiError> {
    // Anonymous uploads are refused before the body is read
    if identity.current_actor().is_none() {
        return Err(UploadError::Unauthenticated.into());
    }

    let mut request = UploadRequest::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error("Invalid multipart data", e))?
    {
        let field_name = field.name().unwrap_or("").to_string();

        match field_name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let declared = field.content_type().map(|s| s.to_string());

                let data = field
                    .bytes()
                    .await
                    .map_err(|e| multipart_error("Failed to read file", e))?;

                // Declared Content-Type, or guess from the file name
                let media_type = declared
                    .filter(|ct| ct != "application/octet-stream")
                    .or_else(|| mime_guess::from_path(&file_name).first().map(|m| m.to_string()))
                    .unwrap_or_else(|| "application/octet-stream".to_string());

                request.file = Some(UploadFile::new(file_name, media_type, data));
            }
            "title" | "category" | "description" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| multipart_error(&format!("Invalid {field_name}"), e))?;
                match field_name.as_str() {
                    "title" => request.title = text,
                    "category" => request.category = text,
                    _ => request.description = Some(text),
                }
            }
            _ => {
                // Ignore unknown fields
            }
        }
    }

    let (events, mut rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            log_upload_event(&event);
        }
    });

    let cancel = state.shutdown.child_token();
    let committed = state
        .uploads
        .upload(&identity, request, Some(events), &cancel)
        .await?;

    let item = state
        .gallery
        .get(&committed.item_id)
        .await?
        .ok_or_else(|| ApiError::internal("Gallery item missing after commit"))?;

    Ok(JSend::success(item))
}

pub async fn delete_gallery_item(
    State(state): State<Arc<AppState>>,
    RequireAdmin(actor): RequireAdmin,
    Path(id): Path<String>,
) -> Result<Json<JSend<GalleryItem>>, ApiError> {
    let item = state.gallery.delete(&id).await?;
    tracing::info!(item_id = %id, operator = %actor.id, "Gallery item deleted");
    Ok(JSend::success(item))
}

pub async fn sweep_orphans(
    State(state): State<Arc<AppState>>,
    RequireAdmin(actor): RequireAdmin,
) -> Result<Json<JSend<SweepResponse>>, ApiError> {
    let removed = state
        .gallery
        .sweep_orphans(state.config.upload.orphan_min_age())
        .await?;
    tracing::info!(removed = removed.len(), operator = %actor.id, "Swept orphaned gallery objects");
    Ok(JSend::success(SweepResponse { removed }))
}

// ============================================================================
// Helpers
// ============================================================================

/// A body cut off by the route's size limit is a 413, anything else a 400.
fn multipart_error(context: &str, e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::payload_too_large(format!("Upload body is too large: {}", e.body_text()))
    } else {
        ApiError::bad_request(format!("{context}: {}", e.body_text()))
    }
}

fn log_upload_event(event: &UploadEvent) {
    match event {
        UploadEvent::Progress { percent, .. } => {
            tracing::debug!(percent = *percent, "Upload progress");
        }
        UploadEvent::Stalled { after } => {
            tracing::warn!(
                after_secs = after.as_secs(),
                "Upload is stuck at 0%. Check object storage permissions."
            );
        }
        UploadEvent::State(UploadState::MetadataFailed {
            object_path,
            reason,
        }) => {
            tracing::error!(object_path = %object_path, reason = %reason, "Upload left an orphaned object");
        }
        UploadEvent::State(s) => tracing::debug!(state = s.name(), "Upload state"),
    }
}
