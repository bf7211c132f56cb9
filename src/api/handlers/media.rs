use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use std::sync::Arc;

use crate::api::response::ApiError;
use crate::object_store::ObjectStoreError;
use crate::AppState;

/// Serve a stored object. Backs the public URLs handed out by the local
/// storage backend.
/// Route: GET /media/*path
pub async fn serve_media(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
) -> Result<Response, ApiError> {
    let data = state.object_store.get(&path).await.map_err(|e| match e {
        ObjectStoreError::NotFound(_) => ApiError::not_found("Media not found"),
        ObjectStoreError::Backend { ref code, .. } if code == "invalid-path" => {
            ApiError::bad_request(e.to_string())
        }
        _ => ApiError::internal(format!("Failed to retrieve media: {e}")),
    })?;

    let content_type = mime_guess::from_path(&path).first_or_octet_stream();
    let byte_size = data.len() as u64;

    let mut response = (StatusCode::OK, data).into_response();
    let headers = response.headers_mut();

    if let Ok(value) = content_type.as_ref().parse() {
        headers.insert(header::CONTENT_TYPE, value);
    }
    headers.insert(header::CONTENT_LENGTH, header::HeaderValue::from(byte_size));

    // Object names embed their upload timestamp, so content never changes
    headers.insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("public, max-age=86400, immutable"),
    );

    Ok(response)
}
