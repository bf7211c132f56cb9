use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::AppState;

/// Room for the multipart framing and text fields around the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Oversized files must still reach the coordinator so they are rejected
    // with a clear FileTooLarge rather than a truncated body.
    let upload_limit = (state.config.upload.max_upload_size as usize)
        .saturating_mul(2)
        .saturating_add(MULTIPART_OVERHEAD);

    let mut router = Router::new()
        // Gallery
        .route("/gallery", get(handlers::list_gallery))
        .route(
            "/gallery",
            post(handlers::upload_gallery_item).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/gallery/:id", get(handlers::get_gallery_item))
        .route("/gallery/:id", delete(handlers::delete_gallery_item))
        // Stored media (local backend)
        .route("/media/*path", get(handlers::serve_media))
        // Public site forms
        .route("/contact", post(handlers::create_contact))
        .route("/newsletter", post(handlers::subscribe_newsletter))
        .route("/donations", post(handlers::create_donation))
        .route("/donations/total", get(handlers::donation_total))
        // Events
        .route("/events", get(handlers::list_events))
        .route("/events/:id/register", post(handlers::register_for_event))
        // Admin dashboard
        .route("/admin/stats", get(handlers::dashboard_stats))
        .route("/admin/contacts", get(handlers::list_contacts))
        .route("/admin/donations", get(handlers::list_donations))
        .route("/admin/subscribers", get(handlers::list_subscribers))
        .route("/admin/gallery/sweep", post(handlers::sweep_orphans))
        .route("/admin/events", post(handlers::create_event))
        .route(
            "/admin/events/:id/registrations",
            get(handlers::list_event_registrations),
        )
        // Internal
        .route("/_internal/health", get(handlers::health));

    // Test-only routes
    if state.config.test_mode {
        tracing::warn!("Test mode enabled. The purge route is available.");
        router = router.route("/admin/purge", delete(handlers::admin_purge));
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}
