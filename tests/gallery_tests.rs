mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;

use common::{RecordingDocumentStore, ScriptedObjectStore};
use outreach_admin::gallery::{Category, GalleryError, GalleryService, GALLERY_COLLECTION};
use outreach_admin::storage::DocumentStore;

fn service() -> (Arc<ScriptedObjectStore>, Arc<RecordingDocumentStore>, GalleryService) {
    let objects = Arc::new(ScriptedObjectStore::succeeding());
    let documents = Arc::new(RecordingDocumentStore::new());
    let gallery = GalleryService::new(objects.clone(), documents.clone());
    (objects, documents, gallery)
}

/// Store a gallery record pointing at `object_path` and return its id.
async fn record(
    documents: &RecordingDocumentStore,
    title: &str,
    category: Category,
    object_path: &str,
    active: bool,
) -> String {
    let fields = json!({
        "title": title,
        "category": category,
        "fileName": object_path.trim_start_matches("gallery/"),
        "objectPath": object_path,
        "url": format!("https://cdn.example.org/{object_path}"),
        "uploaderId": "uid-1",
        "uploaderLabel": "staff@example.org",
        "sizeBytes": 3,
        "mediaType": "image/png",
        "active": active,
    });
    documents
        .insert(GALLERY_COLLECTION, fields.as_object().unwrap().clone())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_delete_removes_binary_then_record() {
    let (objects, documents, gallery) = service();
    objects.seed("gallery/1-mural.png", b"png");
    let id = record(&documents, "Mural", Category::Community, "gallery/1-mural.png", true).await;

    let deleted = gallery.delete(&id).await.unwrap();

    assert_eq!(deleted.object_path, "gallery/1-mural.png");
    assert!(!objects.contains("gallery/1-mural.png"));
    assert!(gallery.get(&id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_failed_binary_delete_keeps_the_record() {
    let (objects, documents, gallery) = service();
    objects.seed("gallery/1-mural.png", b"png");
    objects.fail_deletes.store(true, Ordering::SeqCst);
    let id = record(&documents, "Mural", Category::Community, "gallery/1-mural.png", true).await;

    let err = gallery.delete(&id).await.unwrap_err();

    assert!(matches!(err, GalleryError::ObjectStore(_)));
    assert!(gallery.get(&id).await.unwrap().is_some());
    assert!(objects.contains("gallery/1-mural.png"));
}

#[tokio::test]
async fn test_deleting_unknown_item_is_not_found() {
    let (objects, _documents, gallery) = service();

    let err = gallery.delete("missing").await.unwrap_err();

    assert!(matches!(err, GalleryError::NotFound(ref id) if id == "missing"));
    assert_eq!(objects.deletes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_sweep_removes_only_unreferenced_objects() {
    let (objects, documents, gallery) = service();
    objects.seed("gallery/1000-kept.png", b"png");
    objects.seed("gallery/1001-orphan.png", b"png");
    objects.seed("gallery/1002-hidden.png", b"png");
    objects.seed("banners/1003-other.png", b"png");
    let fresh = format!("gallery/{}-in-flight.png", Utc::now().timestamp_millis());
    objects.seed(&fresh, b"png");

    record(&documents, "Kept", Category::Events, "gallery/1000-kept.png", true).await;
    // Inactive records still own their binary
    record(&documents, "Hidden", Category::Events, "gallery/1002-hidden.png", false).await;

    let removed = gallery
        .sweep_orphans(Duration::from_secs(3600))
        .await
        .unwrap();

    assert_eq!(removed, vec!["gallery/1001-orphan.png".to_string()]);
    assert!(objects.contains("gallery/1000-kept.png"));
    assert!(objects.contains("gallery/1002-hidden.png"));
    assert!(objects.contains("banners/1003-other.png"));
    assert!(objects.contains(&fresh));

    let removed = gallery.sweep_orphans(Duration::ZERO).await.unwrap();
    assert_eq!(removed, vec![fresh]);
}

#[tokio::test]
async fn test_listing_shows_active_items_newest_first() {
    let (_objects, documents, gallery) = service();
    record(&documents, "First", Category::Community, "gallery/1-first.png", true).await;
    record(&documents, "Retired", Category::Events, "gallery/2-retired.png", false).await;
    record(&documents, "Second", Category::Events, "gallery/3-second.png", true).await;
    record(&documents, "Third", Category::Community, "gallery/4-third.png", true).await;

    let titles: Vec<String> = gallery
        .list(None)
        .await
        .unwrap()
        .into_iter()
        .map(|item| item.title)
        .collect();
    assert_eq!(titles, vec!["Third", "Second", "First"]);

    let community = gallery.list(Some(Category::Community)).await.unwrap();
    assert_eq!(community.len(), 2);
    assert!(community.iter().all(|i| i.category == Category::Community && i.active));

    assert_eq!(gallery.count().await.unwrap(), 4);
}
