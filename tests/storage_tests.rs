use serde_json::{json, Map, Value};

use outreach_admin::storage::{Database, DocumentStore, Query};

fn test_db() -> (tempfile::TempDir, Database) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(dir.path().join("data")).unwrap();
    (dir, db)
}

fn fields(value: Value) -> Map<String, Value> {
    value.as_object().unwrap().clone()
}

#[tokio::test]
async fn test_insert_assigns_id_and_timestamp() {
    let (_dir, db) = test_db();

    let id = db
        .insert("contact_submissions", fields(json!({"name": "Asha", "status": "new"})))
        .await
        .unwrap();

    assert_eq!(id.len(), 20);
    let doc = db.get("contact_submissions", &id).await.unwrap().unwrap();
    assert_eq!(doc.id, id);
    assert_eq!(doc.collection, "contact_submissions");
    assert_eq!(doc.field("name"), Some(&json!("Asha")));
    assert!(doc.field("id").is_none());
}

#[tokio::test]
async fn test_timestamps_are_strictly_increasing() {
    let (_dir, db) = test_db();

    let mut previous = None;
    for n in 0..50 {
        let id = db.insert("donations", fields(json!({"n": n}))).await.unwrap();
        let created = db.get("donations", &id).await.unwrap().unwrap().created_at;
        if let Some(prev) = previous {
            assert!(created > prev);
        }
        previous = Some(created);
    }
}

#[tokio::test]
async fn test_field_types_survive_storage() {
    let (_dir, db) = test_db();
    let original = json!({
        "amount": 25.5,
        "sizeBytes": 2_097_152u64,
        "active": true,
        "description": null,
        "tags": ["a", "b"],
    });

    let id = db.insert("gallery_images", fields(original.clone())).await.unwrap();
    let doc = db.get("gallery_images", &id).await.unwrap().unwrap();

    assert_eq!(Value::Object(doc.fields), original);
}

#[tokio::test]
async fn test_collections_are_isolated() {
    let (_dir, db) = test_db();
    // "gallery" is a prefix of "gallery_images" in key space
    db.insert("gallery", fields(json!({"k": 1}))).await.unwrap();
    db.insert("gallery_images", fields(json!({"k": 2}))).await.unwrap();
    let id = db.insert("gallery_images", fields(json!({"k": 3}))).await.unwrap();

    assert_eq!(db.count("gallery", &Query::new()).await.unwrap(), 1);
    assert_eq!(db.count("gallery_images", &Query::new()).await.unwrap(), 2);
    assert!(db.get("gallery", &id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_query_filters_orders_and_limits() {
    let (_dir, db) = test_db();
    for (name, status) in [("a", "new"), ("b", "read"), ("c", "new"), ("d", "new")] {
        db.insert("contact_submissions", fields(json!({"name": name, "status": status})))
            .await
            .unwrap();
    }

    let oldest: Vec<Value> = db
        .query("contact_submissions", &Query::new().filter("status", "new"))
        .await
        .unwrap()
        .into_iter()
        .map(|d| d.fields["name"].clone())
        .collect();
    assert_eq!(oldest, vec![json!("a"), json!("c"), json!("d")]);

    let newest: Vec<Value> = db
        .query(
            "contact_submissions",
            &Query::new().filter("status", "new").newest_first().limit(2),
        )
        .await
        .unwrap()
        .into_iter()
        .map(|d| d.fields["name"].clone())
        .collect();
    assert_eq!(newest, vec![json!("d"), json!("c")]);
}

#[tokio::test]
async fn test_delete_reports_whether_a_record_existed() {
    let (_dir, db) = test_db();
    let id = db.insert("donations", fields(json!({"amount": 10}))).await.unwrap();

    assert!(db.delete("donations", &id).await.unwrap());
    assert!(!db.delete("donations", &id).await.unwrap());
    assert!(db.get("donations", &id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_purge_clears_every_collection() {
    let (_dir, db) = test_db();
    db.insert("donations", fields(json!({"amount": 10}))).await.unwrap();
    db.insert("newsletter_subscribers", fields(json!({"email": "a@b.org"})))
        .await
        .unwrap();

    let stats = db.purge_all().unwrap();

    assert_eq!(stats.documents, 2);
    assert_eq!(db.count("donations", &Query::new()).await.unwrap(), 0);
    assert_eq!(
        db.count("newsletter_subscribers", &Query::new()).await.unwrap(),
        0
    );
}

#[tokio::test]
async fn test_records_persist_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let id = {
        let db = Database::open(dir.path().join("data")).unwrap();
        db.insert("donations", fields(json!({"amount": 10}))).await.unwrap()
    };

    let db = Database::open(dir.path().join("data")).unwrap();
    assert!(db.get("donations", &id).await.unwrap().is_some());
}
