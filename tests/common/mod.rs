//! Test doubles shared by the integration tests.
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{TimeZone, Utc};
use serde_json::{Map, Value};

use outreach_admin::object_store::{ObjectStore, ObjectStoreError, ProgressSink, StoredObject};
use outreach_admin::storage::{Document, DocumentStore, DocumentStoreError, Query};

// ============================================================================
// Object store double
// ============================================================================

/// How the next `upload` call behaves.
pub enum UploadScript {
    /// Report progress in quarters, then store the object.
    Succeed,
    /// Fail immediately with the error built by the closure.
    Fail(Box<dyn Fn() -> ObjectStoreError + Send + Sync>),
    /// Send each `(delay, bytes_transferred)` tick after sleeping `delay`,
    /// then store the object.
    Ticks(Vec<(Duration, u64)>),
    /// Report 0% and never finish.
    Hang,
}

/// In-memory object store that counts every call it receives.
pub struct ScriptedObjectStore {
    script: Mutex<UploadScript>,
    objects: Mutex<BTreeMap<String, Bytes>>,
    pub uploads: AtomicUsize,
    pub deletes: AtomicUsize,
    pub public_urls: AtomicUsize,
    pub fail_deletes: AtomicBool,
    pub fail_public_url: AtomicBool,
}

impl ScriptedObjectStore {
    pub fn new(script: UploadScript) -> Self {
        Self {
            script: Mutex::new(script),
            objects: Mutex::new(BTreeMap::new()),
            uploads: AtomicUsize::new(0),
            deletes: AtomicUsize::new(0),
            public_urls: AtomicUsize::new(0),
            fail_deletes: AtomicBool::new(false),
            fail_public_url: AtomicBool::new(false),
        }
    }

    pub fn succeeding() -> Self {
        Self::new(UploadScript::Succeed)
    }

    pub fn failing(make: impl Fn() -> ObjectStoreError + Send + Sync + 'static) -> Self {
        Self::new(UploadScript::Fail(Box::new(make)))
    }

    /// Place an object directly, bypassing the upload path.
    pub fn seed(&self, path: &str, data: &'static [u8]) {
        self.objects
            .lock()
            .unwrap()
            .insert(path.to_string(), Bytes::from_static(data));
    }

    pub fn paths(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.objects.lock().unwrap().contains_key(path)
    }

    /// Total number of calls that touched storage.
    pub fn calls(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
            + self.deletes.load(Ordering::SeqCst)
            + self.public_urls.load(Ordering::SeqCst)
    }

    fn store(&self, path: &str, data: Bytes) -> StoredObject {
        let byte_size = data.len() as u64;
        self.objects.lock().unwrap().insert(path.to_string(), data);
        StoredObject {
            path: path.to_string(),
            byte_size,
        }
    }
}

#[async_trait]
impl ObjectStore for ScriptedObjectStore {
    async fn upload(
        &self,
        path: &str,
        data: Bytes,
        progress: ProgressSink,
    ) -> Result<StoredObject, ObjectStoreError> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        let total = data.len() as u64;

        let ticks = {
            let script = self.script.lock().unwrap();
            match &*script {
                UploadScript::Succeed => {
                    Some((1..=4).map(|q| (Duration::ZERO, total * q / 4)).collect())
                }
                UploadScript::Fail(make) => return Err(make()),
                UploadScript::Ticks(ticks) => Some(ticks.clone()),
                UploadScript::Hang => None,
            }
        };

        let Some(ticks) = ticks else {
            progress.report(0, total);
            return std::future::pending().await;
        };

        for (delay, bytes) in ticks {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            progress.report(bytes, total);
        }

        Ok(self.store(path, data))
    }

    async fn public_url(&self, object: &StoredObject) -> Result<String, ObjectStoreError> {
        self.public_urls.fetch_add(1, Ordering::SeqCst);
        if self.fail_public_url.load(Ordering::SeqCst) {
            return Err(ObjectStoreError::backend("url-unavailable", "no public URL"));
        }
        Ok(format!("https://cdn.example.org/{}", object.path))
    }

    async fn get(&self, path: &str) -> Result<Bytes, ObjectStoreError> {
        self.objects
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| ObjectStoreError::NotFound(path.to_string()))
    }

    async fn delete(&self, path: &str) -> Result<(), ObjectStoreError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(ObjectStoreError::PermissionDenied(path.to_string()));
        }
        self.objects.lock().unwrap().remove(path);
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool, ObjectStoreError> {
        Ok(self.contains(path))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, ObjectStoreError> {
        Ok(self
            .paths()
            .into_iter()
            .filter(|p| p.starts_with(prefix))
            .collect())
    }
}

// ============================================================================
// Document store double
// ============================================================================

/// In-memory document store that counts inserts and can refuse them.
#[derive(Default)]
pub struct RecordingDocumentStore {
    docs: Mutex<Vec<Document>>,
    pub inserts: AtomicUsize,
    pub fail_inserts: AtomicBool,
    insert_delay: Mutex<Option<Duration>>,
}

impl RecordingDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_inserts() -> Self {
        let store = Self::default();
        store.fail_inserts.store(true, Ordering::SeqCst);
        store
    }

    /// Every insert sleeps for `delay` before it is recorded.
    pub fn slow_inserts(delay: Duration) -> Self {
        let store = Self::default();
        *store.insert_delay.lock().unwrap() = Some(delay);
        store
    }

    pub fn len(&self) -> usize {
        self.docs.lock().unwrap().len()
    }
}

#[async_trait]
impl DocumentStore for RecordingDocumentStore {
    async fn insert(
        &self,
        collection: &str,
        fields: Map<String, Value>,
    ) -> Result<String, DocumentStoreError> {
        let delay = *self.insert_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let n = self.inserts.fetch_add(1, Ordering::SeqCst);
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(DocumentStoreError::PermissionDenied(
                "insert refused".to_string(),
            ));
        }

        let id = format!("doc-{n:04}");
        let created_at = Utc
            .timestamp_opt(1_700_000_000 + n as i64, 0)
            .single()
            .expect("valid timestamp");
        self.docs.lock().unwrap().push(Document {
            id: id.clone(),
            collection: collection.to_string(),
            created_at,
            fields,
        });
        Ok(id)
    }

    async fn get(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Document>, DocumentStoreError> {
        Ok(self
            .docs
            .lock()
            .unwrap()
            .iter()
            .find(|d| d.collection == collection && d.id == id)
            .cloned())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, DocumentStoreError> {
        let mut docs = self.docs.lock().unwrap();
        let before = docs.len();
        docs.retain(|d| !(d.collection == collection && d.id == id));
        Ok(docs.len() != before)
    }

    async fn query(
        &self,
        collection: &str,
        query: &Query,
    ) -> Result<Vec<Document>, DocumentStoreError> {
        let docs = self.docs.lock().unwrap();
        Ok(query.apply(docs.iter().filter(|d| d.collection == collection).cloned()))
    }
}
