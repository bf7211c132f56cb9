//! Shared test helpers for in-crate tests.

use std::sync::Arc;

use crate::config::{Config, NodeConfig, StorageConfig, UploadConfig};
use crate::identity::{Actor, AdminTokens};
use crate::object_store::LocalStore;
use crate::storage::Database;
use crate::AppState;

pub const ADMIN_TOKEN: &str = "test-admin-token";

/// Create a test AppState with a temporary database and local object store.
pub fn test_state(temp_dir: &tempfile::TempDir) -> Arc<AppState> {
    let data_dir = temp_dir.path().join("data");
    let files_dir = temp_dir.path().join("files");

    let mut admin_tokens = AdminTokens::default();
    admin_tokens.insert(ADMIN_TOKEN, Actor::new("admin-1", "admin@example.org"));

    let config = Config {
        node: NodeConfig {
            bind_address: "127.0.0.1:0".to_string(),
            data_dir: data_dir.to_string_lossy().to_string(),
            public_base_url: "http://127.0.0.1".to_string(),
        },
        storage: StorageConfig::default(),
        upload: UploadConfig {
            chunk_size: 1024,
            ..Default::default()
        },
        admin_tokens,
        test_mode: true,
    };

    let db = Database::open(&data_dir).expect("Failed to open test database");
    let object_store = LocalStore::new(
        &files_dir,
        &config.node.public_base_url,
        config.upload.chunk_size,
    )
    .expect("Failed to create test object store");

    Arc::new(AppState::new(config, db, Arc::new(object_store)))
}
