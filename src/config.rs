use std::time::Duration;

use thiserror::Error;

use crate::gallery::UploadSettings;
use crate::identity::AdminTokens;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub node: NodeConfig,
    pub storage: StorageConfig,
    pub upload: UploadConfig,
    /// Bearer tokens accepted for admin routes
    pub admin_tokens: AdminTokens,
    /// Enables dangerous operations like purge. Must never be true in production.
    pub test_mode: bool,
}

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub bind_address: String,
    pub data_dir: String,
    /// Base URL this service is reachable at, used for local media URLs
    pub public_base_url: String,
}

#[derive(Debug, Clone)]
pub enum StorageBackend {
    Gcs,
    Local,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Directory for local storage backend
    pub local_storage_path: String,
    /// GCS bucket name (required when backend is gcs)
    pub gcs_bucket: Option<String>,
    /// Path to GCS service account JSON (optional, defaults to ADC)
    pub gcs_credentials_file: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Maximum upload size in bytes
    pub max_upload_size: u64,
    /// Seconds at 0% before an upload is reported as stalled
    pub stall_timeout_secs: u64,
    /// Bytes per progress step when transferring to object storage
    pub chunk_size: usize,
    /// Orphans younger than this are left alone by the sweep
    pub orphan_min_age_secs: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            data_dir: "./data".to_string(),
            public_base_url: "http://localhost:8080".to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Local,
            local_storage_path: "./files".to_string(),
            gcs_bucket: None,
            gcs_credentials_file: None,
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_upload_size: 5 * 1024 * 1024, // 5MB
            stall_timeout_secs: 10,
            chunk_size: 256 * 1024,
            orphan_min_age_secs: 3600,
        }
    }
}

impl UploadConfig {
    pub fn settings(&self) -> UploadSettings {
        UploadSettings {
            max_upload_bytes: self.max_upload_size,
            stall_timeout: Duration::from_secs(self.stall_timeout_secs),
        }
    }

    pub fn orphan_min_age(&self) -> Duration {
        Duration::from_secs(self.orphan_min_age_secs)
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

fn env_flag(key: &str) -> bool {
    std::env::var(key).is_ok_and(|v| v == "true" || v == "1")
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let node = NodeConfig::default();
        let storage = StorageConfig::default();
        let upload = UploadConfig::default();

        let backend = match env_or("STORAGE_BACKEND", "local").to_lowercase().as_str() {
            "gcs" => StorageBackend::Gcs,
            "local" => StorageBackend::Local,
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "STORAGE_BACKEND must be local or gcs, got {other:?}"
                )))
            }
        };

        let config = Config {
            node: NodeConfig {
                bind_address: env_or("BIND_ADDRESS", &node.bind_address),
                data_dir: env_or("DATA_DIR", &node.data_dir),
                public_base_url: env_or("PUBLIC_BASE_URL", &node.public_base_url),
            },
            storage: StorageConfig {
                backend,
                local_storage_path: env_or("LOCAL_STORAGE_PATH", &storage.local_storage_path),
                gcs_bucket: std::env::var("GCS_BUCKET").ok(),
                gcs_credentials_file: std::env::var("GCS_CREDENTIALS_FILE").ok(),
            },
            upload: UploadConfig {
                max_upload_size: env_parse("MAX_UPLOAD_SIZE").unwrap_or(upload.max_upload_size),
                stall_timeout_secs: env_parse("UPLOAD_STALL_TIMEOUT_SECS")
                    .unwrap_or(upload.stall_timeout_secs),
                chunk_size: env_parse("UPLOAD_CHUNK_SIZE").unwrap_or(upload.chunk_size),
                orphan_min_age_secs: env_parse("ORPHAN_MIN_AGE_SECS")
                    .unwrap_or(upload.orphan_min_age_secs),
            },
            admin_tokens: AdminTokens::parse(&env_or("ADMIN_TOKENS", "")),
            test_mode: env_flag("TEST_MODE"),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if matches!(self.storage.backend, StorageBackend::Gcs) && self.storage.gcs_bucket.is_none()
        {
            return Err(ConfigError::ValidationError(
                "GCS_BUCKET is required when STORAGE_BACKEND=gcs".to_string(),
            ));
        }

        if self.upload.max_upload_size == 0 {
            return Err(ConfigError::ValidationError(
                "MAX_UPLOAD_SIZE must be greater than 0".to_string(),
            ));
        }

        if self.upload.chunk_size == 0 {
            return Err(ConfigError::ValidationError(
                "UPLOAD_CHUNK_SIZE must be greater than 0".to_string(),
            ));
        }

        if self.admin_tokens.is_empty() {
            tracing::warn!("ADMIN_TOKENS is empty. Admin routes will reject every request.");
        }

        Ok(())
    }
}
