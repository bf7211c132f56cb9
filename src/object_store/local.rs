use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Component, Path, PathBuf};
use tokio::io::AsyncWriteExt;

use super::{ObjectStore, ObjectStoreError, ProgressSink, StoredObject, PATH};

/// Prefix of in-flight temporary files inside the store directory.
const TEMP_PREFIX: &str = ".upload-";

/// Local filesystem object store for development and testing.
///
/// Objects are written to a temporary file and renamed into place once the
/// whole payload is on disk, so a failed or dropped upload never leaves a
/// partial object behind.
pub struct LocalStore {
    base_path: PathBuf,
    public_base_url: String,
    chunk_size: usize,
}

impl LocalStore {
    pub fn new<P: AsRef<Path>>(
        base_path: P,
        public_base_url: &str,
        chunk_size: usize,
    ) -> Result<Self, std::io::Error> {
        let base_path = base_path.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_path)?;
        Ok(Self {
            base_path,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            chunk_size: chunk_size.max(1),
        })
    }

    /// Resolve an object path inside the store, refusing anything that could
    /// escape the base directory.
    fn object_path(&self, path: &str) -> Result<PathBuf, ObjectStoreError> {
        let relative = Path::new(path);
        let clean = !path.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !clean {
            return Err(ObjectStoreError::backend(
                "invalid-path",
                format!("invalid object path: {path}"),
            ));
        }
        Ok(self.base_path.join(relative))
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn upload(
        &self,
        path: &str,
        data: Bytes,
        progress: ProgressSink,
    ) -> Result<StoredObject, ObjectStoreError> {
        let dest = self.object_path(path)?;
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let temp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile_in(&self.base_path)?;
        let (std_file, temp_path) = temp.into_parts();
        let mut file = tokio::fs::File::from_std(std_file);

        let total = data.len() as u64;
        let mut written = 0u64;
        if total == 0 {
            progress.report(0, 0);
        }
        for chunk in data.chunks(self.chunk_size) {
            file.write_all(chunk).await?;
            written += chunk.len() as u64;
            progress.report(written, total);
        }
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        temp_path.persist(&dest).map_err(|e| e.error)?;

        tracing::debug!(path = %path, bytes = total, "Stored object on local disk");
        Ok(StoredObject {
            path: path.to_string(),
            byte_size: total,
        })
    }

    async fn public_url(&self, object: &StoredObject) -> Result<String, ObjectStoreError> {
        if !self.exists(&object.path).await? {
            return Err(ObjectStoreError::NotFound(object.path.clone()));
        }
        Ok(format!(
            "{}/media/{}",
            self.public_base_url,
            percent_encoding::utf8_percent_encode(&object.path, PATH)
        ))
    }

    async fn get(&self, path: &str) -> Result<Bytes, ObjectStoreError> {
        let file = self.object_path(path)?;
        if !file.is_file() {
            return Err(ObjectStoreError::NotFound(path.to_string()));
        }
        let data = tokio::fs::read(&file).await?;
        Ok(Bytes::from(data))
    }

    async fn delete(&self, path: &str) -> Result<(), ObjectStoreError> {
        let file = self.object_path(path)?;
        if file.is_file() {
            tokio::fs::remove_file(&file).await?;
        }
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool, ObjectStoreError> {
        let file = self.object_path(path)?;
        Ok(file.is_file())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, ObjectStoreError> {
        let mut found = Vec::new();
        let mut pending = vec![(self.base_path.clone(), String::new())];

        while let Some((dir, relative)) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let name = entry.file_name().to_string_lossy().to_string();
                if name.starts_with(TEMP_PREFIX) {
                    continue;
                }
                let key = if relative.is_empty() {
                    name
                } else {
                    format!("{relative}/{name}")
                };
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    pending.push((entry.path(), key));
                } else if key.starts_with(prefix) {
                    found.push(key);
                }
            }
        }

        found.sort();
        Ok(found)
    }
}
