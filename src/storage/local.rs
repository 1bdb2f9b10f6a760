use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

use crate::{
    errors::{AppError, Result},
    storage::ObjectStore,
};

/// Filesystem-backed store for development and tests. Retrieval URLs are
/// unsigned; the expiry is advisory only, unlike the S3 backend where the
/// signature itself enforces it.
pub struct LocalStore {
    base_path: PathBuf,
    public_base_url: String,
}

impl LocalStore {
    pub fn new<P: AsRef<Path>>(base_path: P, public_base_url: String) -> Result<Self> {
        let base_path = base_path.as_ref().to_path_buf();

        std::fs::create_dir_all(&base_path)
            .map_err(|e| AppError::Storage(format!("Failed to create storage directory: {}", e)))?;

        Ok(Self {
            base_path,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn full_path(&self, key: &str) -> PathBuf {
        self.base_path.join(key)
    }

    pub async fn exists(&self, key: &str) -> bool {
        fs::metadata(self.full_path(key)).await.is_ok()
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn put_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        _content_type: Option<&str>,
    ) -> Result<()> {
        let full_path = self.full_path(key);

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::Storage(format!("Failed to create directory: {}", e)))?;
        }

        fs::write(&full_path, bytes)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to write object: {}", e)))?;

        Ok(())
    }

    async fn issue_retrieval_url(&self, key: &str, ttl: Duration) -> Result<String> {
        let expires = Utc::now().timestamp() + ttl.as_secs() as i64;
        Ok(format!("{}/{}?expires={}", self.public_base_url, key, expires))
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.full_path(key)).await {
            Ok(()) => Ok(()),
            // Deleting an absent object succeeds, matching S3 semantics.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Storage(format!("Failed to delete object: {}", e))),
        }
    }
}
