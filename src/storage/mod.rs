use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{Config, StorageBackend};
use crate::errors::{AppError, Result};

pub mod local;
pub mod s3;

/// Pass-through to the external object-storage service. Stateless; every
/// operation is a single round trip and failures surface as
/// `AppError::Storage` with no retry at this layer.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put_object(&self, key: &str, bytes: Vec<u8>, content_type: Option<&str>)
        -> Result<()>;

    /// Produces a time-limited URL granting read access by possession alone.
    /// Once issued it cannot be revoked before expiry.
    async fn issue_retrieval_url(&self, key: &str, ttl: Duration) -> Result<String>;

    async fn delete_object(&self, key: &str) -> Result<()>;
}

pub async fn create_store(config: &Config) -> Result<Arc<dyn ObjectStore>> {
    match config.storage_backend {
        StorageBackend::S3 => {
            let bucket = config
                .s3_bucket
                .as_ref()
                .ok_or_else(|| AppError::Config("S3 bucket not configured".to_string()))?;
            let store = s3::S3Store::new(bucket.clone()).await;
            Ok(Arc::new(store))
        }
        StorageBackend::Local => {
            let path = config
                .local_storage_path
                .as_ref()
                .ok_or_else(|| AppError::Config("Local storage path not configured".to_string()))?;
            let store = local::LocalStore::new(path, config.local_storage_public_url.clone())?;
            Ok(Arc::new(store))
        }
    }
}
