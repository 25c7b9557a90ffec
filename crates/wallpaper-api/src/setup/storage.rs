//! Object storage backend selection.
//!
//! `wallpaper-core::Config` carries S3 connection details unconditionally
//! (matching a real deployment); `STORAGE_BACKEND` picks between the real S3
//! backend and `LocalStorage` for local development and tests, the same
//! env-var switch the teacher's `create_storage` uses.

use std::sync::Arc;

use anyhow::Result;
use wallpaper_core::Config;
use wallpaper_storage::{LocalStorage, S3Storage, Storage};

pub fn setup_storage(config: &Config) -> Result<Arc<dyn Storage>> {
    let backend = std::env::var("STORAGE_BACKEND").unwrap_or_else(|_| "s3".to_string());

    let storage: Arc<dyn Storage> = match backend.as_str() {
        "local" => {
            let root = std::env::var("LOCAL_STORAGE_ROOT").unwrap_or_else(|_| "./data/storage".to_string());
            tracing::info!(root = %root, "using local filesystem storage backend");
            Arc::new(LocalStorage::new(root))
        }
        _ => {
            tracing::info!(bucket = config.s3_bucket(), "using S3 storage backend");
            Arc::new(S3Storage::new(
                config.s3_bucket().to_string(),
                config.s3_region().to_string(),
                config.s3_endpoint().map(String::from),
                config.s3_access_key_id().map(String::from),
                config.s3_secret_access_key().map(String::from),
            )?)
        }
    };

    Ok(storage)
}
