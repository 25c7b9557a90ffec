use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;

pub type StorageResult<T> = Result<T, StorageError>;
pub type ByteStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send>>;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("transient storage failure: {0}")]
    Transient(String),
    #[error("permanent storage failure: {0}")]
    Permanent(String),
}

impl StorageError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StorageError::Transient(_))
    }
}

#[derive(Debug, Clone)]
pub struct ObjectMeta {
    pub key: String,
    pub size: u64,
}

/// Minimal, testable object-store contract (4.B). Backends classify every
/// failure as transient (worth retrying) or permanent (fail fast).
#[async_trait]
pub trait Storage: Send + Sync {
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> StorageResult<()>;

    async fn head(&self, bucket: &str, key: &str) -> StorageResult<Option<ObjectMeta>>;

    /// Used only by the stuck-uploads reconciler to re-derive metadata when
    /// an object was durably written but the row never recorded it.
    async fn get(&self, bucket: &str, key: &str) -> StorageResult<Option<Bytes>>;

    async fn delete(&self, bucket: &str, key: &str) -> StorageResult<()>;

    /// Pages through keys under `prefix`; `page_token` is backend-opaque and
    /// returned alongside the page when more keys remain.
    async fn list(
        &self,
        bucket: &str,
        prefix: &str,
        page_token: Option<String>,
    ) -> StorageResult<(Vec<ObjectMeta>, Option<String>)>;
}
