use crate::traits::{ObjectMeta, Storage, StorageError, StorageResult};
use async_trait::async_trait;
use bytes::Bytes;
use std::path::PathBuf;
use tokio::fs;

/// Filesystem-backed storage for local development and tests. Ignores the
/// `bucket` argument other than using it as the root directory name, since
/// there is exactly one configured bucket per spec's object-store layout.
#[derive(Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        LocalStorage { root: root.into() }
    }

    fn path_for(&self, bucket: &str, key: &str) -> PathBuf {
        self.root.join(bucket).join(key)
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        _content_type: &str,
    ) -> StorageResult<()> {
        let path = self.path_for(bucket, key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::Transient(e.to_string()))?;
        }
        fs::write(&path, &body)
            .await
            .map_err(|e| StorageError::Transient(e.to_string()))?;
        tracing::info!(bucket, key, size_bytes = body.len(), "local object put succeeded");
        Ok(())
    }

    async fn head(&self, bucket: &str, key: &str) -> StorageResult<Option<ObjectMeta>> {
        let path = self.path_for(bucket, key);
        match fs::metadata(&path).await {
            Ok(meta) => Ok(Some(ObjectMeta {
                key: key.to_string(),
                size: meta.len(),
            })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Transient(e.to_string())),
        }
    }

    async fn get(&self, bucket: &str, key: &str) -> StorageResult<Option<Bytes>> {
        let path = self.path_for(bucket, key);
        match fs::read(&path).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Transient(e.to_string())),
        }
    }

    async fn delete(&self, bucket: &str, key: &str) -> StorageResult<()> {
        let path = self.path_for(bucket, key);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Transient(e.to_string())),
        }
    }

    async fn list(
        &self,
        bucket: &str,
        prefix: &str,
        _page_token: Option<String>,
    ) -> StorageResult<(Vec<ObjectMeta>, Option<String>)> {
        let base = self.root.join(bucket);
        if !base.exists() {
            return Ok((vec![], None));
        }

        let mut out = Vec::new();
        let mut stack = vec![base.clone()];
        while let Some(dir) = stack.pop() {
            let mut entries = fs::read_dir(&dir)
                .await
                .map_err(|e| StorageError::Transient(e.to_string()))?;
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| StorageError::Transient(e.to_string()))?
            {
                let path = entry.path();
                if path.is_dir() {
                    stack.push(path);
                    continue;
                }
                let rel = path
                    .strip_prefix(&base)
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/");
                if rel.starts_with(prefix) {
                    let size = entry
                        .metadata()
                        .await
                        .map_err(|e| StorageError::Transient(e.to_string()))?
                        .len();
                    out.push(ObjectMeta { key: rel, size });
                }
            }
        }
        out.sort_by(|a, b| a.key.cmp(&b.key));
        Ok((out, None))
    }
}
