use crate::traits::{ObjectMeta, Storage, StorageError, StorageResult};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path;
use object_store::{Error as ObjectStoreError, ListResult, ObjectStore, PutPayload};

/// S3-compatible object storage, built from `object_store`'s AWS backend.
/// One bucket is bound at construction time; the content-addressed key
/// scheme (`{id}/original.{ext}`) means callers never need to pick a prefix.
#[derive(Clone)]
pub struct S3Storage {
    store: AmazonS3,
    bucket: String,
}

impl S3Storage {
    pub fn new(
        bucket: String,
        region: String,
        endpoint: Option<String>,
        access_key_id: Option<String>,
        secret_access_key: Option<String>,
    ) -> StorageResult<Self> {
        let mut builder = AmazonS3Builder::from_env()
            .with_region(region)
            .with_bucket_name(bucket.clone());

        if let Some(key_id) = access_key_id {
            builder = builder.with_access_key_id(key_id);
        }
        if let Some(secret) = secret_access_key {
            builder = builder.with_secret_access_key(secret);
        }
        if let Some(endpoint) = endpoint {
            let allow_http = endpoint.starts_with("http://");
            builder = builder.with_endpoint(endpoint).with_allow_http(allow_http);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::Permanent(e.to_string()))?;

        Ok(S3Storage { store, bucket })
    }

    fn classify(e: ObjectStoreError) -> StorageError {
        match e {
            ObjectStoreError::NotFound { path, .. } => StorageError::NotFound(path),
            ObjectStoreError::InvalidPath { .. } | ObjectStoreError::NotImplemented => {
                StorageError::Permanent(e.to_string())
            }
            other => StorageError::Transient(other.to_string()),
        }
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn put(
        &self,
        _bucket: &str,
        key: &str,
        body: Bytes,
        _content_type: &str,
    ) -> StorageResult<()> {
        let start = std::time::Instant::now();
        let size = body.len() as u64;
        let location = Path::from(key.to_string());

        self.store
            .put(&location, PutPayload::from(body))
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e, bucket = %self.bucket, key = %key, size_bytes = size,
                    "object put failed"
                );
                Self::classify(e)
            })?;

        tracing::info!(
            bucket = %self.bucket, key = %key, size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "object put succeeded"
        );
        Ok(())
    }

    async fn head(&self, _bucket: &str, key: &str) -> StorageResult<Option<ObjectMeta>> {
        let location = Path::from(key.to_string());
        match self.store.head(&location).await {
            Ok(meta) => Ok(Some(ObjectMeta {
                key: key.to_string(),
                size: meta.size as u64,
            })),
            Err(ObjectStoreError::NotFound { .. }) => Ok(None),
            Err(e) => Err(Self::classify(e)),
        }
    }

    async fn get(&self, _bucket: &str, key: &str) -> StorageResult<Option<Bytes>> {
        let location = Path::from(key.to_string());
        match self.store.get(&location).await {
            Ok(result) => {
                let bytes = result.bytes().await.map_err(Self::classify)?;
                Ok(Some(bytes))
            }
            Err(ObjectStoreError::NotFound { .. }) => Ok(None),
            Err(e) => Err(Self::classify(e)),
        }
    }

    async fn delete(&self, _bucket: &str, key: &str) -> StorageResult<()> {
        let location = Path::from(key.to_string());
        match self.store.delete(&location).await {
            Ok(()) | Err(ObjectStoreError::NotFound { .. }) => {
                tracing::info!(bucket = %self.bucket, key = %key, "object delete succeeded");
                Ok(())
            }
            Err(e) => Err(Self::classify(e)),
        }
    }

    async fn list(
        &self,
        _bucket: &str,
        prefix: &str,
        page_token: Option<String>,
    ) -> StorageResult<(Vec<ObjectMeta>, Option<String>)> {
        let prefix_path = if prefix.is_empty() {
            None
        } else {
            Some(Path::from(prefix.to_string()))
        };

        let offset = page_token.map(Path::from);
        let result: ListResult = match offset {
            Some(offset) => self
                .store
                .list_with_offset(prefix_path.as_ref(), &offset)
                .collect::<Vec<_>>()
                .await
                .into_iter()
                .collect::<Result<Vec<_>, _>>()
                .map(|items| ListResult {
                    objects: items,
                    common_prefixes: vec![],
                })
                .map_err(Self::classify)?,
            None => self
                .store
                .list(prefix_path.as_ref())
                .collect::<Vec<_>>()
                .await
                .into_iter()
                .collect::<Result<Vec<_>, _>>()
                .map(|items| ListResult {
                    objects: items,
                    common_prefixes: vec![],
                })
                .map_err(Self::classify)?,
        };

        let next_token = result.objects.last().map(|o| o.location.to_string());
        let objects = result
            .objects
            .into_iter()
            .map(|o| ObjectMeta {
                key: o.location.to_string(),
                size: o.size as u64,
            })
            .collect();

        Ok((objects, next_token))
    }
}
