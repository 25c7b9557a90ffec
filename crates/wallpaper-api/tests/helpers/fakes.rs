//! In-memory stand-ins for the relational store, object store, event bus and
//! rate-limit KV store, so these integration tests don't need a live
//! Postgres/S3/NATS/Redis to exercise the HTTP surface.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use wallpaper_core::error::AppResult;
use wallpaper_core::model::{FileType, UploadState, Wallpaper};
use wallpaper_db::{StatePatch, WallpaperRepository};
use wallpaper_events::{EventBus, EventError};
use wallpaper_kv::{KvError, KvStore};
use wallpaper_storage::{ObjectMeta, Storage, StorageResult};

#[derive(Default)]
pub struct FakeRepository {
    rows: Mutex<HashMap<String, Wallpaper>>,
}

impl FakeRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WallpaperRepository for FakeRepository {
    async fn insert_intent(&self, id: &str, user_id: &str) -> AppResult<Wallpaper> {
        let now = Utc::now();
        let row = Wallpaper {
            id: id.to_string(),
            user_id: user_id.to_string(),
            content_hash: None,
            upload_state: UploadState::Initiated,
            state_changed_at: now,
            upload_attempts: 0,
            processing_error: None,
            file_type: None,
            mime_type: None,
            file_size_bytes: None,
            width: None,
            height: None,
            aspect_ratio: None,
            original_filename: None,
            storage_key: None,
            storage_bucket: None,
            uploaded_at: now,
            updated_at: now,
        };
        self.rows.lock().unwrap().insert(id.to_string(), row.clone());
        Ok(row)
    }

    async fn find_by_user_hash(&self, user_id: &str, content_hash: &str) -> AppResult<Option<Wallpaper>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .values()
            .find(|r| {
                r.user_id == user_id
                    && r.content_hash.as_deref() == Some(content_hash)
                    && r.upload_state.is_dedup_eligible()
            })
            .cloned())
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<Wallpaper>> {
        Ok(self.rows.lock().unwrap().get(id).cloned())
    }

    async fn update_state(
        &self,
        id: &str,
        from: UploadState,
        to: UploadState,
        patch: StatePatch,
    ) -> AppResult<Option<Wallpaper>> {
        let mut rows = self.rows.lock().unwrap();
        let Some(row) = rows.get_mut(id) else {
            return Ok(None);
        };
        if row.upload_state != from {
            return Ok(None);
        }

        row.upload_state = to;
        row.state_changed_at = Utc::now();
        row.updated_at = Utc::now();
        if let Some(hash) = patch.content_hash {
            row.content_hash = Some(hash);
        }
        if let Some(err) = patch.processing_error {
            row.processing_error = err;
        }
        if let Some(attempts) = patch.upload_attempts {
            row.upload_attempts = attempts;
        }
        if let Some(ft) = patch.file_type {
            row.file_type = Some(ft);
        }
        if let Some(mime) = patch.mime_type {
            row.mime_type = Some(mime);
        }
        if let Some(size) = patch.file_size_bytes {
            row.file_size_bytes = Some(size);
        }
        if let Some(w) = patch.width {
            row.width = Some(w);
        }
        if let Some(h) = patch.height {
            row.height = Some(h);
        }
        if let (Some(w), Some(h)) = (row.width, row.height) {
            if h != 0 {
                row.aspect_ratio = Some(w as f64 / h as f64);
            }
        }
        if let Some(name) = patch.original_filename {
            row.original_filename = Some(name);
        }
        if let Some(key) = patch.storage_key {
            row.storage_key = Some(key);
        }
        if let Some(bucket) = patch.storage_bucket {
            row.storage_bucket = Some(bucket);
        }

        Ok(Some(row.clone()))
    }

    async fn select_stuck(
        &self,
        state: UploadState,
        older_than: chrono::DateTime<Utc>,
        limit: i64,
    ) -> AppResult<Vec<Wallpaper>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .values()
            .filter(|r| r.upload_state == state && r.state_changed_at < older_than)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn delete_by_ids(&self, ids: &[String]) -> AppResult<u64> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|id, _| !ids.contains(id));
        Ok((before - rows.len()) as u64)
    }
}

#[derive(Default)]
pub struct FakeStorage {
    objects: Mutex<HashMap<String, Bytes>>,
}

impl FakeStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn object_key(bucket: &str, key: &str) -> String {
        format!("{bucket}/{key}")
    }
}

#[async_trait]
impl Storage for FakeStorage {
    async fn put(&self, bucket: &str, key: &str, body: Bytes, _content_type: &str) -> StorageResult<()> {
        self.objects.lock().unwrap().insert(Self::object_key(bucket, key), body);
        Ok(())
    }

    async fn head(&self, bucket: &str, key: &str) -> StorageResult<Option<ObjectMeta>> {
        let objects = self.objects.lock().unwrap();
        Ok(objects.get(&Self::object_key(bucket, key)).map(|b| ObjectMeta {
            key: key.to_string(),
            size: b.len() as u64,
        }))
    }

    async fn get(&self, bucket: &str, key: &str) -> StorageResult<Option<Bytes>> {
        Ok(self.objects.lock().unwrap().get(&Self::object_key(bucket, key)).cloned())
    }

    async fn delete(&self, bucket: &str, key: &str) -> StorageResult<()> {
        self.objects.lock().unwrap().remove(&Self::object_key(bucket, key));
        Ok(())
    }

    async fn list(
        &self,
        bucket: &str,
        prefix: &str,
        _page_token: Option<String>,
    ) -> StorageResult<(Vec<ObjectMeta>, Option<String>)> {
        let full_prefix = Self::object_key(bucket, prefix);
        let objects = self.objects.lock().unwrap();
        let matches = objects
            .iter()
            .filter(|(k, _)| k.starts_with(&full_prefix))
            .map(|(k, v)| ObjectMeta {
                key: k.trim_start_matches(&format!("{bucket}/")).to_string(),
                size: v.len() as u64,
            })
            .collect();
        Ok((matches, None))
    }
}

pub struct FakeEventBus {
    published: Mutex<Vec<(String, Vec<u8>)>>,
    fail_publish: bool,
}

impl FakeEventBus {
    pub fn new() -> Self {
        Self {
            published: Mutex::new(Vec::new()),
            fail_publish: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            published: Mutex::new(Vec::new()),
            fail_publish: true,
        }
    }

    pub fn published_subjects(&self) -> Vec<String> {
        self.published.lock().unwrap().iter().map(|(s, _)| s.clone()).collect()
    }
}

#[async_trait]
impl EventBus for FakeEventBus {
    async fn ensure_stream(&self, _name: &str, _subjects: &[String]) -> Result<(), EventError> {
        Ok(())
    }

    async fn health_check(&self) -> Result<(), EventError> {
        if self.fail_publish {
            return Err(EventError::Transient("fake event bus down".to_string()));
        }
        Ok(())
    }

    async fn publish(
        &self,
        subject: &str,
        payload: Vec<u8>,
        _headers: HashMap<String, String>,
    ) -> Result<(), EventError> {
        if self.fail_publish {
            return Err(EventError::Transient("fake event bus down".to_string()));
        }
        self.published.lock().unwrap().push((subject.to_string(), payload));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeKv {
    counts: Mutex<HashMap<String, i64>>,
}

impl FakeKv {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for FakeKv {
    async fn incr_with_expiry(&self, key: &str, window_ms: u64) -> Result<(i64, i64), KvError> {
        let mut counts = self.counts.lock().unwrap();
        let count = counts.entry(key.to_string()).or_insert(0);
        *count += 1;
        Ok((*count, window_ms as i64))
    }

    async fn flush_for_tests(&self) -> Result<(), KvError> {
        self.counts.lock().unwrap().clear();
        Ok(())
    }
}

/// Always reports the KV store unreachable, so the rate limiter fails open.
pub struct UnreachableKv;

#[async_trait]
impl KvStore for UnreachableKv {
    async fn incr_with_expiry(&self, _key: &str, _window_ms: u64) -> Result<(i64, i64), KvError> {
        Err(KvError::Unreachable("down".to_string()))
    }

    async fn flush_for_tests(&self) -> Result<(), KvError> {
        Ok(())
    }
}
