//! In-memory `WallpaperRepository`/`Storage`/`EventBus` doubles for the
//! reconciler tests, mirroring the `FakeKv` pattern in
//! `wallpaper-kv::rate_limiter`'s own test module.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use wallpaper_core::error::AppResult;
use wallpaper_core::model::{UploadState, Wallpaper};
use wallpaper_db::{StatePatch, WallpaperRepository};
use wallpaper_events::{EventBus, EventError};
use wallpaper_storage::{ObjectMeta, Storage, StorageResult};

#[derive(Default)]
pub struct FakeRepository {
    rows: Mutex<HashMap<String, Wallpaper>>,
}

impl FakeRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, row: Wallpaper) {
        self.rows.lock().unwrap().insert(row.id.clone(), row);
    }

    pub fn get(&self, id: &str) -> Option<Wallpaper> {
        self.rows.lock().unwrap().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }
}

pub fn row_in_state(id: &str, user_id: &str, state: UploadState, state_changed_at: DateTime<Utc>) -> Wallpaper {
    Wallpaper {
        id: id.to_string(),
        user_id: user_id.to_string(),
        content_hash: None,
        upload_state: state,
        state_changed_at,
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
        uploaded_at: state_changed_at,
        updated_at: state_changed_at,
    }
}

#[async_trait]
impl WallpaperRepository for FakeRepository {
    async fn insert_intent(&self, id: &str, user_id: &str) -> AppResult<Wallpaper> {
        let now = Utc::now();
        let row = row_in_state(id, user_id, UploadState::Initiated, now);
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
        older_than: DateTime<Utc>,
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

#[derive(Default)]
pub struct FakeEventBus {
    published: Mutex<Vec<String>>,
    fail_publish: bool,
}

impl FakeEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            published: Mutex::new(Vec::new()),
            fail_publish: true,
        }
    }

    pub fn published_subjects(&self) -> Vec<String> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventBus for FakeEventBus {
    async fn ensure_stream(&self, _name: &str, _subjects: &[String]) -> Result<(), EventError> {
        Ok(())
    }

    async fn health_check(&self) -> Result<(), EventError> {
        Ok(())
    }

    async fn publish(
        &self,
        subject: &str,
        _payload: Vec<u8>,
        _headers: HashMap<String, String>,
    ) -> Result<(), EventError> {
        if self.fail_publish {
            return Err(EventError::Transient("fake event bus down".to_string()));
        }
        self.published.lock().unwrap().push(subject.to_string());
        Ok(())
    }
}
