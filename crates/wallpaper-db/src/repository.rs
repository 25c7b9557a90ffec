//! The relational store adapter (4.B). Every state transition goes through
//! `update_state`, which is the only write path that can move a row between
//! states; it is row-locked and a no-op when the current state doesn't match
//! `from`, which is what makes reconciliation safe across N instances.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use wallpaper_core::error::AppResult;
use wallpaper_core::model::{FileType, UploadState, Wallpaper};

/// Sparse patch applied as part of a state transition. Only `Some` fields are
/// written; everything else on the row is left untouched.
#[derive(Debug, Default)]
pub struct StatePatch {
    pub content_hash: Option<String>,
    pub processing_error: Option<Option<String>>,
    pub upload_attempts: Option<i32>,
    pub file_type: Option<FileType>,
    pub mime_type: Option<String>,
    pub file_size_bytes: Option<i64>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub original_filename: Option<String>,
    pub storage_key: Option<String>,
    pub storage_bucket: Option<String>,
}

impl StatePatch {
    pub fn none() -> Self {
        Self::default()
    }
}

#[derive(FromRow)]
struct WallpaperRow {
    id: String,
    user_id: String,
    content_hash: Option<String>,
    upload_state: UploadState,
    state_changed_at: DateTime<Utc>,
    upload_attempts: i32,
    processing_error: Option<String>,
    file_type: Option<FileType>,
    mime_type: Option<String>,
    file_size_bytes: Option<i64>,
    width: Option<i32>,
    height: Option<i32>,
    aspect_ratio: Option<f64>,
    original_filename: Option<String>,
    storage_key: Option<String>,
    storage_bucket: Option<String>,
    uploaded_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<WallpaperRow> for Wallpaper {
    fn from(r: WallpaperRow) -> Self {
        Wallpaper {
            id: r.id,
            user_id: r.user_id,
            content_hash: r.content_hash,
            upload_state: r.upload_state,
            state_changed_at: r.state_changed_at,
            upload_attempts: r.upload_attempts,
            processing_error: r.processing_error,
            file_type: r.file_type,
            mime_type: r.mime_type,
            file_size_bytes: r.file_size_bytes,
            width: r.width,
            height: r.height,
            aspect_ratio: r.aspect_ratio,
            original_filename: r.original_filename,
            storage_key: r.storage_key,
            storage_bucket: r.storage_bucket,
            uploaded_at: r.uploaded_at,
            updated_at: r.updated_at,
        }
    }
}

#[async_trait]
pub trait WallpaperRepository: Send + Sync {
    async fn insert_intent(&self, id: &str, user_id: &str) -> AppResult<Wallpaper>;

    async fn find_by_user_hash(
        &self,
        user_id: &str,
        content_hash: &str,
    ) -> AppResult<Option<Wallpaper>>;

    async fn find_by_id(&self, id: &str) -> AppResult<Option<Wallpaper>>;

    /// Row-locked, idempotent transition: no-ops (returns `Ok(None)`) if the
    /// row's current state is not `from`.
    async fn update_state(
        &self,
        id: &str,
        from: UploadState,
        to: UploadState,
        patch: StatePatch,
    ) -> AppResult<Option<Wallpaper>>;

    /// Claims up to `limit` rows in `state` whose `state_changed_at` is older
    /// than `older_than`, using `FOR UPDATE SKIP LOCKED` so concurrent callers
    /// partition the work instead of duplicating it.
    async fn select_stuck(
        &self,
        state: UploadState,
        older_than: DateTime<Utc>,
        limit: i64,
    ) -> AppResult<Vec<Wallpaper>>;

    async fn delete_by_ids(&self, ids: &[String]) -> AppResult<u64>;
}

pub struct PgWallpaperRepository {
    pool: PgPool,
}

impl PgWallpaperRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const SELECT_COLUMNS: &str = "id, user_id, content_hash, upload_state, state_changed_at, \
     upload_attempts, processing_error, file_type, mime_type, file_size_bytes, width, height, \
     aspect_ratio, original_filename, storage_key, storage_bucket, uploaded_at, updated_at";

#[async_trait]
impl WallpaperRepository for PgWallpaperRepository {
    async fn insert_intent(&self, id: &str, user_id: &str) -> AppResult<Wallpaper> {
        let row: WallpaperRow = sqlx::query_as(&format!(
            "INSERT INTO wallpapers (id, user_id, upload_state, upload_attempts) \
             VALUES ($1, $2, 'initiated', 0) \
             RETURNING {SELECT_COLUMNS}"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn find_by_user_hash(
        &self,
        user_id: &str,
        content_hash: &str,
    ) -> AppResult<Option<Wallpaper>> {
        let row: Option<WallpaperRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM wallpapers \
             WHERE user_id = $1 AND content_hash = $2 \
               AND upload_state IN ('stored', 'processing', 'completed') \
             LIMIT 1"
        ))
        .bind(user_id)
        .bind(content_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<Wallpaper>> {
        let row: Option<WallpaperRow> =
            sqlx::query_as(&format!("SELECT {SELECT_COLUMNS} FROM wallpapers WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(Into::into))
    }

    async fn update_state(
        &self,
        id: &str,
        from: UploadState,
        to: UploadState,
        patch: StatePatch,
    ) -> AppResult<Option<Wallpaper>> {
        let mut tx = self.pool.begin().await?;

        let locked: Option<(UploadState, i32, Option<i32>, Option<i32>)> = sqlx::query_as(
            "SELECT upload_state, upload_attempts, width, height FROM wallpapers \
             WHERE id = $1 FOR UPDATE SKIP LOCKED",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((current_state, current_attempts, current_width, current_height)) = locked else {
            tx.rollback().await?;
            return Ok(None);
        };

        if current_state != from {
            tx.rollback().await?;
            return Ok(None);
        }

        let mut qb = sqlx::QueryBuilder::new("UPDATE wallpapers SET upload_state = ");
        qb.push_bind(to);
        qb.push(", state_changed_at = now(), updated_at = now()");

        if let Some(hash) = &patch.content_hash {
            qb.push(", content_hash = ").push_bind(hash.clone());
        }
        if let Some(err) = &patch.processing_error {
            qb.push(", processing_error = ").push_bind(err.clone());
        }
        let attempts = patch.upload_attempts.unwrap_or(current_attempts);
        qb.push(", upload_attempts = ").push_bind(attempts);
        if let Some(ft) = patch.file_type {
            qb.push(", file_type = ").push_bind(ft);
        }
        if let Some(mime) = &patch.mime_type {
            qb.push(", mime_type = ").push_bind(mime.clone());
        }
        if let Some(size) = patch.file_size_bytes {
            qb.push(", file_size_bytes = ").push_bind(size);
        }
        if let Some(w) = patch.width {
            qb.push(", width = ").push_bind(w);
        }
        if let Some(h) = patch.height {
            qb.push(", height = ").push_bind(h);
        }
        if patch.width.is_some() || patch.height.is_some() {
            let final_width = patch.width.or(current_width);
            let final_height = patch.height.or(current_height);
            let aspect_ratio = match (final_width, final_height) {
                (Some(w), Some(h)) if h != 0 => Some(w as f64 / h as f64),
                _ => None,
            };
            qb.push(", aspect_ratio = ").push_bind(aspect_ratio);
        }
        if let Some(name) = &patch.original_filename {
            qb.push(", original_filename = ").push_bind(name.clone());
        }
        if let Some(key) = &patch.storage_key {
            qb.push(", storage_key = ").push_bind(key.clone());
        }
        if let Some(bucket) = &patch.storage_bucket {
            qb.push(", storage_bucket = ").push_bind(bucket.clone());
        }

        qb.push(" WHERE id = ").push_bind(id.to_string());
        qb.push(format!(" RETURNING {SELECT_COLUMNS}"));

        let row: WallpaperRow = qb.build_query_as().fetch_one(&mut *tx).await?;
        tx.commit().await?;

        Ok(Some(row.into()))
    }

    async fn select_stuck(
        &self,
        state: UploadState,
        older_than: DateTime<Utc>,
        limit: i64,
    ) -> AppResult<Vec<Wallpaper>> {
        let rows: Vec<WallpaperRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM wallpapers \
             WHERE upload_state = $1 AND state_changed_at < $2 \
             ORDER BY state_changed_at ASC \
             LIMIT $3 \
             FOR UPDATE SKIP LOCKED"
        ))
        .bind(state)
        .bind(older_than)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn delete_by_ids(&self, ids: &[String]) -> AppResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query("DELETE FROM wallpapers WHERE id = ANY($1)")
            .bind(ids)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
