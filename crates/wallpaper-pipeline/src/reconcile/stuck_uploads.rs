//! Stuck-uploads reconciler (4.F): rows stuck in `uploading` past
//! `stuck_upload_timeout` either already landed in the object store (the
//! update that should have advanced them never committed) or never did.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use wallpaper_core::constants::{MAX_UPLOAD_ATTEMPTS, STUCK_UPLOADS_CLAIM_BATCH};
use wallpaper_core::error::AppResult;
use wallpaper_core::model::{FileType, UploadState};
use wallpaper_db::{StatePatch, WallpaperRepository};
use wallpaper_storage::Storage;

use crate::validation::probe_metadata;
use crate::reconcile::ReconcileStats;

const CANDIDATE_EXTENSIONS: &[&str] = &["jpg", "png", "webp"];

pub async fn run(
    repo: &Arc<dyn WallpaperRepository>,
    storage: &Arc<dyn Storage>,
    bucket: &str,
    stuck_upload_timeout: Duration,
) -> AppResult<ReconcileStats> {
    let mut stats = ReconcileStats::default();
    let older_than = Utc::now() - chrono::Duration::from_std(stuck_upload_timeout).unwrap();

    let stuck = repo
        .select_stuck(UploadState::Uploading, older_than, STUCK_UPLOADS_CLAIM_BATCH)
        .await?;
    stats.claimed = stuck.len() as u64;

    for row in stuck {
        let found = locate_object(storage, bucket, &row.id, row.storage_key.as_deref()).await;

        match found {
            Some((storage_key, mime_type, width, height, size)) => {
                let patch = StatePatch {
                    file_type: Some(FileType::Image),
                    mime_type: Some(mime_type.to_string()),
                    file_size_bytes: Some(size as i64),
                    width: Some(width as i32),
                    height: Some(height as i32),
                    storage_key: Some(storage_key),
                    storage_bucket: Some(bucket.to_string()),
                    ..StatePatch::none()
                };
                let advanced = repo
                    .update_state(&row.id, UploadState::Uploading, UploadState::Stored, patch)
                    .await?;
                if advanced.is_some() {
                    stats.advanced += 1;
                    tracing::info!(wallpaper_id = %row.id, "stuck upload recovered: object found, advanced to stored");
                }
            }
            None => {
                let attempts = row.upload_attempts + 1;
                if attempts >= MAX_UPLOAD_ATTEMPTS {
                    repo.update_state(
                        &row.id,
                        UploadState::Uploading,
                        UploadState::Failed,
                        StatePatch {
                            upload_attempts: Some(attempts),
                            processing_error: Some(Some("Max retries exceeded".to_string())),
                            ..StatePatch::none()
                        },
                    )
                    .await?;
                    stats.failed += 1;
                    tracing::warn!(wallpaper_id = %row.id, attempts, "stuck upload exhausted retries, marked failed");
                } else {
                    repo.update_state(
                        &row.id,
                        UploadState::Uploading,
                        UploadState::Uploading,
                        StatePatch {
                            upload_attempts: Some(attempts),
                            ..StatePatch::none()
                        },
                    )
                    .await?;
                }
            }
        }
    }

    tracing::info!(
        claimed = stats.claimed, advanced = stats.advanced, failed = stats.failed,
        "stuck-uploads reconciler cycle complete"
    );
    Ok(stats)
}


/// Returns `(storage_key, mime_type, width, height, size_bytes)` if the
/// object exists. Uses the row's recorded key when present; otherwise
/// probes the known extensions, downloading bytes only when `head` hits.
async fn locate_object(
    storage: &Arc<dyn Storage>,
    bucket: &str,
    id: &str,
    known_key: Option<&str>,
) -> Option<(String, &'static str, u32, u32, u64)> {
    if let Some(key) = known_key {
        if let Ok(Some(meta)) = storage.head(bucket, key).await {
            if let Ok(Some(bytes)) = storage.get(bucket, key).await {
                if let Some((mime, w, h)) = probe_metadata(&bytes) {
                    return Some((key.to_string(), mime, w, h, meta.size));
                }
            }
        }
        return None;
    }

    for ext in CANDIDATE_EXTENSIONS {
        let key = format!("{id}/original.{ext}");
        if let Ok(Some(meta)) = storage.head(bucket, &key).await {
            if let Ok(Some(bytes)) = storage.get(bucket, &key).await {
                if let Some((mime, w, h)) = probe_metadata(&bytes) {
                    return Some((key, mime, w, h, meta.size));
                }
            }
        }
    }
    None
}
