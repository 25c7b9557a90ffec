//! Orphaned-blobs reconciler (4.F): objects in the bucket with no live
//! backing row (or whose row already failed) are swept up, paging through
//! the full bucket each cycle the way the teacher's cleanup loop walks the
//! upload directory.

use std::sync::Arc;

use wallpaper_core::model::UploadState;
use wallpaper_core::error::AppResult;
use wallpaper_db::WallpaperRepository;
use wallpaper_storage::Storage;

use crate::reconcile::ReconcileStats;

pub async fn run(
    repo: &Arc<dyn WallpaperRepository>,
    storage: &Arc<dyn Storage>,
    bucket: &str,
) -> AppResult<ReconcileStats> {
    let mut stats = ReconcileStats::default();
    let mut page_token = None;

    loop {
        let (objects, next_token) = storage.list(bucket, "", page_token).await?;
        stats.claimed += objects.len() as u64;

        for object in objects {
            let Some(id) = wallpaper_id_from_key(&object.key) else {
                continue;
            };

            let row = repo.find_by_id(&id).await?;
            let should_delete = match row {
                None => true,
                Some(w) => w.upload_state == UploadState::Failed,
            };

            if should_delete {
                match storage.delete(bucket, &object.key).await {
                    Ok(()) => {
                        stats.advanced += 1;
                        tracing::info!(key = %object.key, "orphaned blob deleted");
                    }
                    Err(e) => {
                        stats.failed += 1;
                        tracing::warn!(key = %object.key, error = %e, "orphaned blob delete failed");
                    }
                }
            }
        }

        page_token = next_token;
        if page_token.is_none() {
            break;
        }
    }

    tracing::info!(
        claimed = stats.claimed, advanced = stats.advanced, failed = stats.failed,
        "orphaned-blobs reconciler cycle complete"
    );
    Ok(stats)
}

/// Object keys are `{id}/original.{ext}`; take the first path segment.
fn wallpaper_id_from_key(key: &str) -> Option<String> {
    key.split('/').next().filter(|s| !s.is_empty()).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::test_support::{row_in_state, FakeRepository, FakeStorage};
    use bytes::Bytes;
    use chrono::Utc;

    const BUCKET: &str = "wallpapers";

    #[tokio::test]
    async fn deletes_blob_with_no_backing_row() {
        let storage: Arc<dyn Storage> = Arc::new(FakeStorage::new());
        storage.put(BUCKET, "wlpr_orphan/original.jpg", Bytes::from_static(b"x"), "image/jpeg").await.unwrap();
        let repo: Arc<dyn WallpaperRepository> = Arc::new(FakeRepository::new());

        let stats = run(&repo, &storage, BUCKET).await.unwrap();

        assert_eq!(stats.advanced, 1);
        assert!(storage.head(BUCKET, "wlpr_orphan/original.jpg").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn deletes_blob_backing_a_failed_row() {
        let storage: Arc<dyn Storage> = Arc::new(FakeStorage::new());
        storage.put(BUCKET, "wlpr_failed/original.jpg", Bytes::from_static(b"x"), "image/jpeg").await.unwrap();
        let fake_repo = Arc::new(FakeRepository::new());
        fake_repo.seed(row_in_state("wlpr_failed", "user_A", UploadState::Failed, Utc::now()));
        let repo: Arc<dyn WallpaperRepository> = fake_repo;

        let stats = run(&repo, &storage, BUCKET).await.unwrap();

        assert_eq!(stats.advanced, 1);
        assert!(storage.head(BUCKET, "wlpr_failed/original.jpg").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn keeps_blob_backing_a_live_row() {
        let storage: Arc<dyn Storage> = Arc::new(FakeStorage::new());
        storage.put(BUCKET, "wlpr_live/original.jpg", Bytes::from_static(b"x"), "image/jpeg").await.unwrap();
        let fake_repo = Arc::new(FakeRepository::new());
        fake_repo.seed(row_in_state("wlpr_live", "user_A", UploadState::Stored, Utc::now()));
        let repo: Arc<dyn WallpaperRepository> = fake_repo;

        let stats = run(&repo, &storage, BUCKET).await.unwrap();

        assert_eq!(stats.advanced, 0);
        assert!(storage.head(BUCKET, "wlpr_live/original.jpg").await.unwrap().is_some());
    }
}
