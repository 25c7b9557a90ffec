//! Missing-events reconciler (4.F): rows stuck in `stored` past
//! `missing_event_timeout` had their publish step fail or never run; retry
//! the publish and advance on success, otherwise leave for the next cycle.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use wallpaper_core::constants::MISSING_EVENTS_CLAIM_BATCH;
use wallpaper_core::error::AppResult;
use wallpaper_core::model::{FileType, UploadState};
use wallpaper_db::{StatePatch, WallpaperRepository};
use wallpaper_events::{EventBus, WallpaperPayload, WallpaperUploadedEvent, WALLPAPER_UPLOADED_SUBJECT};

use crate::reconcile::ReconcileStats;

pub async fn run(
    repo: &Arc<dyn WallpaperRepository>,
    events: &Arc<dyn EventBus>,
    missing_event_timeout: Duration,
) -> AppResult<ReconcileStats> {
    let mut stats = ReconcileStats::default();
    let older_than = Utc::now() - chrono::Duration::from_std(missing_event_timeout).unwrap();

    let rows = repo
        .select_stuck(UploadState::Stored, older_than, MISSING_EVENTS_CLAIM_BATCH)
        .await?;
    stats.claimed = rows.len() as u64;

    for row in rows {
        if !row.has_complete_metadata() {
            // Shouldn't happen for a `stored` row; leave it for the
            // stuck-uploads path to sort out if it's actually mis-stated.
            stats.failed += 1;
            continue;
        }

        let event = WallpaperUploadedEvent::new(WallpaperPayload {
            id: row.id.clone(),
            user_id: row.user_id.clone(),
            file_type: row.file_type.unwrap_or(FileType::Image).as_str().to_string(),
            mime_type: row.mime_type.clone().unwrap_or_default(),
            file_size_bytes: row.file_size_bytes.unwrap_or_default(),
            width: row.width.unwrap_or_default(),
            height: row.height.unwrap_or_default(),
            aspect_ratio: row.aspect_ratio.unwrap_or_default(),
            storage_key: row.storage_key.clone().unwrap_or_default(),
            storage_bucket: row.storage_bucket.clone().unwrap_or_default(),
            original_filename: row.original_filename.clone().unwrap_or_default(),
            uploaded_at: row.uploaded_at,
        });

        if let Err(e) = event.validate() {
            tracing::error!(wallpaper_id = %row.id, error = %e, "missing-event reconciler: schema invalid, skipping");
            stats.failed += 1;
            continue;
        }

        let payload = match serde_json::to_vec(&event) {
            Ok(p) => p,
            Err(e) => {
                tracing::error!(wallpaper_id = %row.id, error = %e, "failed to serialize event");
                stats.failed += 1;
                continue;
            }
        };

        match events.publish(WALLPAPER_UPLOADED_SUBJECT, payload, Default::default()).await {
            Ok(()) => {
                let advanced = repo
                    .update_state(&row.id, UploadState::Stored, UploadState::Processing, StatePatch::none())
                    .await?;
                if advanced.is_some() {
                    stats.advanced += 1;
                    tracing::info!(wallpaper_id = %row.id, "missing event republished, advanced to processing");
                }
            }
            Err(e) => {
                tracing::warn!(wallpaper_id = %row.id, error = %e, "missing-event republish failed, retrying next cycle");
                stats.failed += 1;
            }
        }
    }

    tracing::info!(
        claimed = stats.claimed, advanced = stats.advanced, failed = stats.failed,
        "missing-events reconciler cycle complete"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::test_support::{row_in_state, FakeEventBus, FakeRepository};
    use wallpaper_core::model::Wallpaper;

    fn stuck_stored_row(id: &str) -> Wallpaper {
        let mut row = row_in_state(id, "user_A", UploadState::Stored, Utc::now() - chrono::Duration::hours(1));
        row.content_hash = Some("hash".to_string());
        row.file_type = Some(FileType::Image);
        row.mime_type = Some("image/jpeg".to_string());
        row.file_size_bytes = Some(1024);
        row.width = Some(10);
        row.height = Some(10);
        row.aspect_ratio = Some(1.0);
        row.storage_key = Some(format!("{id}/original.jpg"));
        row.storage_bucket = Some("wallpapers".to_string());
        row.original_filename = Some("wallpaper.jpg".to_string());
        row
    }

    #[tokio::test]
    async fn republishes_and_advances_a_fully_populated_stored_row() {
        let fake_repo = Arc::new(FakeRepository::new());
        fake_repo.seed(stuck_stored_row("wlpr_a"));
        let repo: Arc<dyn WallpaperRepository> = fake_repo;
        let events: Arc<dyn EventBus> = Arc::new(FakeEventBus::new());

        let stats = run(&repo, &events, Duration::from_secs(60)).await.unwrap();

        assert_eq!(stats.claimed, 1);
        assert_eq!(stats.advanced, 1);
        let row = repo.find_by_id("wlpr_a").await.unwrap().unwrap();
        assert_eq!(row.upload_state, UploadState::Processing);
    }

    #[tokio::test]
    async fn leaves_incomplete_rows_for_the_stuck_uploads_reconciler() {
        let fake_repo = Arc::new(FakeRepository::new());
        let mut row = stuck_stored_row("wlpr_b");
        row.mime_type = None;
        fake_repo.seed(row);
        let repo: Arc<dyn WallpaperRepository> = fake_repo;
        let events: Arc<dyn EventBus> = Arc::new(FakeEventBus::new());

        let stats = run(&repo, &events, Duration::from_secs(60)).await.unwrap();

        assert_eq!(stats.claimed, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.advanced, 0);
        let row = repo.find_by_id("wlpr_b").await.unwrap().unwrap();
        assert_eq!(row.upload_state, UploadState::Stored);
    }

    #[tokio::test]
    async fn retries_next_cycle_when_publish_fails() {
        let fake_repo = Arc::new(FakeRepository::new());
        fake_repo.seed(stuck_stored_row("wlpr_c"));
        let repo: Arc<dyn WallpaperRepository> = fake_repo;
        let events: Arc<dyn EventBus> = Arc::new(FakeEventBus::failing());

        let stats = run(&repo, &events, Duration::from_secs(60)).await.unwrap();

        assert_eq!(stats.claimed, 1);
        assert_eq!(stats.failed, 1);
        let row = repo.find_by_id("wlpr_c").await.unwrap().unwrap();
        assert_eq!(row.upload_state, UploadState::Stored);
    }
}
