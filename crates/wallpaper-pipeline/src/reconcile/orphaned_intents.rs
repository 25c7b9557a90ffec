//! Orphaned-intents reconciler (4.F): rows stuck in `initiated` past
//! `orphaned_intent_timeout` never made it to an object write at all —
//! nothing in the object store references them, so deletion is safe.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use wallpaper_core::constants::ORPHANED_INTENTS_CLAIM_BATCH;
use wallpaper_core::error::AppResult;
use wallpaper_core::model::UploadState;
use wallpaper_db::WallpaperRepository;

use crate::reconcile::ReconcileStats;

pub async fn run(
    repo: &Arc<dyn WallpaperRepository>,
    orphaned_intent_timeout: Duration,
) -> AppResult<ReconcileStats> {
    let mut stats = ReconcileStats::default();
    let older_than = Utc::now() - chrono::Duration::from_std(orphaned_intent_timeout).unwrap();

    let rows = repo
        .select_stuck(UploadState::Initiated, older_than, ORPHANED_INTENTS_CLAIM_BATCH)
        .await?;
    stats.claimed = rows.len() as u64;

    let ids: Vec<String> = rows.into_iter().map(|r| r.id).collect();
    if !ids.is_empty() {
        let deleted = repo.delete_by_ids(&ids).await?;
        stats.advanced = deleted;
    }

    tracing::info!(
        claimed = stats.claimed, advanced = stats.advanced,
        "orphaned-intents reconciler cycle complete"
    );
    Ok(stats)
}
