//! The reconciliation scheduler (4.G): owns the reconciliation-cycle timer
//! and the blob-cleanup timer, plus a manual trigger channel for tests and
//! operational use. Grounded in the same shutdown-channel-plus-select! loop
//! used for the upload worker pool, and the single-interval cleanup loop
//! used for blob expiry.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::interval;
use wallpaper_core::error::AppResult;
use wallpaper_db::WallpaperRepository;
use wallpaper_events::EventBus;
use wallpaper_storage::Storage;

use crate::reconcile::{missing_events, orphaned_blobs, orphaned_intents, stuck_uploads};

pub struct SchedulerConfig {
    pub reconciliation_interval: Duration,
    pub blob_cleanup_interval: Duration,
    pub stuck_upload_timeout: Duration,
    pub missing_event_timeout: Duration,
    pub orphaned_intent_timeout: Duration,
    pub bucket: String,
}

/// Runs the four reconciler loops (4.F) on two timers: a short one for the
/// state-machine reconcilers, a long one for the blob sweep.
pub struct Scheduler {
    repo: Arc<dyn WallpaperRepository>,
    storage: Arc<dyn Storage>,
    events: Arc<dyn EventBus>,
    config: SchedulerConfig,
    running: Arc<AtomicBool>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    trigger_tx: mpsc::Sender<()>,
    trigger_rx: Option<mpsc::Receiver<()>>,
    reconcile_handle: Option<JoinHandle<()>>,
    blob_handle: Option<JoinHandle<()>>,
}

impl Scheduler {
    pub fn new(
        repo: Arc<dyn WallpaperRepository>,
        storage: Arc<dyn Storage>,
        events: Arc<dyn EventBus>,
        config: SchedulerConfig,
    ) -> Self {
        let (trigger_tx, trigger_rx) = mpsc::channel(4);
        Self {
            repo,
            storage,
            events,
            config,
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx: None,
            trigger_tx,
            trigger_rx: Some(trigger_rx),
            reconcile_handle: None,
            blob_handle: None,
        }
    }

    /// Starts both loops. Idempotent: calling `start` again while already
    /// running is a no-op.
    pub fn start(&mut self) {
        if self.shutdown_tx.is_some() {
            return;
        }

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let (blob_shutdown_tx, mut blob_shutdown_rx) = mpsc::channel::<()>(1);

        let repo = self.repo.clone();
        let storage = self.storage.clone();
        let events = self.events.clone();
        let running = self.running.clone();
        let reconciliation_interval = self.config.reconciliation_interval;
        let stuck_upload_timeout = self.config.stuck_upload_timeout;
        let missing_event_timeout = self.config.missing_event_timeout;
        let orphaned_intent_timeout = self.config.orphaned_intent_timeout;
        let bucket = self.config.bucket.clone();
        let mut trigger_rx = self.trigger_rx.take().expect("scheduler started twice");

        let reconcile_handle = tokio::spawn(async move {
            let mut tick = interval(reconciliation_interval);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        tracing::info!("reconciliation scheduler shutting down");
                        let _ = blob_shutdown_tx.send(()).await;
                        break;
                    }
                    _ = tick.tick() => {
                        run_reconciliation_cycle(
                            &repo, &storage, &events, &running, &bucket,
                            stuck_upload_timeout, missing_event_timeout, orphaned_intent_timeout,
                        ).await;
                    }
                    _ = trigger_rx.recv() => {
                        run_reconciliation_cycle(
                            &repo, &storage, &events, &running, &bucket,
                            stuck_upload_timeout, missing_event_timeout, orphaned_intent_timeout,
                        ).await;
                    }
                }
            }
        });

        let repo = self.repo.clone();
        let storage = self.storage.clone();
        let blob_cleanup_interval = self.config.blob_cleanup_interval;
        let bucket = self.config.bucket.clone();

        let blob_handle = tokio::spawn(async move {
            let mut tick = interval(blob_cleanup_interval);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = blob_shutdown_rx.recv() => {
                        tracing::info!("blob cleanup loop shutting down");
                        break;
                    }
                    _ = tick.tick() => {
                        if let Err(e) = orphaned_blobs::run(&repo, &storage, &bucket).await {
                            tracing::error!(error = %e, "orphaned-blobs cycle failed");
                        }
                    }
                }
            }
        });

        self.shutdown_tx = Some(shutdown_tx);
        self.reconcile_handle = Some(reconcile_handle);
        self.blob_handle = Some(blob_handle);
    }

    /// Signals both loops to stop and waits for each to finish its
    /// in-flight cycle (the blob loop is woken transitively, via the
    /// reconciliation loop forwarding the shutdown signal to it) before
    /// returning.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }
        if let Some(handle) = self.reconcile_handle.take() {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "reconciliation loop task panicked");
            }
        }
        if let Some(handle) = self.blob_handle.take() {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "blob cleanup loop task panicked");
            }
        }
    }

    /// Requests an out-of-band reconciliation cycle, coalesced with the next
    /// scheduled tick if one is already queued.
    pub async fn trigger_now(&self) {
        let _ = self.trigger_tx.send(()).await;
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_reconciliation_cycle(
    repo: &Arc<dyn WallpaperRepository>,
    storage: &Arc<dyn Storage>,
    events: &Arc<dyn EventBus>,
    running: &Arc<AtomicBool>,
    bucket: &str,
    stuck_upload_timeout: Duration,
    missing_event_timeout: Duration,
    orphaned_intent_timeout: Duration,
) {
    if running.swap(true, Ordering::SeqCst) {
        tracing::debug!("reconciliation cycle already in progress, skipping this tick");
        return;
    }

    let result: AppResult<()> = async {
        stuck_uploads::run(repo, storage, bucket, stuck_upload_timeout).await?;
        missing_events::run(repo, events, missing_event_timeout).await?;
        orphaned_intents::run(repo, orphaned_intent_timeout).await?;
        Ok(())
    }
    .await;

    if let Err(e) = result {
        tracing::error!(error = %e, "reconciliation cycle failed");
    }

    running.store(false, Ordering::SeqCst);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::test_support::{row_in_state, FakeEventBus, FakeRepository, FakeStorage};
    use wallpaper_core::model::UploadState;

    fn test_config() -> SchedulerConfig {
        SchedulerConfig {
            reconciliation_interval: Duration::from_secs(3600),
            blob_cleanup_interval: Duration::from_secs(3600),
            stuck_upload_timeout: Duration::from_secs(600),
            missing_event_timeout: Duration::from_secs(300),
            orphaned_intent_timeout: Duration::from_secs(0),
            bucket: "wallpapers".to_string(),
        }
    }

    #[tokio::test]
    async fn trigger_now_runs_a_cycle_and_stop_waits_for_it_to_finish() {
        let fake_repo = Arc::new(FakeRepository::new());
        fake_repo.seed(row_in_state(
            "wlpr_a",
            "user_A",
            UploadState::Initiated,
            chrono::Utc::now() - chrono::Duration::seconds(1),
        ));
        let repo: Arc<dyn WallpaperRepository> = fake_repo.clone();
        let storage: Arc<dyn Storage> = Arc::new(FakeStorage::new());
        let events: Arc<dyn EventBus> = Arc::new(FakeEventBus::new());

        let mut scheduler = Scheduler::new(repo, storage, events, test_config());
        scheduler.start();
        scheduler.trigger_now().await;

        // Give the spawned loop a chance to pick the trigger up before
        // stopping; `stop` only waits for the shutdown signal to be
        // processed, not for a trigger that hasn't been received yet.
        tokio::time::sleep(Duration::from_millis(50)).await;
        scheduler.stop().await;

        assert_eq!(fake_repo.len(), 0);
    }

    #[tokio::test]
    async fn stop_is_idempotent_and_returns_when_never_started() {
        let repo: Arc<dyn WallpaperRepository> = Arc::new(FakeRepository::new());
        let storage: Arc<dyn Storage> = Arc::new(FakeStorage::new());
        let events: Arc<dyn EventBus> = Arc::new(FakeEventBus::new());

        let mut scheduler = Scheduler::new(repo, storage, events, test_config());
        scheduler.stop().await;
    }
}
