//! Application state shared across handlers.
//!
//! Unlike the teacher's media-ingestion surface, which splits state into a
//! handful of domain sub-states because it fronts dozens of media types and
//! services, this core has exactly one pipeline and one reconciler set behind
//! it, so a single `AppState` without `FromRef` sub-splitting is the right
//! size here.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use sqlx::PgPool;
use wallpaper_core::validation_limits::GlobalValidationLimits;
use wallpaper_core::Config;
use wallpaper_db::WallpaperRepository;
use wallpaper_events::EventBus;
use wallpaper_kv::{KvStore, RateLimiter};
use wallpaper_pipeline::UploadPipeline;
use wallpaper_storage::Storage;

pub struct AppState {
    pub config: Config,
    pub db_pool: PgPool,
    pub repo: Arc<dyn WallpaperRepository>,
    pub storage: Arc<dyn Storage>,
    pub events: Arc<dyn EventBus>,
    pub rate_limiter: Arc<RateLimiter<dyn KvStore>>,
    pub pipeline: Arc<UploadPipeline>,
    pub limits: GlobalValidationLimits,
    pub bucket: String,
    /// Flipped by the shutdown signal handler before the grace window starts;
    /// `/ready` reports `shutting_down` once this is set.
    pub shutting_down: Arc<AtomicBool>,
}

fn _assert_app_state_send_sync() {
    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}
    assert_send::<AppState>();
    assert_sync::<AppState>();
}
