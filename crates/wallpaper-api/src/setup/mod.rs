//! Application bootstrap: wires config into every adapter and hands back a
//! ready-to-serve router plus the scheduler the caller owns the lifetime of.

pub mod database;
pub mod routes;
pub mod server;
pub mod storage;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use wallpaper_core::validation_limits::GlobalValidationLimits;
use wallpaper_core::Config;
use wallpaper_db::PgWallpaperRepository;
use wallpaper_events::{EventBus, NatsEventBus, WALLPAPER_UPLOADED_SUBJECT};
use wallpaper_kv::{KvStore, RateLimiter, RedisKvStore};
use wallpaper_pipeline::{Scheduler, SchedulerConfig, UploadPipeline};

use crate::state::AppState;

pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, Router, Scheduler)> {
    wallpaper_infra::init_telemetry(config.otel_service_name())
        .map_err(|e| anyhow::anyhow!("failed to initialize telemetry: {e}"))?;

    let db_pool = database::setup_database(&config).await?;
    let storage = storage::setup_storage(&config)?;

    let events = NatsEventBus::connect(config.nats_url())
        .await
        .context("failed to connect to NATS")?;
    events
        .ensure_stream(config.nats_stream(), &[WALLPAPER_UPLOADED_SUBJECT.to_string()])
        .await
        .context("failed to ensure JetStream stream")?;
    let events: Arc<dyn EventBus> = Arc::new(events);

    let kv: Arc<dyn KvStore> = Arc::new(
        RedisKvStore::connect(&config.redis_url())
            .await
            .context("failed to connect to Redis")?,
    );
    let rate_limiter = Arc::new(RateLimiter::new(
        kv,
        config.rate_limit_max(),
        config.rate_limit_window_ms(),
    ));

    let repo: Arc<dyn wallpaper_db::WallpaperRepository> =
        Arc::new(PgWallpaperRepository::new(db_pool.clone()));

    let pipeline = Arc::new(UploadPipeline::new(
        repo.clone(),
        storage.clone(),
        events.clone(),
        config.s3_bucket().to_string(),
    ));

    let scheduler = Scheduler::new(
        repo.clone(),
        storage.clone(),
        events.clone(),
        SchedulerConfig {
            reconciliation_interval: config.reconciliation_interval(),
            blob_cleanup_interval: config.minio_cleanup_interval(),
            stuck_upload_timeout: config.stuck_upload_timeout(),
            missing_event_timeout: config.missing_event_timeout(),
            orphaned_intent_timeout: config.orphaned_intent_timeout(),
            bucket: config.s3_bucket().to_string(),
        },
    );

    let limits = GlobalValidationLimits {
        max_file_size_bytes: config.max_file_size_bytes(),
        min_width: config.min_width(),
        min_height: config.min_height(),
        max_width: config.max_width(),
        max_height: config.max_height(),
    };

    let state = Arc::new(AppState {
        bucket: config.s3_bucket().to_string(),
        db_pool,
        repo,
        storage,
        events,
        rate_limiter,
        pipeline,
        limits,
        shutting_down: Arc::new(AtomicBool::new(false)),
        config: config.clone(),
    });

    let router = routes::setup_routes(&config, state.clone());

    Ok((state, router, scheduler))
}
