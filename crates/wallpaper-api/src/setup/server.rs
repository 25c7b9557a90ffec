//! Server startup and graceful shutdown (§5: shutdown cancels timers, the
//! HTTP server stops accepting new connections, in-flight requests are given
//! up to `shutdownGrace` before forced termination).

use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use wallpaper_core::Config;
use wallpaper_pipeline::Scheduler;

use crate::state::AppState;

pub async fn start_server(
    config: &Config,
    app: Router,
    state: Arc<AppState>,
    mut scheduler: Scheduler,
) -> Result<()> {
    let addr = format!("0.0.0.0:{}", config.port());
    tracing::info!(addr = %addr, "starting server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    scheduler.start();
    tracing::info!("reconciliation scheduler started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state.clone()))
        .await?;

    scheduler.stop().await;
    wallpaper_infra::shutdown_telemetry().await;

    Ok(())
}

async fn shutdown_signal(state: Arc<AppState>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C"),
        _ = terminate => tracing::info!("received SIGTERM"),
    }

    state.shutting_down.store(true, Ordering::SeqCst);
    tracing::info!("shutting down gracefully");
}
