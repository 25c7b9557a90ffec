//! Liveness/readiness probes (4.H). `/health` never touches a dependency;
//! `/ready` shallow-probes the relational store and object store with a
//! timeout so a wedged dependency can't wedge the probe itself.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde_json::json;

use crate::state::AppState;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn health() -> impl IntoResponse {
    Json(json!({ "alive": true, "timestamp": Utc::now() }))
}

pub async fn ready(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if state.shutting_down.load(Ordering::SeqCst) {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "shutting_down" })),
        );
    }

    let mut failing = Vec::new();

    match tokio::time::timeout(PROBE_TIMEOUT, sqlx::query("SELECT 1").execute(&state.db_pool)).await {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "readiness: database probe failed");
            failing.push("database");
        }
        Err(_) => {
            tracing::warn!("readiness: database probe timed out");
            failing.push("database");
        }
    }

    match tokio::time::timeout(
        PROBE_TIMEOUT,
        state.storage.head(&state.bucket, "__readiness_probe__"),
    )
    .await
    {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "readiness: storage probe failed");
            failing.push("storage");
        }
        Err(_) => {
            tracing::warn!("readiness: storage probe timed out");
            failing.push("storage");
        }
    }

    match tokio::time::timeout(PROBE_TIMEOUT, state.events.health_check()).await {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "readiness: event bus probe failed");
            failing.push("events");
        }
        Err(_) => {
            tracing::warn!("readiness: event bus probe timed out");
            failing.push("events");
        }
    }

    if failing.is_empty() {
        (StatusCode::OK, Json(json!({ "status": "ready" })))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "not_ready", "failing": failing })),
        )
    }
}
