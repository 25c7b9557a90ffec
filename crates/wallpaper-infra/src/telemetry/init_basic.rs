use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initializes the global `tracing` subscriber. `service_name` is accepted
/// for parity with a future OTLP exporter but is not yet used.
pub fn init_telemetry(service_name: &str) -> Result<(), anyhow::Error> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wallpaper=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(service_name, "telemetry initialized");
    Ok(())
}

pub async fn shutdown_telemetry() {
    tracing::debug!("telemetry shutdown");
}
