//! Tracing initialization for the service. OpenTelemetry export isn't wired
//! up here; `otel_endpoint` in config is reserved for when it is.

mod init_basic;

pub use init_basic::{init_telemetry, shutdown_telemetry};
