//! HTTP error response conversion (4.H, §6): every error becomes an
//! `application/problem+json` body built from `wallpaper_core::error::Problem`.
//!
//! This is necessary because of Rust's orphan rules — we can't implement
//! `IntoResponse` (foreign trait) for `AppError` (foreign type) directly.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use wallpaper_core::error::{AppError, ErrorMetadata, Problem};
use wallpaper_kv::RateLimitDecision;

#[derive(Debug)]
pub struct HttpAppError {
    pub error: AppError,
    pub instance: String,
    pub rate_limit: Option<RateLimitDecision>,
}

impl HttpAppError {
    pub fn new(error: AppError, instance: impl Into<String>) -> Self {
        Self {
            error,
            instance: instance.into(),
            rate_limit: None,
        }
    }

    /// Carries the already-computed rate-limit decision onto an error
    /// response, so `X-RateLimit-*` headers ride every response from the
    /// rate-limited endpoint, not just 200s and 429s.
    pub fn with_rate_limit(mut self, decision: Option<RateLimitDecision>) -> Self {
        self.rate_limit = decision;
        self
    }
}

fn log_error(error: &AppError) {
    use wallpaper_core::error::LogLevel;
    match error.log_level() {
        LogLevel::Debug => tracing::debug!(error = %error, code = error.error_code(), "request failed"),
        LogLevel::Warn => tracing::warn!(error = %error, code = error.error_code(), "request failed"),
        LogLevel::Error => tracing::error!(error = %error, code = error.error_code(), "request failed"),
    }
}

impl IntoResponse for HttpAppError {
    fn into_response(self) -> Response {
        log_error(&self.error);

        let status =
            StatusCode::from_u16(self.error.http_status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let problem = Problem::from_app_error(&self.error, self.instance);

        let mut response = (status, Json(problem)).into_response();
        response.headers_mut().insert(
            axum::http::header::CONTENT_TYPE,
            axum::http::HeaderValue::from_static("application/problem+json"),
        );
        if let AppError::RateLimited { retry_after_secs } = &self.error {
            if let Ok(value) = axum::http::HeaderValue::from_str(&retry_after_secs.to_string()) {
                response.headers_mut().insert(axum::http::header::RETRY_AFTER, value);
            }
        }
        if let Some(decision) = self.rate_limit {
            apply_rate_limit_headers(response.headers_mut(), &decision);
        }
        response
    }
}

/// Stamps `X-RateLimit-{Limit,Remaining,Reset}` on any response for the
/// rate-limited endpoint, success or failure.
pub fn apply_rate_limit_headers(headers: &mut axum::http::HeaderMap, decision: &RateLimitDecision) {
    if let Ok(value) = axum::http::HeaderValue::from_str(&decision.limit.to_string()) {
        headers.insert("X-RateLimit-Limit", value);
    }
    if let Ok(value) = axum::http::HeaderValue::from_str(&decision.remaining.to_string()) {
        headers.insert("X-RateLimit-Remaining", value);
    }
    if let Ok(value) = axum::http::HeaderValue::from_str(&decision.reset_at_ms.to_string()) {
        headers.insert("X-RateLimit-Reset", value);
    }
}
