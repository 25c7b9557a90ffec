//! `POST /upload` (4.E, 4.H): the only write path a client drives directly.
//! Multipart fields arrive in order, so the rate-limit check (step 1) can run
//! as soon as `userId` is parsed, before the (potentially large) `file` field
//! is buffered.

use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use serde::Serialize;
use wallpaper_core::error::AppError;
use wallpaper_core::validation_limits::ValidationLimits;
use wallpaper_kv::RateLimitDecision;
use wallpaper_pipeline::{validate_upload, UploadRequest};

use crate::error::{apply_rate_limit_headers, HttpAppError};
use crate::state::AppState;

#[derive(Debug, Serialize)]
struct UploadResponse {
    id: String,
    status: String,
}

pub async fn upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Response, HttpAppError> {
    let mut user_id: Option<String> = None;
    let mut filename: Option<String> = None;
    let mut bytes: Option<Bytes> = None;
    let mut decision: Option<RateLimitDecision> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| HttpAppError::new(AppError::MissingFile, e.to_string()).with_rate_limit(decision))?
    {
        match field.name() {
            Some("userId") if user_id.is_none() => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| HttpAppError::new(AppError::MissingUserId, e.to_string()).with_rate_limit(decision))?;
                if !value.is_empty() {
                    decision = Some(state.rate_limiter.check(&value).await);
                    if let Some(d) = decision {
                        if !d.allowed {
                            return Ok(rate_limited_response(d, "/upload"));
                        }
                    }
                }
                user_id = Some(value);
            }
            Some("file") if bytes.is_none() => {
                filename = field.file_name().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| HttpAppError::new(AppError::MissingFile, e.to_string()).with_rate_limit(decision))?;
                bytes = Some(data);
            }
            _ => {
                // Unrecognised or duplicate field; skip it rather than reject
                // the whole request on an extra part.
            }
        }
    }

    let user_id = user_id
        .ok_or(AppError::MissingUserId)
        .map_err(|e| HttpAppError::new(e, "/upload").with_rate_limit(decision))?;
    let bytes = bytes
        .ok_or(AppError::MissingFile)
        .map_err(|e| HttpAppError::new(e, "/upload").with_rate_limit(decision))?;

    let limits = state.limits.limits_for(&user_id);
    let req = UploadRequest {
        user_id: Some(&user_id),
        filename: filename.as_deref(),
        bytes: &bytes,
    };
    let validated =
        validate_upload(&req, &limits).map_err(|e| HttpAppError::new(e, "/upload").with_rate_limit(decision))?;

    let outcome = state
        .pipeline
        .ingest(&user_id, bytes, validated)
        .await
        .map_err(|e| HttpAppError::new(e, "/upload").with_rate_limit(decision))?;

    let body = Json(UploadResponse {
        id: outcome.id,
        status: outcome.status,
    });
    let mut response = body.into_response();
    if let Some(d) = decision {
        apply_rate_limit_headers(response.headers_mut(), &d);
    }
    Ok(response)
}

fn rate_limited_response(decision: RateLimitDecision, instance: &str) -> Response {
    let err = AppError::RateLimited {
        retry_after_secs: decision.retry_after_ms.unwrap_or(0) as u64 / 1000,
    };
    HttpAppError::new(err, instance).with_rate_limit(Some(decision)).into_response()
}
