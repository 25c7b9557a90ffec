//! Error taxonomy and RFC 7807 rendering.
//!
//! `AppError` is the single error type background loops and HTTP handlers
//! convert into. `ErrorMetadata` carries everything the HTTP boundary needs
//! to render a `application/problem+json` body without the renderer having
//! to know about individual variants.

use serde::Serialize;
use serde_json::{Map, Value};

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Warn,
    Error,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("userId is required")]
    MissingUserId,

    #[error("file is required")]
    MissingFile,

    #[error("file format is invalid: {received_mime_type}")]
    InvalidFileFormat { received_mime_type: String },

    #[error("file is too large: {file_size_bytes} bytes (max {max_file_size_bytes})")]
    FileTooLarge {
        file_size_bytes: u64,
        max_file_size_bytes: u64,
        file_type: String,
    },

    #[error("dimensions {width}x{height} are out of bounds")]
    DimensionsOutOfBounds {
        width: u32,
        height: u32,
        min_width: u32,
        min_height: u32,
        max_width: u32,
        max_height: u32,
    },

    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("{resource} not found")]
    NotFound { resource: String },

    #[error("transient failure talking to {dependency}: {message}")]
    TransientDependency { dependency: String, message: String },

    #[error("permanent failure: {message}")]
    PermanentDependency { message: String },

    #[error("server is shutting down")]
    ShuttingDown,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::TransientDependency {
            dependency: "database".to_string(),
            message: e.to_string(),
        }
    }
}

pub trait ErrorMetadata {
    fn http_status_code(&self) -> u16;
    fn error_code(&self) -> &'static str;
    fn is_recoverable(&self) -> bool;
    fn client_message(&self) -> String;
    fn log_level(&self) -> LogLevel;
    /// Extra `application/problem+json` extension fields for this error.
    fn extensions(&self) -> Map<String, Value> {
        Map::new()
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        match self {
            AppError::MissingUserId | AppError::MissingFile | AppError::InvalidFileFormat { .. }
            | AppError::DimensionsOutOfBounds { .. } => 400,
            AppError::FileTooLarge { .. } => 413,
            AppError::RateLimited { .. } => 429,
            AppError::NotFound { .. } => 404,
            AppError::TransientDependency { .. } | AppError::Internal(_) => 500,
            AppError::PermanentDependency { .. } => 500,
            AppError::ShuttingDown => 503,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            AppError::MissingUserId => "missing-user-id",
            AppError::MissingFile => "missing-file",
            AppError::InvalidFileFormat { .. } => "invalid-file-format",
            AppError::FileTooLarge { .. } => "file-too-large",
            AppError::DimensionsOutOfBounds { .. } => "dimensions-out-of-bounds",
            AppError::RateLimited { .. } => "rate-limit-exceeded",
            AppError::NotFound { .. } => "not-found",
            AppError::TransientDependency { .. } => "transient-dependency",
            AppError::PermanentDependency { .. } => "permanent-dependency",
            AppError::ShuttingDown => "shutting-down",
            AppError::Internal(_) => "internal",
        }
    }

    fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AppError::TransientDependency { .. } | AppError::RateLimited { .. }
        )
    }

    fn client_message(&self) -> String {
        self.to_string()
    }

    fn log_level(&self) -> LogLevel {
        match self {
            AppError::TransientDependency { .. } | AppError::PermanentDependency { .. } => {
                LogLevel::Warn
            }
            AppError::Internal(_) => LogLevel::Error,
            _ => LogLevel::Debug,
        }
    }

    fn extensions(&self) -> Map<String, Value> {
        let mut m = Map::new();
        match self {
            AppError::InvalidFileFormat { received_mime_type } => {
                m.insert("receivedMimeType".into(), Value::String(received_mime_type.clone()));
            }
            AppError::FileTooLarge {
                file_size_bytes,
                max_file_size_bytes,
                file_type,
            } => {
                m.insert("fileSizeBytes".into(), (*file_size_bytes).into());
                m.insert("maxFileSizeBytes".into(), (*max_file_size_bytes).into());
                m.insert("fileType".into(), Value::String(file_type.clone()));
            }
            AppError::DimensionsOutOfBounds {
                width,
                height,
                min_width,
                min_height,
                max_width,
                max_height,
            } => {
                m.insert("width".into(), (*width).into());
                m.insert("height".into(), (*height).into());
                m.insert("minWidth".into(), (*min_width).into());
                m.insert("minHeight".into(), (*min_height).into());
                m.insert("maxWidth".into(), (*max_width).into());
                m.insert("maxHeight".into(), (*max_height).into());
            }
            AppError::RateLimited { retry_after_secs } => {
                m.insert("retryAfter".into(), (*retry_after_secs).into());
            }
            _ => {}
        }
        m
    }
}

/// RFC 7807 `application/problem+json` body.
#[derive(Debug, Serialize)]
pub struct Problem {
    #[serde(rename = "type")]
    pub type_uri: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
    pub instance: String,
    #[serde(flatten)]
    pub extensions: Map<String, Value>,
}

const PROBLEM_BASE: &str = "https://wallpaper-ingestion.internal/problems";

impl Problem {
    pub fn from_app_error(err: &AppError, instance: impl Into<String>) -> Self {
        Problem {
            type_uri: format!("{PROBLEM_BASE}/{}", err.error_code()),
            title: title_for(err),
            status: err.http_status_code(),
            detail: err.client_message(),
            instance: instance.into(),
            extensions: err.extensions(),
        }
    }
}

fn title_for(err: &AppError) -> String {
    match err {
        AppError::RateLimited { .. } => "Rate Limit Exceeded".to_string(),
        AppError::ShuttingDown => "Shutting Down".to_string(),
        AppError::NotFound { .. } => "Not Found".to_string(),
        _ => "Validation Error".to_string(),
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_carries_retry_after_extension() {
        let err = AppError::RateLimited { retry_after_secs: 7 };
        assert_eq!(err.http_status_code(), 429);
        let problem = Problem::from_app_error(&err, "/upload");
        assert_eq!(problem.extensions.get("retryAfter").unwrap(), &Value::from(7));
    }

    #[test]
    fn file_too_large_is_413_with_extensions() {
        let err = AppError::FileTooLarge {
            file_size_bytes: 100,
            max_file_size_bytes: 50,
            file_type: "image".to_string(),
        };
        assert_eq!(err.http_status_code(), 413);
        assert_eq!(err.error_code(), "file-too-large");
    }
}
