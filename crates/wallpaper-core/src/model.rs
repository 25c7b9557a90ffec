//! The sole persistent entity of the ingestion core.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "upload_state", rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum UploadState {
    Initiated,
    Uploading,
    Stored,
    Processing,
    Completed,
    Failed,
}

impl UploadState {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadState::Initiated => "initiated",
            UploadState::Uploading => "uploading",
            UploadState::Stored => "stored",
            UploadState::Processing => "processing",
            UploadState::Completed => "completed",
            UploadState::Failed => "failed",
        }
    }

    pub fn is_dedup_eligible(&self) -> bool {
        matches!(
            self,
            UploadState::Stored | UploadState::Processing | UploadState::Completed
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, UploadState::Completed | UploadState::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "file_type", rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    Image,
    Video,
}

impl FileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Image => "image",
            FileType::Video => "video",
        }
    }
}

/// A single wallpaper's row, mutated only through locked transitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallpaper {
    pub id: String,
    pub user_id: String,
    pub content_hash: Option<String>,
    pub upload_state: UploadState,
    pub state_changed_at: DateTime<Utc>,
    pub upload_attempts: i32,
    pub processing_error: Option<String>,

    pub file_type: Option<FileType>,
    pub mime_type: Option<String>,
    pub file_size_bytes: Option<i64>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub aspect_ratio: Option<f64>,
    pub original_filename: Option<String>,
    pub storage_key: Option<String>,
    pub storage_bucket: Option<String>,

    pub uploaded_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Wallpaper {
    /// A row in `stored`/`processing`/`completed` must carry full file metadata (invariant 2).
    pub fn has_complete_metadata(&self) -> bool {
        self.storage_key.is_some()
            && self.storage_bucket.is_some()
            && self.file_type.is_some()
            && self.mime_type.is_some()
            && self.width.is_some()
            && self.height.is_some()
            && self.file_size_bytes.is_some()
    }

    pub fn status_for_response(&self) -> &'static str {
        self.upload_state.as_str()
    }
}

pub fn extension_for_mime(mime_type: &str) -> Option<&'static str> {
    match mime_type {
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

pub fn storage_key_for(id: &str, mime_type: &str) -> Option<String> {
    extension_for_mime(mime_type).map(|ext| format!("{id}/original.{ext}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_key_is_content_addressed() {
        assert_eq!(
            storage_key_for("wlpr_01ABC", "image/jpeg").unwrap(),
            "wlpr_01ABC/original.jpg"
        );
        assert!(storage_key_for("wlpr_01ABC", "image/tiff").is_none());
    }

    #[test]
    fn dedup_eligibility_matches_invariant_1() {
        assert!(UploadState::Stored.is_dedup_eligible());
        assert!(UploadState::Processing.is_dedup_eligible());
        assert!(UploadState::Completed.is_dedup_eligible());
        assert!(!UploadState::Initiated.is_dedup_eligible());
        assert!(!UploadState::Uploading.is_dedup_eligible());
        assert!(!UploadState::Failed.is_dedup_eligible());
    }
}
