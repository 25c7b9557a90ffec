//! The two event shapes this core speaks (§6): `wallpaper.uploaded`, which it
//! publishes, and `wallpaper.variant.available`, which it only needs to be
//! able to decode for round-trip testing against the downstream media
//! service's output.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use wallpaper_core::ids::new_event_id;

pub const WALLPAPER_UPLOADED_SUBJECT: &str = "wallpaper.uploaded";
pub const WALLPAPER_VARIANT_AVAILABLE_SUBJECT: &str = "wallpaper.variant.available";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WallpaperPayload {
    pub id: String,
    pub user_id: String,
    pub file_type: String,
    pub mime_type: String,
    pub file_size_bytes: i64,
    pub width: i32,
    pub height: i32,
    pub aspect_ratio: f64,
    pub storage_key: String,
    pub storage_bucket: String,
    pub original_filename: String,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WallpaperUploadedEvent {
    pub event_id: String,
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub wallpaper: WallpaperPayload,
}

impl WallpaperUploadedEvent {
    pub fn new(wallpaper: WallpaperPayload) -> Self {
        Self {
            event_id: new_event_id(),
            event_type: "wallpaper.uploaded".to_string(),
            timestamp: Utc::now(),
            wallpaper,
        }
    }

    pub fn validate(&self) -> Result<(), crate::EventError> {
        if self.wallpaper.file_size_bytes <= 0 || self.wallpaper.width <= 0 || self.wallpaper.height <= 0
        {
            return Err(crate::EventError::SchemaInvalid(
                "wallpaper dimensions/size must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantAvailablePayload {
    pub wallpaper_id: String,
    pub width: i32,
    pub height: i32,
    pub aspect_ratio: f64,
    pub format: String,
    pub file_size_bytes: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantAvailableEvent {
    pub event_id: String,
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub variant: VariantAvailablePayload,
}
