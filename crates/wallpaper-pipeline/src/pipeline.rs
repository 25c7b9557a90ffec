//! The upload pipeline (4.E): validate → dedup lookup → intent → object
//! write → metadata update → event publish, advancing the wallpaper state
//! machine one locked transition at a time.

use std::sync::Arc;

use bytes::Bytes;
use wallpaper_core::constants::MAX_UPLOAD_ATTEMPTS;
use wallpaper_core::error::{AppError, AppResult};
use wallpaper_core::ids::new_wallpaper_id;
use wallpaper_core::model::{extension_for_mime, FileType, UploadState};
use wallpaper_db::{StatePatch, WallpaperRepository};
use wallpaper_events::{EventBus, WallpaperPayload, WallpaperUploadedEvent, WALLPAPER_UPLOADED_SUBJECT};
use wallpaper_storage::Storage;

use crate::validation::{sha256_hex, ValidatedUpload};

pub struct UploadOutcome {
    pub id: String,
    pub status: String,
}

pub struct UploadPipeline {
    repo: Arc<dyn WallpaperRepository>,
    storage: Arc<dyn Storage>,
    events: Arc<dyn EventBus>,
    bucket: String,
}

impl UploadPipeline {
    pub fn new(
        repo: Arc<dyn WallpaperRepository>,
        storage: Arc<dyn Storage>,
        events: Arc<dyn EventBus>,
        bucket: String,
    ) -> Self {
        Self {
            repo,
            storage,
            events,
            bucket,
        }
    }

    pub async fn ingest(
        &self,
        user_id: &str,
        bytes: Bytes,
        validated: ValidatedUpload,
    ) -> AppResult<UploadOutcome> {
        // Step 3: dedup lookup.
        let content_hash = sha256_hex(&bytes);
        if let Some(existing) = self.repo.find_by_user_hash(user_id, &content_hash).await? {
            return Ok(UploadOutcome {
                id: existing.id,
                status: "already_uploaded".to_string(),
            });
        }

        // Step 4: intent creation.
        let id = new_wallpaper_id();
        self.repo.insert_intent(&id, user_id).await?;

        // Step 5: initiated -> uploading.
        self.repo
            .update_state(&id, UploadState::Initiated, UploadState::Uploading, StatePatch::none())
            .await?;

        let extension = extension_for_mime(validated.mime_type).ok_or_else(|| AppError::PermanentDependency {
            message: format!("no known extension for validated mime type {}", validated.mime_type),
        })?;
        let storage_key = format!("{id}/original.{extension}");

        // Step 6: object write.
        if let Err(e) = self
            .storage
            .put(&self.bucket, &storage_key, bytes.clone(), validated.mime_type)
            .await
        {
            tracing::warn!(wallpaper_id = %id, error = %e, "object write failed on first attempt");
            self.fail_or_leave_uploading(&id, 1).await?;
            return Ok(UploadOutcome {
                id,
                status: UploadState::Uploading.as_str().to_string(),
            });
        }

        // Step 7: metadata update + uploading -> stored.
        let patch = StatePatch {
            content_hash: Some(content_hash),
            file_type: Some(FileType::Image),
            mime_type: Some(validated.mime_type.to_string()),
            file_size_bytes: Some(bytes.len() as i64),
            width: Some(validated.width as i32),
            height: Some(validated.height as i32),
            original_filename: Some(validated.sanitized_filename.clone()),
            storage_key: Some(storage_key.clone()),
            storage_bucket: Some(self.bucket.clone()),
            ..StatePatch::none()
        };
        let row = self
            .repo
            .update_state(&id, UploadState::Uploading, UploadState::Stored, patch)
            .await?
            .ok_or_else(|| AppError::TransientDependency {
                dependency: "database".to_string(),
                message: "row disappeared between object write and metadata update".to_string(),
            })?;

        // Step 8: publish wallpaper.uploaded, then stored -> processing.
        let event = WallpaperUploadedEvent::new(WallpaperPayload {
            id: row.id.clone(),
            user_id: row.user_id.clone(),
            file_type: FileType::Image.as_str().to_string(),
            mime_type: validated.mime_type.to_string(),
            file_size_bytes: row.file_size_bytes.unwrap_or_default(),
            width: row.width.unwrap_or_default(),
            height: row.height.unwrap_or_default(),
            aspect_ratio: row.aspect_ratio.unwrap_or_default(),
            storage_key: storage_key.clone(),
            storage_bucket: self.bucket.clone(),
            original_filename: validated.sanitized_filename,
            uploaded_at: row.uploaded_at,
        });

        let final_status = match event.validate().map_err(|e| AppError::PermanentDependency {
            message: e.to_string(),
        }) {
            Ok(()) => match self
                .events
                .publish(
                    WALLPAPER_UPLOADED_SUBJECT,
                    serde_json::to_vec(&event).unwrap_or_default(),
                    Default::default(),
                )
                .await
            {
                Ok(()) => {
                    self.repo
                        .update_state(&id, UploadState::Stored, UploadState::Processing, StatePatch::none())
                        .await?;
                    UploadState::Processing
                }
                Err(e) => {
                    tracing::warn!(wallpaper_id = %id, error = %e, "event publish failed, leaving row in stored");
                    UploadState::Stored
                }
            },
            Err(e) => {
                tracing::error!(wallpaper_id = %id, error = %e, "event failed schema validation");
                UploadState::Stored
            }
        };

        Ok(UploadOutcome {
            id,
            status: final_status.as_str().to_string(),
        })
    }

    async fn fail_or_leave_uploading(&self, id: &str, attempts: i32) -> AppResult<()> {
        if attempts >= MAX_UPLOAD_ATTEMPTS {
            self.repo
                .update_state(
                    id,
                    UploadState::Uploading,
                    UploadState::Failed,
                    StatePatch {
                        upload_attempts: Some(attempts),
                        processing_error: Some(Some("Max retries exceeded".to_string())),
                        ..StatePatch::none()
                    },
                )
                .await?;
        } else {
            self.repo
                .update_state(
                    id,
                    UploadState::Uploading,
                    UploadState::Uploading,
                    StatePatch {
                        upload_attempts: Some(attempts),
                        ..StatePatch::none()
                    },
                )
                .await?;
        }
        Ok(())
    }
}
