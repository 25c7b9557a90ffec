//! The validation engine (4.C). Checks run in a fixed order; the first
//! failure short-circuits the rest, matching the deterministic-validation
//! property in the testable-properties section.

use std::io::Cursor;

use image::ImageReader;
use wallpaper_core::constants::{ACCEPTED_MIME_TYPES, MAX_FILENAME_BYTES};
use wallpaper_core::error::{AppError, AppResult};
use wallpaper_core::validation_limits::Limits;

pub struct ValidatedUpload {
    pub mime_type: &'static str,
    pub width: u32,
    pub height: u32,
    pub sanitized_filename: String,
}

pub struct UploadRequest<'a> {
    pub user_id: Option<&'a str>,
    pub filename: Option<&'a str>,
    pub bytes: &'a [u8],
}

pub fn validate_upload(req: &UploadRequest, limits: &Limits) -> AppResult<ValidatedUpload> {
    // 1. Presence.
    let user_id = req.user_id.filter(|u| !u.is_empty());
    if user_id.is_none() {
        return Err(AppError::MissingUserId);
    }
    if req.filename.is_none() {
        return Err(AppError::MissingFile);
    }

    // 2. Non-empty.
    if req.bytes.is_empty() {
        return Err(AppError::MissingFile);
    }

    // 3. Format: sniff from leading bytes, never trust the extension.
    let mime_type = sniff_mime_type(req.bytes).ok_or_else(|| AppError::InvalidFileFormat {
        received_mime_type: "application/octet-stream".to_string(),
    })?;

    // 4. Size.
    let size = req.bytes.len() as u64;
    if size > limits.max_file_size_bytes {
        return Err(AppError::FileTooLarge {
            file_size_bytes: size,
            max_file_size_bytes: limits.max_file_size_bytes,
            file_type: "image".to_string(),
        });
    }

    // 5. Dimensions: header-only probe, no full decode.
    let (width, height) = ImageReader::new(Cursor::new(req.bytes))
        .with_guessed_format()
        .map_err(|e| AppError::InvalidFileFormat {
            received_mime_type: e.to_string(),
        })?
        .into_dimensions()
        .map_err(|e| AppError::InvalidFileFormat {
            received_mime_type: e.to_string(),
        })?;

    if width < limits.min_width
        || height < limits.min_height
        || width > limits.max_width
        || height > limits.max_height
    {
        return Err(AppError::DimensionsOutOfBounds {
            width,
            height,
            min_width: limits.min_width,
            min_height: limits.min_height,
            max_width: limits.max_width,
            max_height: limits.max_height,
        });
    }

    // 6. Filename sanitisation — never a rejection reason.
    let sanitized_filename = sanitize_filename(req.filename.unwrap_or("upload"));

    Ok(ValidatedUpload {
        mime_type,
        width,
        height,
        sanitized_filename,
    })
}

fn sniff_mime_type(bytes: &[u8]) -> Option<&'static str> {
    for candidate in ACCEPTED_MIME_TYPES {
        if matches_magic(candidate, bytes) {
            return Some(candidate);
        }
    }
    None
}

fn matches_magic(mime_type: &str, bytes: &[u8]) -> bool {
    match mime_type {
        "image/jpeg" => bytes.starts_with(&[0xFF, 0xD8, 0xFF]),
        "image/png" => bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]),
        "image/webp" => {
            bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP"
        }
        _ => false,
    }
}

/// Strips path separators and control characters, truncates to
/// `MAX_FILENAME_BYTES`. Never rejects — always returns something usable.
fn sanitize_filename(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| *c != '/' && *c != '\\' && !c.is_control())
        .collect();
    let cleaned = if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    };

    if cleaned.len() <= MAX_FILENAME_BYTES {
        cleaned
    } else {
        cleaned.as_bytes()[..MAX_FILENAME_BYTES]
            .iter()
            .map(|b| *b as char)
            .collect()
    }
}

/// Re-derives `(mimeType, width, height)` from raw bytes when a row's
/// metadata never made it to the database (object exists, row does not
/// reflect it) — the stuck-uploads reconciler's only use of this.
pub fn probe_metadata(bytes: &[u8]) -> Option<(&'static str, u32, u32)> {
    let mime_type = sniff_mime_type(bytes)?;
    let (width, height) = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()?;
    Some((mime_type, width, height))
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
