//! Process-wide constants that are not environment-tunable.

/// Object-store writes and stuck-upload re-probes give up after this many attempts.
pub const MAX_UPLOAD_ATTEMPTS: i32 = 3;

/// Missing-event reconciler claim batch size per cycle, bounding event amplification.
pub const MISSING_EVENTS_CLAIM_BATCH: i64 = 100;

/// Stuck-uploads reconciler claim batch size per cycle.
pub const STUCK_UPLOADS_CLAIM_BATCH: i64 = 100;

/// Orphaned-intents reconciler claim batch size per cycle.
pub const ORPHANED_INTENTS_CLAIM_BATCH: i64 = 500;

/// Accepted upload MIME types, in sniff order.
pub const ACCEPTED_MIME_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp"];

pub const MAX_FILENAME_BYTES: usize = 255;
