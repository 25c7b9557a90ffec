pub mod pipeline;
pub mod reconcile;
pub mod scheduler;
pub mod validation;

pub use pipeline::{UploadOutcome, UploadPipeline};
pub use scheduler::{Scheduler, SchedulerConfig};
pub use validation::{validate_upload, UploadRequest, ValidatedUpload};
