pub mod config;
pub mod constants;
pub mod error;
pub mod ids;
pub mod model;
pub mod validation_limits;

pub use config::Config;
pub use error::{AppError, AppResult, ErrorMetadata};
pub use model::{FileType, UploadState, Wallpaper};
