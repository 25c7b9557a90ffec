pub mod consumer;
pub mod envelope;
pub mod error;
pub mod publisher;

pub use consumer::{ConsumeOutcome, Consumer, NatsConsumer};
pub use envelope::{
    VariantAvailableEvent, VariantAvailablePayload, WallpaperPayload, WallpaperUploadedEvent,
    WALLPAPER_UPLOADED_SUBJECT, WALLPAPER_VARIANT_AVAILABLE_SUBJECT,
};
pub use error::EventError;
pub use publisher::{EventBus, NatsEventBus};
