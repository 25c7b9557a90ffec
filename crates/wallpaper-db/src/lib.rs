pub mod repository;

pub use repository::{PgWallpaperRepository, StatePatch, WallpaperRepository};
