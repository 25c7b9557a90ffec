//! `wlpr_<ULID>` identifiers.

use ulid::Ulid;

pub const WALLPAPER_ID_PREFIX: &str = "wlpr_";

pub fn new_wallpaper_id() -> String {
    format!("{WALLPAPER_ID_PREFIX}{}", Ulid::new())
}

pub fn new_event_id() -> String {
    Ulid::new().to_string()
}

pub fn is_wallpaper_id(candidate: &str) -> bool {
    candidate
        .strip_prefix(WALLPAPER_ID_PREFIX)
        .map(|rest| Ulid::from_string(rest).is_ok())
        .unwrap_or(false)
}
