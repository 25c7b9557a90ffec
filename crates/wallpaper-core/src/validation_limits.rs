//! Per-user validation limits, consumed by the validation engine (4.C).
//!
//! The default implementation ignores `user_id` and returns the process-wide
//! configuration; a deployment that needs per-tenant quotas implements its own
//! `ValidationLimits` and wires it in at bootstrap instead.

pub struct Limits {
    pub max_file_size_bytes: u64,
    pub min_width: u32,
    pub min_height: u32,
    pub max_width: u32,
    pub max_height: u32,
}

pub trait ValidationLimits: Send + Sync {
    fn limits_for(&self, user_id: &str) -> Limits;
}

pub struct GlobalValidationLimits {
    pub max_file_size_bytes: u64,
    pub min_width: u32,
    pub min_height: u32,
    pub max_width: u32,
    pub max_height: u32,
}

impl ValidationLimits for GlobalValidationLimits {
    fn limits_for(&self, _user_id: &str) -> Limits {
        Limits {
            max_file_size_bytes: self.max_file_size_bytes,
            min_width: self.min_width,
            min_height: self.min_height,
            max_width: self.max_width,
            max_height: self.max_height,
        }
    }
}
