pub mod missing_events;
pub mod orphaned_blobs;
pub mod orphaned_intents;
pub mod stuck_uploads;

#[cfg(test)]
pub(crate) mod test_support;

/// Per-cycle counters, logged at `info` the way the cleanup service logs
/// per-type counts. Purely observational — callers don't branch on these.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReconcileStats {
    pub claimed: u64,
    pub advanced: u64,
    pub failed: u64,
}
