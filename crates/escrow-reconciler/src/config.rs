//! Reconciler cadence and batch size (§4.4).

/// `intervalMs ∈ [5000, 300000]` (default 30000), and the `[EXPANSION]`
/// batch-size bound SPEC_FULL.md fixes for step 2's "up to a bounded batch".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcilerConfig {
    pub interval_ms: u64,
    pub batch_size: u32,
    pub lease_duration_ms: i64,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            interval_ms: 30_000,
            batch_size: 200,
            lease_duration_ms: 60_000,
        }
    }
}

impl ReconcilerConfig {
    /// Clamps `interval_ms` into the spec's `[5000, 300000]` bound; used
    /// when the value comes from an env var rather than a literal default.
    pub fn with_interval_ms(mut self, interval_ms: u64) -> Self {
        self.interval_ms = interval_ms.clamp(5_000, 300_000);
        self
    }
}
