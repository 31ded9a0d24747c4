//! Timestamp conventions.
//!
//! Spec reference: §3 — "Timestamps are Unix milliseconds unless noted."
//! Internal arithmetic stays in `i64` milliseconds; the HTTP/JSON edge
//! (`escrow-api`) is responsible for any RFC3339 rendering.

use chrono::{DateTime, Utc};

pub type TimestampMs = i64;

pub const MINUTE_MS: TimestampMs = 60_000;
pub const HOUR_MS: TimestampMs = 60 * MINUTE_MS;

/// A source of "now", injected everywhere instead of calling
/// `chrono::Utc::now()` directly so tests can fix the clock.
///
/// Spec reference: time-window rules in §4.3 are evaluated against "now" —
/// a pluggable clock is what let the harness in `tests/` replay the §8
/// scenarios deterministically.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> TimestampMs;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> TimestampMs {
        Utc::now().timestamp_millis()
    }
}

/// A fixed clock for tests and deterministic replay.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub TimestampMs);

impl Clock for FixedClock {
    fn now_ms(&self) -> TimestampMs {
        self.0
    }
}

pub fn to_datetime(ms: TimestampMs) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
}
