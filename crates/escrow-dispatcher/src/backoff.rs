//! Retry backoff for transient submit failures (§4.5).
//!
//! "transient kinds schedule retry with exponential backoff (min 30s,
//! max 10min, jitter)". `attempt` is 1-based: the first retry after an
//! initial failure.

use rand::Rng;

const MIN_BACKOFF_MS: i64 = 30_000;
const MAX_BACKOFF_MS: i64 = 600_000;

/// `min(MAX, MIN * 2^(attempt-1))`, plus up to 20% jitter so a batch of
/// entities that failed in the same cycle don't all retry in lockstep.
pub fn backoff_ms(attempt: u32) -> i64 {
    let exponent = attempt.saturating_sub(1).min(20);
    let scaled = MIN_BACKOFF_MS.saturating_mul(1i64 << exponent);
    let base = scaled.min(MAX_BACKOFF_MS);
    let jitter_span = base / 5;
    if jitter_span == 0 {
        return base;
    }
    base + rand::thread_rng().gen_range(0..=jitter_span)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_attempt_is_close_to_the_floor() {
        let delay = backoff_ms(1);
        assert!((MIN_BACKOFF_MS..=MIN_BACKOFF_MS + MIN_BACKOFF_MS / 5).contains(&delay));
    }

    #[test]
    fn backoff_never_exceeds_the_ceiling_plus_jitter() {
        for attempt in 1..=30 {
            let delay = backoff_ms(attempt);
            assert!(delay <= MAX_BACKOFF_MS + MAX_BACKOFF_MS / 5, "attempt {attempt} delay {delay} too large");
        }
    }

    #[test]
    fn backoff_grows_monotonically_with_attempt_until_capped() {
        assert!(backoff_ms(1) <= backoff_ms(5));
    }
}
