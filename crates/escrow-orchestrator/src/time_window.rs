//! The five time-window inequalities every Payment/Purchase create must
//! satisfy (§4.3, §8 "Time-window rules").

use escrow_core::error::OrchestratorError;
use escrow_core::time::{TimestampMs, HOUR_MS, MINUTE_MS};

pub struct TimeWindowInput {
    pub pay_by_time: TimestampMs,
    pub submit_result_time: TimestampMs,
    pub unlock_time: Option<TimestampMs>,
    pub external_dispute_unlock_time: Option<TimestampMs>,
}

pub struct TimeWindow {
    pub pay_by_time: TimestampMs,
    pub submit_result_time: TimestampMs,
    pub unlock_time: TimestampMs,
    pub external_dispute_unlock_time: TimestampMs,
}

/// Validates and defaults the four timestamps per §4.3:
/// - `payByTime ≤ submitResultTime − 5min`
/// - `payByTime ≥ now − 5min`
/// - `submitResultTime ≥ now + 15min`
/// - `submitResultTime ≤ unlockTime − 15min` (`unlockTime` defaults to
///   `submitResultTime + 6h`)
/// - `externalDisputeUnlockTime ≥ unlockTime + 15min` (defaults to
///   `submitResultTime + 12h`)
pub fn validate_time_window(input: TimeWindowInput, now: TimestampMs) -> Result<TimeWindow, OrchestratorError> {
    let TimeWindowInput {
        pay_by_time,
        submit_result_time,
        unlock_time,
        external_dispute_unlock_time,
    } = input;

    if pay_by_time > submit_result_time - 5 * MINUTE_MS {
        return Err(OrchestratorError::invalid_argument(
            "payByTime must be at least 5 minutes before submitResultTime",
        ));
    }
    if pay_by_time < now - 5 * MINUTE_MS {
        return Err(OrchestratorError::invalid_argument("payByTime must not be more than 5 minutes in the past"));
    }
    if submit_result_time < now + 15 * MINUTE_MS {
        return Err(OrchestratorError::invalid_argument(
            "submitResultTime must be at least 15 minutes in the future",
        ));
    }

    let unlock_time = unlock_time.unwrap_or(submit_result_time + 6 * HOUR_MS);
    if submit_result_time > unlock_time - 15 * MINUTE_MS {
        return Err(OrchestratorError::invalid_argument(
            "submitResultTime must be at least 15 minutes before unlockTime",
        ));
    }

    let external_dispute_unlock_time = external_dispute_unlock_time.unwrap_or(submit_result_time + 12 * HOUR_MS);
    if external_dispute_unlock_time < unlock_time + 15 * MINUTE_MS {
        return Err(OrchestratorError::invalid_argument(
            "externalDisputeUnlockTime must be at least 15 minutes after unlockTime",
        ));
    }

    Ok(TimeWindow {
        pay_by_time,
        submit_result_time,
        unlock_time,
        external_dispute_unlock_time,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base(now: TimestampMs) -> TimeWindowInput {
        TimeWindowInput {
            pay_by_time: now + HOUR_MS,
            submit_result_time: now + 6 * HOUR_MS,
            unlock_time: None,
            external_dispute_unlock_time: None,
        }
    }

    #[test]
    fn accepts_a_well_formed_window_and_fills_defaults() {
        let now = 1_700_000_000_000;
        let window = validate_time_window(base(now), now).unwrap();
        assert_eq!(window.unlock_time, window.submit_result_time + 6 * HOUR_MS);
        assert_eq!(window.external_dispute_unlock_time, window.submit_result_time + 12 * HOUR_MS);
    }

    #[test]
    fn rejects_pay_by_time_after_submit_result_time_minus_five_minutes() {
        let now = 1_700_000_000_000;
        let mut input = base(now);
        input.pay_by_time = input.submit_result_time;
        assert!(validate_time_window(input, now).is_err());
    }

    #[test]
    fn rejects_submit_result_time_too_close_to_now() {
        let now = 1_700_000_000_000;
        let mut input = base(now);
        input.submit_result_time = now + MINUTE_MS;
        input.pay_by_time = now - 10 * MINUTE_MS;
        assert!(validate_time_window(input, now).is_err());
    }

    #[test]
    fn rejects_pay_by_time_too_far_in_the_past() {
        let now = 1_700_000_000_000;
        let mut input = base(now);
        input.pay_by_time = now - 10 * MINUTE_MS;
        assert!(validate_time_window(input, now).is_err());
    }
}
