//! Exponential backoff.

use std::time::Duration;

/// Delay to wait after failed attempt number `attempt` (1-based):
/// `initial × multiplier^(attempt-1)`. No jitter.
pub fn calculate_backoff(attempt: u32, initial: Duration, multiplier: f64) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
    let factor = multiplier.powi(exponent);
    if !factor.is_finite() {
        return Duration::MAX;
    }

    Duration::try_from_secs_f64(initial.as_secs_f64() * factor).unwrap_or(Duration::MAX)
}
