//! Exponential backoff for release-API requests (§4.H).

use std::time::Duration;

pub const MAX_ATTEMPTS: u32 = 4;
const BASE_DELAY: Duration = Duration::from_secs(1);
const MAX_DELAY: Duration = Duration::from_secs(32);

/// Status codes the release publisher retries on, in addition to network errors.
pub const RETRYABLE_STATUS: [u16; 6] = [403, 429, 500, 502, 503, 504];

/// `base_delay * 2^(attempt-1)`, capped at `max_delay`. `attempt` is 1-based.
pub fn delay_for_attempt(attempt: u32) -> Duration {
    let pow = attempt.saturating_sub(1).min(16);
    BASE_DELAY
        .saturating_mul(2_u32.saturating_pow(pow))
        .min(MAX_DELAY)
}

pub fn is_retryable_status(status: u16) -> bool {
    RETRYABLE_STATUS.contains(&status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_doubles_each_attempt_until_cap() {
        assert_eq!(delay_for_attempt(1), Duration::from_secs(1));
        assert_eq!(delay_for_attempt(2), Duration::from_secs(2));
        assert_eq!(delay_for_attempt(3), Duration::from_secs(4));
        assert_eq!(delay_for_attempt(6), Duration::from_secs(32));
        assert_eq!(delay_for_attempt(20), Duration::from_secs(32));
    }

    #[test]
    fn recognizes_retryable_statuses() {
        assert!(is_retryable_status(429));
        assert!(is_retryable_status(503));
        assert!(!is_retryable_status(404));
        assert!(!is_retryable_status(401));
    }
}
