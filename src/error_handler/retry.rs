// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Exponential backoff with jitter, applied between retry attempts in
//! [`super::ErrorHandler::wrap_operation`].

use std::time::Duration;

use rand::Rng;

/// Per-operation retry policy: how many attempts to make and how long to wait between them.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of attempts (the first attempt counts as one).
    pub max_retries: u32,
    /// Base delay, in milliseconds, for the exponential backoff computation.
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
        }
    }
}

impl RetryPolicy {
    /// Compute the backoff delay before attempt number `attempt` (1-indexed), as
    /// `base_delay_ms * 2^(attempt-1)`, jittered by up to ±25%.
    #[must_use]
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let base = self.base_delay_ms.saturating_mul(1u64.saturating_shl(exponent.min(32)));
        jittered(base)
    }
}

/// Apply ±25% jitter to `base_ms`, drawn from a uniform distribution.
fn jittered(base_ms: u64) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_fraction: f64 = rng.gen_range(-0.25..=0.25);
    let jittered_ms = (base_ms as f64 * (1.0 + jitter_fraction)).max(0.0);
    Duration::from_millis(jittered_ms as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_per_attempt_within_jitter_bounds() {
        let policy = RetryPolicy {
            max_retries: 5,
            base_delay_ms: 1000,
        };
        for attempt in 1..=4u32 {
            let expected_base = 1000u64 << (attempt - 1);
            let delay = policy.backoff_for_attempt(attempt);
            let lower = (expected_base as f64 * 0.75) as u64;
            let upper = (expected_base as f64 * 1.25) as u64;
            let observed = delay.as_millis() as u64;
            assert!(
                observed >= lower && observed <= upper,
                "attempt {attempt}: expected {lower}..={upper}, got {observed}"
            );
        }
    }

    #[test]
    fn default_policy_allows_three_attempts() {
        assert_eq!(RetryPolicy::default().max_retries, 3);
    }
}
