//! Exponential backoff with jitter for transient agent-adapter failures
//! (spec §5: "initial 0.5s, factor 2, cap 8s", up to 3 attempts, never for
//! non-idempotent operations, default off).

use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub factor: f64,
    pub jitter_fraction: f64,
}

impl RetryPolicy {
    /// The spec's named defaults for idempotent agent-adapter calls.
    pub fn agent_default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            factor: 2.0,
            jitter_fraction: 0.2,
        }
    }

    /// No retries: the default for non-idempotent operations and for any
    /// call site that doesn't opt in explicitly.
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            factor: 1.0,
            jitter_fraction: 0.0,
        }
    }

    /// Delay before the given attempt (1-indexed: attempt 1 is the first
    /// retry, following the initial failed call).
    pub fn delay_for_attempt(&self, attempt: u32, jitter_sample: f64) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let raw = self.base_delay.as_secs_f64() * self.factor.powi(exponent);
        let capped = raw.min(self.max_delay.as_secs_f64());
        let jitter = capped * self.jitter_fraction * jitter_sample;
        Duration::from_secs_f64((capped + jitter).max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_default_matches_spec_constants() {
        let policy = RetryPolicy::agent_default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay, Duration::from_millis(500));
        assert_eq!(policy.max_delay, Duration::from_secs(8));
    }

    #[test]
    fn delay_doubles_then_caps() {
        let policy = RetryPolicy::agent_default();
        let d1 = policy.delay_for_attempt(1, 0.0);
        let d2 = policy.delay_for_attempt(2, 0.0);
        let d3 = policy.delay_for_attempt(3, 0.0);
        assert_eq!(d1, Duration::from_millis(500));
        assert_eq!(d2, Duration::from_secs(1));
        assert_eq!(d3, Duration::from_secs(2));

        let d_big = policy.delay_for_attempt(10, 0.0);
        assert_eq!(d_big, Duration::from_secs(8));
    }

    #[test]
    fn disabled_policy_has_a_single_attempt() {
        assert_eq!(RetryPolicy::disabled().max_attempts, 1);
    }

    #[test]
    fn jitter_sample_actually_perturbs_the_delay() {
        let policy = RetryPolicy::agent_default();
        let unjittered = policy.delay_for_attempt(2, 0.0);
        let jittered = policy.delay_for_attempt(2, 1.0);
        assert!(jittered > unjittered, "a nonzero jitter sample must increase the delay above the base value");
    }
}
