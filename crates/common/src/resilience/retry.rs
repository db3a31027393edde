//! Retry backoff policy
//!
//! Deterministic capped exponential backoff for network operations. The
//! schedule carries no jitter so callers and tests can assert the exact
//! delays an operation will observe.

use std::time::Duration;

/// Backoff schedule for a retried operation
///
/// An operation runs up to `max_attempts` times. After failed attempt `n`
/// (1-based, while `n < max_attempts`) the caller sleeps `delay_for(n)`
/// before attempt `n + 1`. With the defaults that is:
///
/// ```text
/// attempt 1 --(1s)-- attempt 2 --(2s)-- attempt 3
/// ```
///
/// Each delay grows by `multiplier` and never exceeds `max_delay`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Create a new policy builder
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::new()
    }

    /// Validate the policy
    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("max_attempts must be greater than 0".to_string());
        }
        if self.multiplier < 1.0 {
            return Err("multiplier must be at least 1.0".to_string());
        }
        if self.max_delay < self.initial_delay {
            return Err("max_delay must be at least initial_delay".to_string());
        }
        Ok(())
    }

    /// Sleep duration after failed attempt `attempt` (1-based).
    ///
    /// Computed in floating seconds and capped before conversion so large
    /// exponents cannot overflow `Duration`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1).min(63)).unwrap_or(63);
        let scaled = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::from_secs_f64(scaled.min(self.max_delay.as_secs_f64()))
    }

    /// Whether another attempt is allowed after `attempt` failures.
    pub fn has_attempts_remaining(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// The full sleep schedule, one entry per gap between attempts.
    pub fn schedule(&self) -> Vec<Duration> {
        (1..self.max_attempts).map(|attempt| self.delay_for(attempt)).collect()
    }
}

/// Builder for RetryPolicy
#[derive(Debug)]
pub struct RetryPolicyBuilder {
    policy: RetryPolicy,
}

impl Default for RetryPolicyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryPolicyBuilder {
    pub fn new() -> Self {
        Self { policy: RetryPolicy::default() }
    }

    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.policy.max_attempts = max_attempts;
        self
    }

    pub fn initial_delay(mut self, initial_delay: Duration) -> Self {
        self.policy.initial_delay = initial_delay;
        self
    }

    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.policy.multiplier = multiplier;
        self
    }

    pub fn max_delay(mut self, max_delay: Duration) -> Self {
        self.policy.max_delay = max_delay;
        self
    }

    pub fn build(self) -> Result<RetryPolicy, String> {
        self.policy.validate()?;
        Ok(self.policy)
    }
}
