//! Retry policy for transfer attempts.
//!
//! Transient transport failures and post-transfer verification failures
//! draw from the same attempt budget.

use std::time::Duration;

/// Default delay before the first retry.
pub const DEFAULT_INITIAL_DELAY_MS: u64 = 500;

/// Default ceiling for a single backoff delay.
pub const DEFAULT_MAX_DELAY_SECS: u64 = 30;

/// Default growth factor between consecutive delays.
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Default number of attempts per entry, including the first.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// How many times an entry is attempted and how long to wait in between.
#[derive(Clone, Debug, PartialEq)]
pub enum RetryPolicy {
    /// One attempt, no retries.
    None,

    /// Constant delay between attempts.
    Fixed { max_attempts: u32, delay: Duration },

    /// Delay grows by `multiplier` after each failure, capped at `max_delay`.
    ExponentialBackoff {
        max_attempts: u32,
        initial_delay: Duration,
        max_delay: Duration,
        multiplier: f64,
    },
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::exponential(DEFAULT_MAX_ATTEMPTS)
    }
}

impl RetryPolicy {
    /// Exponential backoff with the default curve.
    pub fn exponential(max_attempts: u32) -> Self {
        Self::ExponentialBackoff {
            max_attempts,
            initial_delay: Duration::from_millis(DEFAULT_INITIAL_DELAY_MS),
            max_delay: Duration::from_secs(DEFAULT_MAX_DELAY_SECS),
            multiplier: DEFAULT_BACKOFF_MULTIPLIER,
        }
    }

    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self::Fixed {
            max_attempts,
            delay,
        }
    }

    /// Total attempts allowed, including the first. Never less than one.
    pub fn max_attempts(&self) -> u32 {
        match self {
            RetryPolicy::None => 1,
            RetryPolicy::Fixed { max_attempts, .. }
            | RetryPolicy::ExponentialBackoff { max_attempts, .. } => (*max_attempts).max(1),
        }
    }

    /// Delay to wait after `attempts_made` failed attempts, or `None` when
    /// the budget is spent.
    ///
    /// Delays never decrease as `attempts_made` grows and never exceed the
    /// configured maximum.
    pub fn delay_for_attempt(&self, attempts_made: u32) -> Option<Duration> {
        if attempts_made == 0 || attempts_made >= self.max_attempts() {
            return None;
        }
        match self {
            RetryPolicy::None => None,
            RetryPolicy::Fixed { delay, .. } => Some(*delay),
            RetryPolicy::ExponentialBackoff {
                initial_delay,
                max_delay,
                multiplier,
                ..
            } => {
                let factor = multiplier.max(1.0).powi(attempts_made as i32 - 1);
                let delay_ms = initial_delay.as_millis() as f64 * factor;
                let capped_ms = delay_ms.min(max_delay.as_millis() as f64);
                Some(Duration::from_millis(capped_ms as u64))
            }
        }
    }
}
