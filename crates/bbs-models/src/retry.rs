//! Retry policy shared by the transaction runner and the RPC client.

use std::time::Duration;

/// Bounded retry with a fixed pause between attempts.
///
/// `max_attempts` counts the first try, so `3` means one attempt plus two
/// retries. Tests use [`RetryPolicy::immediate`] to avoid real timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    pause: Duration,
}

impl RetryPolicy {
    pub const DEFAULT_ATTEMPTS: u32 = 3;
    pub const DEFAULT_PAUSE: Duration = Duration::from_millis(500);

    pub const fn new(max_attempts: u32, pause: Duration) -> Self {
        // At least one attempt is always made.
        let max_attempts = if max_attempts == 0 { 1 } else { max_attempts };
        Self {
            max_attempts,
            pause,
        }
    }

    /// Retry without pausing.
    pub const fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO)
    }

    /// Try exactly once.
    pub const fn never() -> Self {
        Self::new(1, Duration::ZERO)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Pause to wait after the given failed attempt (1-based).
    pub fn pause_after(&self, _attempt: u32) -> Duration {
        self.pause
    }

    /// Whether another attempt is allowed after `attempt` (1-based) failed.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_ATTEMPTS, Self::DEFAULT_PAUSE)
    }
}
