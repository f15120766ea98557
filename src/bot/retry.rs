//! How the poller reacts to consecutive fetch failures.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay after every failure.
    Fixed(Duration),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Consecutive failures allowed before giving up. `None` retries forever.
    pub max_attempts: Option<u32>,
    pub backoff: Backoff,
}

impl RetryPolicy {
    /// Retry forever, waiting `interval` between attempts.
    pub fn forever(interval: Duration) -> Self {
        Self { max_attempts: None, backoff: Backoff::Fixed(interval) }
    }

    pub fn bounded(max_attempts: u32, interval: Duration) -> Self {
        Self { max_attempts: Some(max_attempts), backoff: Backoff::Fixed(interval) }
    }

    /// Whether to keep going after `failures` consecutive failures.
    pub fn should_retry(&self, failures: u32) -> bool {
        match self.max_attempts {
            Some(max) => failures < max,
            None => true,
        }
    }

    /// Wait before the next attempt after `failures` consecutive failures.
    pub fn delay(&self, _failures: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed(d) => d,
        }
    }
}
