//! Sync timing: debounce windows, pull interval and retry backoff
//!
//! Pure values and functions that can be tested without any I/O.

use std::time::Duration;

/// Push debounce window
pub const DEFAULT_PUSH_DEBOUNCE: Duration = Duration::from_secs(1);
/// Interval between background pulls
pub const DEFAULT_PULL_INTERVAL: Duration = Duration::from_secs(30);
/// Draft save debounce window
pub const DEFAULT_DRAFT_DEBOUNCE: Duration = Duration::from_secs(5);
/// Timeout applied to each remote request
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Bounded exponential backoff for failed pushes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total push attempts per pending change, including the first one
    pub max_attempts: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Upper bound on any single delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Check if another attempt is allowed after `failed_attempts` failures
    pub fn should_retry(&self, failed_attempts: u32) -> bool {
        failed_attempts < self.max_attempts
    }

    /// Delay before the retry that follows the `failed_attempts`-th failure
    ///
    /// Doubles from `base_delay` (2s, 4s, 8s, ...) and is capped at
    /// `max_delay`.
    pub fn delay_for(&self, failed_attempts: u32) -> Duration {
        let exponent = failed_attempts.saturating_sub(1).min(31);
        let delay = self.base_delay.saturating_mul(1u32 << exponent);
        delay.min(self.max_delay)
    }
}

/// Engine timing configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    pub push_debounce: Duration,
    pub pull_interval: Duration,
    pub draft_debounce: Duration,
    /// Bound on each remote request, see [`HttpRemoteStore::from_settings`]
    ///
    /// [`HttpRemoteStore::from_settings`]: crate::remote::HttpRemoteStore::from_settings
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            push_debounce: DEFAULT_PUSH_DEBOUNCE,
            pull_interval: DEFAULT_PULL_INTERVAL,
            draft_debounce: DEFAULT_DRAFT_DEBOUNCE,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }
}

impl SyncSettings {
    pub fn with_push_debounce(mut self, debounce: Duration) -> Self {
        self.push_debounce = debounce;
        self
    }

    pub fn with_pull_interval(mut self, interval: Duration) -> Self {
        self.pull_interval = interval;
        self
    }

    pub fn with_draft_debounce(mut self, debounce: Duration) -> Self {
        self.draft_debounce = debounce;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Convert a std duration into a chrono duration for deadline arithmetic
pub(crate) fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX)
}
