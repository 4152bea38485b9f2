//! Cache configuration.
//!
//! Controls store capacity, retry policy, garbage collection and polling.
//! Built from the validated `[cache]` settings.

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::Deserialize;

use super::keys::Resource;

// Default values for cache configuration
const DEFAULT_MAX_ENTRIES: usize = 512;
const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 1_000;
const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 30_000;
const DEFAULT_GC_AFTER_MS: u64 = 5 * 60 * 1_000;
const DEFAULT_JANITOR_INTERVAL_MS: u64 = 60 * 1_000;
const DEFAULT_NOTIFICATION_POLL_INTERVAL_MS: u64 = 30_000;

const ADMIN_STATUS_STALE_AFTER: Duration = Duration::from_secs(5 * 60);
const ADMIN_STATUS_GC_AFTER: Duration = Duration::from_secs(10 * 60);
const ADMIN_STATUS_RETRY_ATTEMPTS: u32 = 2;

/// Runtime cache configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of cached keys.
    pub max_entries: usize,
    /// Retries after a transport failure before a fetch reports an error.
    pub retry_attempts: u32,
    /// First retry delay (ms); doubles per attempt.
    pub retry_base_delay_ms: u64,
    /// Upper bound for a single retry delay (ms).
    pub retry_max_delay_ms: u64,
    /// Inactivity window (ms) after which an unobserved entry is collected.
    pub gc_after_ms: u64,
    /// How often the janitor sweeps (ms).
    pub janitor_interval_ms: u64,
    /// Poll interval (ms) for notification reads.
    pub notification_poll_interval_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
            retry_max_delay_ms: DEFAULT_RETRY_MAX_DELAY_MS,
            gc_after_ms: DEFAULT_GC_AFTER_MS,
            janitor_interval_ms: DEFAULT_JANITOR_INTERVAL_MS,
            notification_poll_interval_ms: DEFAULT_NOTIFICATION_POLL_INTERVAL_MS,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            max_entries: settings.max_entries.get(),
            retry_attempts: settings.retry_attempts,
            retry_base_delay_ms: settings.retry_base_delay.as_millis() as u64,
            retry_max_delay_ms: settings.retry_max_delay.as_millis() as u64,
            gc_after_ms: settings.gc_after.as_millis() as u64,
            janitor_interval_ms: settings.janitor_interval.as_millis() as u64,
            notification_poll_interval_ms: settings.notification_poll_interval.as_millis() as u64,
        }
    }
}

impl CacheConfig {
    /// Returns the entry limit as NonZeroUsize, clamping to 1 if zero.
    pub fn max_entries_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.max_entries).unwrap_or(NonZeroUsize::MIN)
    }

    pub fn janitor_interval(&self) -> Duration {
        Duration::from_millis(self.janitor_interval_ms.max(1))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.retry_attempts,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
        }
    }

    /// Query options for one resource: the configured defaults plus the
    /// per-resource overrides the client has always applied.
    pub fn options_for(&self, resource: Resource) -> QueryOptions {
        let mut options = QueryOptions {
            stale_after: None,
            gc_after: Duration::from_millis(self.gc_after_ms),
            poll_interval: None,
            retry: self.retry_policy(),
        };

        match resource {
            Resource::CurrentUserProfile => options.retry.attempts = 0,
            Resource::IsCallerAdmin => {
                options.stale_after = Some(ADMIN_STATUS_STALE_AFTER);
                options.gc_after = ADMIN_STATUS_GC_AFTER;
                options.retry.attempts = ADMIN_STATUS_RETRY_ATTEMPTS;
            }
            Resource::MyNotifications | Resource::UnreadNotificationCount => {
                options.poll_interval =
                    Some(Duration::from_millis(self.notification_poll_interval_ms.max(1)));
            }
            _ => {}
        }

        options
    }
}

/// Bounded retry with exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub const NONE: RetryPolicy = RetryPolicy {
        attempts: 0,
        base_delay: Duration::ZERO,
        max_delay: Duration::ZERO,
    };

    /// Delay before retry number `retry` (zero-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2_u32.saturating_pow(retry);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        CacheConfig::default().retry_policy()
    }
}

/// Per-key fetch behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    /// A settled value older than this is treated as stale. `None`: fresh
    /// until invalidated.
    pub stale_after: Option<Duration>,
    /// Inactivity window before an unobserved entry is collected.
    pub gc_after: Duration,
    /// Refetch on a timer while observed.
    pub poll_interval: Option<Duration>,
    pub retry: RetryPolicy,
}

impl Default for QueryOptions {
    fn default() -> Self {
        let config = CacheConfig::default();
        QueryOptions {
            stale_after: None,
            gc_after: Duration::from_millis(config.gc_after_ms),
            poll_interval: None,
            retry: config.retry_policy(),
        }
    }
}
