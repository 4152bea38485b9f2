//! Pitchside query cache.
//!
//! A process-wide keyed cache of remote reads plus the machinery that keeps
//! it consistent with remote writes:
//!
//! - **Store**: [`QueryStore`] holds entries, coalesces concurrent loads and
//!   retries transport failures.
//! - **Table**: [`Mutation::rule`] declares which reads each write makes stale.
//! - **Invalidation**: [`Invalidator`] applies a settled mutation's rule to
//!   the store before the mutation accessor returns.
//! - **Polling**: [`Poller`] refetches observed keys on an interval.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! max_entries = 512
//! retry_attempts = 3
//! notification_poll_seconds = 30
//! # ... see config/default.toml for all options
//! ```

mod config;
mod invalidator;
mod keys;
pub(crate) mod lock;
mod poller;
mod store;
pub mod table;

pub use config::{CacheConfig, QueryOptions, RetryPolicy};
pub use invalidator::{Applied, Invalidator};
pub use keys::{CacheKey, KeyParam, KeyPattern, Resource};
pub use poller::Poller;
pub use store::{
    AnyValue, CacheEntry, EntryStatus, FetchError, Loader, Observer, QueryStore, loader,
};
pub use table::{InvalidationRule, Mutation};

pub(crate) use invalidator::METRIC_CACHE_INVALIDATE_MS;
pub(crate) use store::{
    METRIC_QUERY_COALESCED, METRIC_QUERY_FETCH_MS, METRIC_QUERY_HIT, METRIC_QUERY_MISS,
};
