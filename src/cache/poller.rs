//! Interval refetch for observed keys.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::config::QueryOptions;
use super::keys::CacheKey;
use super::store::{Loader, QueryStore};

/// Refetches one key on a fixed interval while alive.
///
/// Holds an observer on the key so the entry is neither collected nor
/// skipped by eager refetches. Dropping the poller stops it.
pub struct Poller {
    key: CacheKey,
    handle: JoinHandle<()>,
}

impl Poller {
    /// Start polling. The first refetch happens one `period` from now.
    pub fn spawn(
        store: &QueryStore,
        key: CacheKey,
        loader: Loader,
        options: QueryOptions,
        period: Duration,
    ) -> Self {
        let observer = store.observe(key.clone(), loader.clone(), options);
        let task_key = key.clone();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await; // Skip the first immediate tick
            loop {
                interval.tick().await;
                let result = observer
                    .store()
                    .refetch(task_key.clone(), loader.clone(), options)
                    .await;
                match result {
                    Ok(_) => debug!(key = %task_key, "Poll refetch complete"),
                    Err(err) => warn!(key = %task_key, error = %err, "Poll refetch failed"),
                }
            }
        });

        debug!(key = %key, period_ms = period.as_millis() as u64, "Poller started");
        Self { key, handle }
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
