//! Applies the invalidation table after a mutation settles.

use std::time::Instant;

use metrics::histogram;
use tracing::{info, instrument};

use super::keys::KeyPattern;
use super::store::QueryStore;
use super::table::Mutation;

pub(crate) const METRIC_CACHE_INVALIDATE_MS: &str = "pitchside_cache_invalidate_ms";

/// Counts from applying one mutation's rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Applied {
    pub invalidated: usize,
    pub refetched: usize,
}

/// Marks the reads a settled mutation declares stale, on the calling thread.
///
/// 1. Invalidate every declared resource
/// 2. For eager-refetch rules, start loads for the observed keys among them
///
/// Both steps finish before [`settled`](Self::settled) returns, so a caller
/// that reads after its own mutation never sees the pre-mutation value as
/// fresh, whatever other mutations run at the same time.
#[derive(Clone)]
pub struct Invalidator {
    store: QueryStore,
}

impl Invalidator {
    pub fn new(store: QueryStore) -> Self {
        Self { store }
    }

    /// Must run inside a Tokio runtime when the rule refetches eagerly.
    #[instrument(skip(self))]
    pub fn settled(&self, mutation: Mutation) -> Applied {
        let started_at = Instant::now();
        let rule = mutation.rule();
        let mut applied = Applied::default();

        for resource in rule.invalidates {
            applied.invalidated += self.store.invalidate(&KeyPattern::Resource(*resource));
        }
        if rule.refetch {
            for resource in rule.invalidates {
                applied.refetched += self
                    .store
                    .refetch_active(&KeyPattern::Resource(*resource));
            }
        }

        info!(
            mutation = %mutation,
            invalidated = applied.invalidated,
            refetched = applied.refetched,
            "Mutation settled; declared reads invalidated"
        );

        histogram!(METRIC_CACHE_INVALIDATE_MS, "mutation" => mutation.as_str())
            .record(started_at.elapsed().as_secs_f64() * 1000.0);

        applied
    }

    pub fn store(&self) -> &QueryStore {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    use super::*;
    use crate::cache::config::{CacheConfig, QueryOptions};
    use crate::cache::keys::{CacheKey, Resource};
    use crate::cache::store::{EntryStatus, loader};
    use crate::rpc::RpcError;

    fn invalidator() -> Invalidator {
        Invalidator::new(QueryStore::new(&CacheConfig::default()))
    }

    #[tokio::test]
    async fn settled_marks_declared_resources_stale() {
        let invalidator = invalidator();
        let store = invalidator.store().clone();
        store.set(CacheKey::new(Resource::MyBookings), Vec::<u8>::new());
        store.set(CacheKey::new(Resource::Products), Vec::<u8>::new());

        let applied = invalidator.settled(Mutation::CreateBooking);

        assert_eq!(applied.invalidated, 1);
        assert_eq!(applied.refetched, 0);
        let bookings = store.get(&CacheKey::new(Resource::MyBookings)).unwrap();
        let products = store.get(&CacheKey::new(Resource::Products)).unwrap();
        assert_eq!(bookings.status, EntryStatus::Stale);
        assert_eq!(products.status, EntryStatus::Idle);
    }

    #[tokio::test]
    async fn uncached_reads_are_a_no_op() {
        let invalidator = invalidator();

        assert_eq!(invalidator.settled(Mutation::AddReview), Applied::default());
        assert!(invalidator.store().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn eager_refetch_reloads_observed_keys() {
        let invalidator = invalidator();
        let store = invalidator.store().clone();
        let calls = Arc::new(AtomicUsize::new(0));
        let load = {
            let calls = Arc::clone(&calls);
            loader(move || {
                let calls = Arc::clone(&calls);
                async move { Ok::<_, RpcError>(calls.fetch_add(1, Ordering::SeqCst) + 1) }
            })
        };
        let key = CacheKey::new(Resource::MembershipTiers);
        let options = QueryOptions::default();

        let _observer = store.observe(key.clone(), Arc::clone(&load), options);
        store.fetch(key.clone(), Arc::clone(&load), options).await.unwrap();

        let applied = invalidator.settled(Mutation::CreateMembershipTier);
        assert_eq!(applied.refetched, 1);
        tokio::time::sleep(Duration::from_millis(1)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        let entry = store.get(&key).unwrap();
        assert_eq!(entry.status, EntryStatus::Idle);
        assert_eq!(*entry.value_as::<usize>().unwrap(), 2);
    }

    #[test]
    fn own_reads_are_stale_despite_concurrent_mutations() {
        let invalidator = invalidator();
        let store = invalidator.store().clone();
        let reviews = CacheKey::new(Resource::Reviews);

        thread::scope(|scope| {
            for _ in 0..3 {
                let invalidator = invalidator.clone();
                scope.spawn(move || {
                    for _ in 0..2_000 {
                        invalidator.settled(Mutation::UpdateVenueInfo);
                    }
                });
            }

            for round in 0..2_000_usize {
                store.set(reviews.clone(), round);
                invalidator.settled(Mutation::AddReview);
                assert_eq!(store.get(&reviews).unwrap().status, EntryStatus::Stale);
            }
        });
    }
}
