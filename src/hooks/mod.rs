//! Typed data access over the query cache.
//!
//! Each read accessor binds one remote read to one [`CacheKey`]; each
//! mutation accessor runs one remote write and, once it succeeds, applies
//! the invalidation table so the affected reads are stale before the accessor
//! returns.

mod error;
mod mutations;
mod reads;
mod tracker;

use std::any::Any;
use std::future::Future;
use std::sync::Arc;

use pitchside_api_types::Principal;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use url::Url;

pub use error::MutationError;
pub use tracker::{MutationGuard, MutationTracker};

use crate::cache::{
    CacheConfig, CacheKey, FetchError, Invalidator, KeyPattern, Mutation, Observer, Poller,
    QueryStore, Resource,
};
use crate::rpc::{RpcError, RpcResult, Session, SessionState, VenueBackend};

/// Result of a read accessor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryState<T> {
    /// No backend client yet; the read is disabled.
    Pending,
    Ready(T),
}

impl<T> QueryState<T> {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    pub fn ready(self) -> Option<T> {
        match self {
            Self::Ready(value) => Some(value),
            Self::Pending => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> QueryState<U> {
        match self {
            Self::Ready(value) => QueryState::Ready(f(value)),
            Self::Pending => QueryState::Pending,
        }
    }
}

/// Read and mutation accessors bound to one store and one session.
pub struct DataAccess {
    config: CacheConfig,
    store: QueryStore,
    session: Arc<Session>,
    invalidator: Invalidator,
    tracker: MutationTracker,
    checkout_base: Url,
}

impl DataAccess {
    /// `checkout_base` is the origin payment redirects return to.
    pub fn new(config: CacheConfig, session: Arc<Session>, checkout_base: Url) -> Self {
        let store = QueryStore::new(&config);

        Self {
            config,
            invalidator: Invalidator::new(store.clone()),
            store,
            session,
            tracker: MutationTracker::new(),
            checkout_base: with_trailing_slash(checkout_base),
        }
    }

    pub fn store(&self) -> &QueryStore {
        &self.store
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn invalidator(&self) -> &Invalidator {
        &self.invalidator
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Whether a `mutation` RPC is currently in flight.
    pub fn is_pending(&self, mutation: Mutation) -> bool {
        self.tracker.is_pending(mutation)
    }

    pub fn tracker(&self) -> &MutationTracker {
        &self.tracker
    }

    /// Switch to an authenticated client. Every cached read is invalidated so
    /// caller-scoped data reloads under the new identity.
    pub fn sign_in(&self, actor: Arc<dyn VenueBackend>, principal: Principal) {
        self.session.establish(actor, Some(principal));
        let invalidated = self.store.invalidate(&KeyPattern::All);
        info!(invalidated, "Signed in; cached reads invalidated");
    }

    /// Switch to an anonymous client and drop every cached value.
    /// Subscriptions survive and keep receiving eager refetches.
    pub fn sign_out(&self, anonymous: Arc<dyn VenueBackend>) {
        self.session.establish(anonymous, None);
        self.store.clear();
        info!("Signed out; cached values cleared");
    }

    /// Subscribe to `resource` so eager refetches keep it current.
    pub fn observe(&self, resource: Resource) -> Observer {
        self.store.observe(
            CacheKey::new(resource),
            reads::loader_for(Arc::clone(&self.session), resource),
            self.config.options_for(resource),
        )
    }

    /// Start a poller for every resource with a poll interval.
    pub fn start_polling(&self) -> Vec<Poller> {
        Resource::ALL
            .into_iter()
            .filter_map(|resource| {
                let options = self.config.options_for(resource);
                let period = options.poll_interval?;
                Some(Poller::spawn(
                    &self.store,
                    CacheKey::new(resource),
                    reads::loader_for(Arc::clone(&self.session), resource),
                    options,
                    period,
                ))
            })
            .collect()
    }

    pub fn spawn_janitor(&self) -> JoinHandle<()> {
        self.store.spawn_janitor(self.config.janitor_interval())
    }

    /// Read `resource` through the cache.
    pub async fn query<T>(&self, resource: Resource) -> Result<QueryState<T>, FetchError>
    where
        T: Any + Clone + Default + Send + Sync,
    {
        match self.session.snapshot() {
            SessionState::Initializing => return Ok(QueryState::Pending),
            SessionState::Ready {
                principal: None, ..
            } if resource.requires_identity() => return Ok(QueryState::Ready(T::default())),
            SessionState::Ready { .. } => {}
        }

        let value = self
            .store
            .fetch_as::<T>(
                CacheKey::new(resource),
                reads::loader_for(Arc::clone(&self.session), resource),
                self.config.options_for(resource),
            )
            .await?;
        Ok(QueryState::Ready(T::clone(&value)))
    }

    /// Run one remote write and invalidate its declared reads once it
    /// succeeds. Pending state covers the RPC only.
    async fn mutate<T, F, Fut>(&self, mutation: Mutation, call: F) -> Result<T, MutationError>
    where
        F: FnOnce(Arc<dyn VenueBackend>) -> Fut,
        Fut: Future<Output = RpcResult<T>>,
    {
        let Some(actor) = self.session.actor() else {
            warn!(mutation = %mutation, "Mutation attempted without a backend client");
            return Err(RpcError::NotReady.into());
        };

        let guard = self.tracker.begin(mutation);
        let result = call(actor).await;
        drop(guard);

        match result {
            Ok(output) => {
                self.invalidator.settled(mutation);
                Ok(output)
            }
            Err(err) => {
                warn!(mutation = %mutation, error = %err, "Mutation failed");
                Err(err.into())
            }
        }
    }
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
