// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::{Debug, Display};
use std::panic::AssertUnwindSafe;
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use futures::{FutureExt, Stream, StreamExt};
use leasecache_lease::LeaseCoordinator;
use leasecache_store::CacheStore;
use tick::Clock;

use crate::builder::SelfPopulatingCacheBuilder;
use crate::error::{Error, PopulateError, panic_cause};
use crate::leased::{Leased, LeasedPopulator};
use crate::stale::{Refresh, StaleEvent, Subscription};
use crate::telemetry::ext::ClockExt;
use crate::telemetry::{CacheActivity, CacheName, CacheOperation};

/// Receives the errors of background repopulations.
pub(crate) struct ErrorSink(Arc<dyn Fn(&Error) + Send + Sync>);

impl ErrorSink {
    pub(crate) fn new<F>(sink: F) -> Self
    where
        F: Fn(&Error) + Send + Sync + 'static,
    {
        Self(Arc::new(sink))
    }

    /// Logs errors at `ERROR` level, tagged with the cache name.
    pub(crate) fn logging(cache_name: CacheName) -> Self {
        Self::new(move |error| {
            tracing::error!(cache.name = cache_name, cache.key = error.key(), error = %error, "background repopulation failed");
        })
    }

    pub(crate) fn call(&self, error: &Error) {
        (self.0)(error);
    }
}

impl Debug for ErrorSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorSink").finish()
    }
}

/// A cache that computes missing values on read and recomputes stale values in the
/// background.
///
/// Reads go to the store first. A miss runs the populate function directly, so
/// concurrent misses on the same key may each compute and write the value. Stale
/// notifications take the other path: the cache acquires a lease named after the key
/// and only the holder recomputes, so one notification delivered to many processes
/// results in one computation.
///
/// Background failures are never returned to the code delivering the notification;
/// they go to the error sink configured with
/// [`on_error`](SelfPopulatingCacheBuilder::on_error).
///
/// Clones share the same store, lease coordinator, and configuration.
///
/// # Examples
///
/// ```
/// use leasecache::{InMemoryLeases, SelfPopulatingCache};
/// use tick::Clock;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let clock = Clock::new_tokio();
/// let cache = SelfPopulatingCache::builder::<String, String>(clock.clone())
///     .memory()
///     .leases(InMemoryLeases::new(clock))
///     .populate(|key: String| async move { Ok::<_, std::io::Error>(key.to_uppercase()) })
///     .build()?;
///
/// assert_eq!(cache.get(&"hello".to_string()).await?, "HELLO");
///
/// // Recompute in the background and wait for it.
/// let outcome = cache.refresh("hello".to_string()).await?;
/// assert_eq!(outcome.into_value().as_deref(), Some("HELLO"));
/// # Ok(())
/// # }
/// ```
pub struct SelfPopulatingCache<K, V, S, L> {
    inner: Arc<CacheInner<K, V, S, L>>,
}

struct CacheInner<K, V, S, L> {
    name: CacheName,
    leased: LeasedPopulator<K, V, S, L>,
    on_error: ErrorSink,
}

impl SelfPopulatingCache<(), (), (), ()> {
    /// Creates a builder for a cache whose timing and lease expiry follow `clock`.
    #[must_use]
    pub fn builder<K, V>(clock: Clock) -> SelfPopulatingCacheBuilder<K, V> {
        SelfPopulatingCacheBuilder::new(clock)
    }
}

impl<K, V, S, L> SelfPopulatingCache<K, V, S, L> {
    pub(crate) fn new(name: CacheName, leased: LeasedPopulator<K, V, S, L>, on_error: ErrorSink) -> Self {
        Self {
            inner: Arc::new(CacheInner { name, leased, on_error }),
        }
    }

    /// The name used to tag this cache's log events.
    #[must_use]
    pub fn name(&self) -> CacheName {
        self.inner.name
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &S {
        self.inner.leased.populator().store()
    }

    /// The lease coordinator guarding background repopulation.
    #[must_use]
    pub fn leases(&self) -> &L {
        self.inner.leased.leases()
    }

    /// The prefix of this cache's lease names.
    #[must_use]
    pub fn namespace(&self) -> &str {
        self.inner.leased.namespace()
    }

    /// How long an unreleased repopulation lease lasts.
    #[must_use]
    pub fn lease_expires_in(&self) -> Duration {
        self.inner.leased.lease_expires_in()
    }

    /// How long one populate invocation may run.
    #[must_use]
    pub fn populate_timeout(&self) -> Duration {
        self.inner.leased.populator().timeout()
    }

    /// The lease name used when repopulating `key`.
    #[must_use]
    pub fn lease_name(&self, key: &K) -> String
    where
        K: Display,
    {
        self.inner.leased.lease_name(key)
    }
}

impl<K, V, S, L> SelfPopulatingCache<K, V, S, L>
where
    K: Clone + Display + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    S: CacheStore<K, V> + 'static,
    L: LeaseCoordinator + 'static,
{
    /// Returns the cached value for `key`, computing and storing it on a miss.
    ///
    /// A hit never runs the populate function or touches the lease coordinator.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] if the store read or write fails, and
    /// [`Error::Populate`] if the populate function fails, panics, or runs out of time.
    pub async fn get(&self, key: &K) -> Result<V, Error> {
        let populator = self.inner.leased.populator();
        let timed = populator.clock().timed_async(populator.store().get(key)).await;

        if let Some(value) = timed.result? {
            populator
                .telemetry()
                .record(CacheOperation::Get, CacheActivity::Hit, key, Some(timed.duration));
            return Ok(value);
        }

        populator
            .telemetry()
            .record(CacheOperation::Get, CacheActivity::Miss, key, Some(timed.duration));
        populator.populate(key, None).await
    }

    /// Computes the value for `key` and stores it, without taking a lease.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Populate`] if the populate function fails, panics, or runs out of
    /// time, and [`Error::Store`] if the value cannot be written.
    pub async fn populate(&self, key: &K) -> Result<V, Error> {
        self.inner.leased.populator().populate(key, None).await
    }

    /// Recomputes `key` while holding its lease.
    ///
    /// Resolves to [`Leased::Skipped`] when another holder owns the lease. On failure
    /// the lease is left to expire, which spaces out retries by the lease lifetime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Lock`] if the coordinator fails, [`Error::Populate`] if the
    /// computation fails, and [`Error::Store`] if the value cannot be written.
    pub async fn leased_populate(&self, key: &K) -> Result<Leased<V>, Error> {
        self.inner.leased.leased_populate(key).await
    }

    /// Starts a lease-guarded repopulation of `key` in the background.
    ///
    /// Must be called from within a Tokio runtime. Errors are reported to the error
    /// sink; the returned handle can also be awaited for the outcome.
    pub fn refresh(&self, key: K) -> Refresh<V> {
        let cache = self.clone();
        let name = key.to_string();

        let task_key = name.clone();
        let task = tokio::spawn(async move {
            let result = AssertUnwindSafe(cache.inner.leased.leased_populate(&key))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| Err(PopulateError::unleased(task_key, panic_cause(panic)).into()));
            if let Err(error) = &result {
                cache.inner.on_error.call(error);
            }
            result
        });

        Refresh::new(name, task)
    }

    /// Handles a stale notification by starting a background repopulation.
    pub fn on_stale(&self, event: StaleEvent<K>) -> Refresh<V> {
        self.refresh(event.key)
    }

    /// Forwards every event of `events` to [`on_stale`](Self::on_stale).
    ///
    /// Each event starts its own repopulation; events for different keys proceed
    /// concurrently. Forwarding stops when the stream ends or the returned
    /// [`Subscription`] is dropped.
    pub fn subscribe<E>(&self, events: E) -> Subscription
    where
        E: Stream<Item = StaleEvent<K>> + Send + 'static,
    {
        let cache = self.clone();

        Subscription::new(tokio::spawn(async move {
            let mut events = pin!(events);
            while let Some(event) = events.next().await {
                drop(cache.on_stale(event));
            }
        }))
    }
}

impl<K, V, S, L> Clone for SelfPopulatingCache<K, V, S, L> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V, S, L> Debug for SelfPopulatingCache<K, V, S, L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelfPopulatingCache")
            .field("name", &self.inner.name)
            .field("namespace", &self.namespace())
            .field("lease_expires_in", &self.lease_expires_in())
            .field("populate_timeout", &self.populate_timeout())
            .finish_non_exhaustive()
    }
}
