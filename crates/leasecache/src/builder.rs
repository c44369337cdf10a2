// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Builder for [`SelfPopulatingCache`].

use std::fmt::Debug;
use std::marker::PhantomData;
use std::time::Duration;

#[cfg(feature = "memory")]
use std::hash::Hash;

#[cfg(feature = "memory")]
use leasecache_lease::InMemoryLeases;
use leasecache_lease::LeaseCoordinator;
use leasecache_store::CacheStore;
#[cfg(feature = "memory")]
use leasecache_store::InMemoryStore;
use tick::Clock;

use crate::cache::{ErrorSink, SelfPopulatingCache};
use crate::error::{BoxError, ConfigError, Error};
use crate::leased::LeasedPopulator;
use crate::options::PopulateOptions;
use crate::populate::{PopulateFn, Populator};
use crate::telemetry::{CacheName, CacheTelemetry};

const DEFAULT_NAME: CacheName = "leasecache";

/// Builder for [`SelfPopulatingCache`].
///
/// Created by [`SelfPopulatingCache::builder`]. A store, a lease coordinator, and a
/// populate function are required; everything else has a default.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use leasecache::{InMemoryLeases, InMemoryStore, SelfPopulatingCache};
/// use tick::Clock;
///
/// let clock = Clock::new_frozen();
/// let cache = SelfPopulatingCache::builder::<String, u64>(clock.clone())
///     .name("user_scores")
///     .store(InMemoryStore::new())
///     .leases(InMemoryLeases::new(clock))
///     .populate(|key: String| async move { Ok::<_, std::io::Error>(key.len() as u64) })
///     .populate_timeout(Duration::from_secs(2))
///     .lease_expires_in(Duration::from_secs(60))
///     .namespace("scores:")
///     .build()
///     .unwrap();
///
/// assert_eq!(cache.lease_name(&"alice".to_string()), "scores:alice");
/// ```
pub struct SelfPopulatingCacheBuilder<K, V, S = (), L = ()> {
    clock: Clock,
    name: CacheName,
    store: S,
    leases: L,
    populate: Option<PopulateFn<K, V>>,
    options: PopulateOptions,
    on_error: Option<ErrorSink>,
    logs: bool,
    _phantom: PhantomData<fn(K) -> V>,
}

impl<K, V> SelfPopulatingCacheBuilder<K, V> {
    pub(crate) fn new(clock: Clock) -> Self {
        Self {
            clock,
            name: DEFAULT_NAME,
            store: (),
            leases: (),
            populate: None,
            options: PopulateOptions::default(),
            on_error: None,
            logs: true,
            _phantom: PhantomData,
        }
    }
}

impl<K, V, L> SelfPopulatingCacheBuilder<K, V, (), L> {
    /// Sets the store values are read from and written to.
    ///
    /// Wrap the store in an [`Arc`](std::sync::Arc) to share it between caches.
    pub fn store<S>(self, store: S) -> SelfPopulatingCacheBuilder<K, V, S, L>
    where
        S: CacheStore<K, V>,
    {
        SelfPopulatingCacheBuilder {
            clock: self.clock,
            name: self.name,
            store,
            leases: self.leases,
            populate: self.populate,
            options: self.options,
            on_error: self.on_error,
            logs: self.logs,
            _phantom: PhantomData,
        }
    }

    /// Uses a process-local [`InMemoryStore`].
    #[cfg(feature = "memory")]
    #[must_use]
    pub fn memory(self) -> SelfPopulatingCacheBuilder<K, V, InMemoryStore<K, V>, L>
    where
        K: Clone + Hash + Eq + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        self.store(InMemoryStore::new())
    }
}

impl<K, V, S> SelfPopulatingCacheBuilder<K, V, S, ()> {
    /// Sets the coordinator that hands out repopulation leases.
    ///
    /// Caches in different processes only exclude each other if they share the
    /// coordinator and the [`namespace`](Self::namespace).
    pub fn leases<L>(self, leases: L) -> SelfPopulatingCacheBuilder<K, V, S, L>
    where
        L: LeaseCoordinator,
    {
        SelfPopulatingCacheBuilder {
            clock: self.clock,
            name: self.name,
            store: self.store,
            leases,
            populate: self.populate,
            options: self.options,
            on_error: self.on_error,
            logs: self.logs,
            _phantom: PhantomData,
        }
    }

    /// Uses a process-local [`InMemoryLeases`] driven by the builder's clock.
    #[cfg(feature = "memory")]
    #[must_use]
    pub fn memory_leases(self) -> SelfPopulatingCacheBuilder<K, V, S, InMemoryLeases> {
        let leases = InMemoryLeases::new(self.clock.clone());
        self.leases(leases)
    }
}

impl<K, V, S, L> SelfPopulatingCacheBuilder<K, V, S, L> {
    /// Sets the function that computes the value of a key.
    ///
    /// The function runs on a spawned Tokio task. If it runs longer than the
    /// [`populate_timeout`](Self::populate_timeout) the caller gets a timeout error, but
    /// the function is not cancelled, so it should be safe to run more than once.
    #[must_use]
    pub fn populate<F, Fut, E>(mut self, populate: F) -> Self
    where
        F: Fn(K) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
        E: Into<BoxError>,
    {
        self.populate = Some(PopulateFn::new(populate));
        self
    }

    /// Sets how long an unreleased repopulation lease lasts. Defaults to 300 seconds.
    #[must_use]
    pub fn lease_expires_in(mut self, lease_expires_in: Duration) -> Self {
        self.options.lease_expires_in = lease_expires_in;
        self
    }

    /// Sets how long one populate invocation may run. Defaults to 30 seconds.
    #[must_use]
    pub fn populate_timeout(mut self, populate_timeout: Duration) -> Self {
        self.options.populate_timeout = populate_timeout;
        self
    }

    /// Sets the prefix of lease names. Defaults to `"leasecache:"`.
    #[must_use]
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.options.namespace = namespace.into();
        self
    }

    /// Replaces the timing and namespace settings at once.
    #[must_use]
    pub fn options(mut self, options: PopulateOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the name that tags this cache's log events. Defaults to `"leasecache"`.
    #[must_use]
    pub fn name(mut self, name: CacheName) -> Self {
        self.name = name;
        self
    }

    /// Sets the callback that receives background repopulation errors.
    ///
    /// Without one, errors are logged with `tracing` at `ERROR` level. Lease contention is
    /// not an error and never reaches the callback.
    #[must_use]
    pub fn on_error<F>(mut self, on_error: F) -> Self
    where
        F: Fn(&Error) + Send + Sync + 'static,
    {
        self.on_error = Some(ErrorSink::new(on_error));
        self
    }

    /// Enables or disables cache event logging. Enabled by default.
    #[must_use]
    pub fn logs(mut self, enabled: bool) -> Self {
        self.logs = enabled;
        self
    }
}

impl<K, V, S, L> SelfPopulatingCacheBuilder<K, V, S, L>
where
    S: CacheStore<K, V>,
    L: LeaseCoordinator,
{
    /// Validates the configuration and builds the cache.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if no populate function was set or if either duration
    /// is zero.
    pub fn build(self) -> Result<SelfPopulatingCache<K, V, S, L>, ConfigError> {
        let populate = self
            .populate
            .ok_or_else(|| ConfigError::new("a populate function is required"))?;
        let PopulateOptions {
            lease_expires_in,
            populate_timeout,
            namespace,
        } = self.options;

        if lease_expires_in.is_zero() {
            return Err(ConfigError::new("lease_expires_in must be greater than zero"));
        }
        if populate_timeout.is_zero() {
            return Err(ConfigError::new("populate_timeout must be greater than zero"));
        }
        if lease_expires_in < populate_timeout {
            tracing::warn!(
                cache.name = self.name,
                ?lease_expires_in,
                ?populate_timeout,
                "lease can expire while populate is still running; another holder may repopulate concurrently"
            );
        }

        let telemetry = CacheTelemetry::new(self.name, self.logs);
        let populator = Populator::new(populate, self.store, populate_timeout, self.clock, telemetry);
        let leased = LeasedPopulator::new(populator, self.leases, namespace, lease_expires_in);
        let on_error = self.on_error.unwrap_or_else(|| ErrorSink::logging(self.name));

        Ok(SelfPopulatingCache::new(self.name, leased, on_error))
    }
}

impl<K, V, S, L> Debug for SelfPopulatingCacheBuilder<K, V, S, L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelfPopulatingCacheBuilder")
            .field("name", &self.name)
            .field("options", &self.options)
            .field("has_populate", &self.populate.is_some())
            .field("logs", &self.logs)
            .finish_non_exhaustive()
    }
}
