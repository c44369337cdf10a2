// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Computing a value and writing it to the store.

use std::fmt::{Debug, Display};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use leasecache_store::CacheStore;
use tick::Clock;

use crate::error::{BoxError, Error, PopulateError, TimeoutError};
use crate::telemetry::ext::ClockExt;
use crate::telemetry::{CacheActivity, CacheOperation, CacheTelemetry};
use crate::timeout::TimeoutGuard;

type PopulateFuture<V> = Pin<Box<dyn Future<Output = Result<V, BoxError>> + Send>>;

/// Shared handle to the user-supplied function that computes a key's value.
pub(crate) struct PopulateFn<K, V>(Arc<dyn Fn(K) -> PopulateFuture<V> + Send + Sync>);

impl<K, V> PopulateFn<K, V> {
    pub(crate) fn new<F, Fut, E>(populate: F) -> Self
    where
        F: Fn(K) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
        E: Into<BoxError>,
    {
        Self(Arc::new(move |key| {
            let future = populate(key);
            Box::pin(async move { future.await.map_err(Into::into) })
        }))
    }

    pub(crate) fn call(&self, key: K) -> PopulateFuture<V> {
        (self.0)(key)
    }
}

impl<K, V> Clone for PopulateFn<K, V> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<K, V> Debug for PopulateFn<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PopulateFn").finish()
    }
}

/// Runs the populate function under a time budget and stores what it returns.
#[derive(Debug)]
pub(crate) struct Populator<K, V, S> {
    populate: PopulateFn<K, V>,
    store: S,
    timeout: Duration,
    clock: Clock,
    telemetry: CacheTelemetry,
}

impl<K, V, S> Populator<K, V, S> {
    pub(crate) fn new(populate: PopulateFn<K, V>, store: S, timeout: Duration, clock: Clock, telemetry: CacheTelemetry) -> Self {
        Self {
            populate,
            store,
            timeout,
            clock,
            telemetry,
        }
    }

    pub(crate) fn store(&self) -> &S {
        &self.store
    }

    pub(crate) fn timeout(&self) -> Duration {
        self.timeout
    }

    pub(crate) fn clock(&self) -> &Clock {
        &self.clock
    }

    pub(crate) fn telemetry(&self) -> &CacheTelemetry {
        &self.telemetry
    }
}

impl<K, V, S> Populator<K, V, S>
where
    K: Clone + Display + Send + Sync + 'static,
    V: Clone + Send + 'static,
    S: CacheStore<K, V>,
{
    /// Computes the value for `key` and writes it to the store.
    ///
    /// `lease` names the lease held by the caller, if any; it is recorded in the
    /// [`PopulateError`] when the computation fails.
    ///
    /// The populate function is invoked on a spawned task, so a panic, an error, or an
    /// overrun of the budget all surface as a [`PopulateError`]. A failed store write is
    /// returned as [`Error::Store`].
    pub(crate) async fn populate(&self, key: &K, lease: Option<&str>) -> Result<V, Error> {
        let operation = if lease.is_some() {
            CacheOperation::Refresh
        } else {
            CacheOperation::Populate
        };

        let populate = self.populate.clone();
        let owned_key = key.clone();
        let guard = TimeoutGuard::spawn(&self.clock, self.timeout, async move { populate.call(owned_key).await });
        let timed = self.clock.timed_async(guard).await;

        let value = match timed.result {
            Ok(value) => value,
            Err(cause) => {
                let activity = if cause.is::<TimeoutError>() {
                    CacheActivity::TimedOut
                } else {
                    CacheActivity::PopulateFailed
                };
                self.telemetry.record(operation, activity, key, Some(timed.duration));

                let error = match lease {
                    Some(lease) => PopulateError::leased(key.to_string(), lease, cause),
                    None => PopulateError::unleased(key.to_string(), cause),
                };
                return Err(error.into());
            }
        };

        if let Err(error) = self.store.set(key, value.clone()).await {
            self.telemetry.record(operation, CacheActivity::PopulateFailed, key, Some(timed.duration));
            return Err(error.into());
        }

        self.telemetry.record(operation, CacheActivity::Populated, key, Some(timed.duration));
        Ok(value)
    }
}
