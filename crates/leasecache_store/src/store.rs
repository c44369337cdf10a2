// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The storage contract consumed by self-populating caches.

use std::sync::Arc;

use crate::Error;

/// Trait for cache store implementations.
///
/// Only `get` and `set` are required. `len` has a default implementation that
/// returns `None`, since not every store can report its size cheaply.
///
/// Implementations shared between processes must tolerate concurrent writers of the
/// same key without corruption. No compare-and-swap is required: the last `set` wins.
pub trait CacheStore<K, V>: Send + Sync {
    /// Reads the value cached under `key`, or `None` if nothing is cached.
    fn get(&self, key: &K) -> impl Future<Output = Result<Option<V>, Error>> + Send;

    /// Writes `value` under `key`, replacing whatever was there.
    fn set(&self, key: &K, value: V) -> impl Future<Output = Result<(), Error>> + Send;

    /// Returns the number of entries, if supported.
    fn len(&self) -> Option<u64> {
        None
    }
}

impl<K, V, S> CacheStore<K, V> for Arc<S>
where
    S: CacheStore<K, V>,
{
    fn get(&self, key: &K) -> impl Future<Output = Result<Option<V>, Error>> + Send {
        (**self).get(key)
    }

    fn set(&self, key: &K, value: V) -> impl Future<Output = Result<(), Error>> + Send {
        (**self).set(key, value)
    }

    fn len(&self) -> Option<u64> {
        (**self).len()
    }
}
