// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! In-memory store backed by moka.
//!
//! Useful for single-process deployments, tests and demos. A store that is shared
//! by several processes (the case the lease protocol exists for) lives outside
//! this crate; implement [`CacheStore`] for it.

use std::hash::Hash;
use std::marker::PhantomData;

use moka::future::Cache;

use crate::{CacheStore, Error};

/// An in-memory store backed by moka.
///
/// Cloning is cheap and every clone sees the same entries, which lets several
/// caches in one process share a store.
///
/// # Examples
///
/// ```
/// use leasecache_store::{CacheStore, InMemoryStore};
/// # futures::executor::block_on(async {
///
/// let store = InMemoryStore::<String, i32>::new();
///
/// store.set(&"key".to_string(), 42).await?;
/// assert_eq!(store.get(&"key".to_string()).await?, Some(42));
/// # Ok::<(), leasecache_store::Error>(())
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct InMemoryStore<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    inner: Cache<K, V>,
}

impl<K, V> Default for InMemoryStore<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> InMemoryStore<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Creates a new unbounded in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Creates a new in-memory store holding at most `max_capacity` entries.
    #[must_use]
    pub fn with_capacity(max_capacity: u64) -> Self {
        Self::builder().max_capacity(max_capacity).build()
    }

    /// Creates a new builder for configuring an in-memory store.
    #[must_use]
    pub fn builder() -> InMemoryStoreBuilder<K, V> {
        InMemoryStoreBuilder::new()
    }

    fn from_builder(builder: &InMemoryStoreBuilder<K, V>) -> Self {
        let mut moka_builder = Cache::builder();

        if let Some(capacity) = builder.max_capacity {
            moka_builder = moka_builder.max_capacity(capacity);
        }

        if let Some(name) = builder.name.as_deref() {
            moka_builder = moka_builder.name(name);
        }

        Self {
            inner: moka_builder.build(),
        }
    }
}

impl<K, V> CacheStore<K, V> for InMemoryStore<K, V>
where
    K: Clone + Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &K) -> Result<Option<V>, Error> {
        Ok(self.inner.get(key).await)
    }

    async fn set(&self, key: &K, value: V) -> Result<(), Error> {
        self.inner.insert(key.clone(), value).await;
        Ok(())
    }

    fn len(&self) -> Option<u64> {
        Some(self.inner.entry_count())
    }
}

/// Builder for configuring an [`InMemoryStore`].
///
/// Keeps moka's types out of the public API.
///
/// # Examples
///
/// ```
/// use leasecache_store::InMemoryStore;
///
/// let store = InMemoryStore::<String, i32>::builder()
///     .max_capacity(1000)
///     .name("users")
///     .build();
/// ```
#[derive(Debug)]
pub struct InMemoryStoreBuilder<K, V> {
    max_capacity: Option<u64>,
    name: Option<String>,
    _phantom: PhantomData<(K, V)>,
}

impl<K, V> Default for InMemoryStoreBuilder<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> InMemoryStoreBuilder<K, V> {
    /// Creates a new builder for an unbounded, unnamed store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_capacity: None,
            name: None,
            _phantom: PhantomData,
        }
    }

    /// Sets the maximum number of entries.
    ///
    /// Once reached, moka evicts entries using its `TinyLFU` policy.
    #[must_use]
    pub fn max_capacity(mut self, capacity: u64) -> Self {
        self.max_capacity = Some(capacity);
        self
    }

    /// Sets a name that shows up in moka's debugging output.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Builds the configured store.
    #[must_use]
    pub fn build(self) -> InMemoryStore<K, V>
    where
        K: Hash + Eq + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        InMemoryStore::from_builder(&self)
    }
}
