// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Mock store implementation for testing.
//!
//! This module provides `MockStore`, an in-memory store that records all
//! operations and supports failure injection for testing error paths.

use std::{collections::HashMap, hash::Hash, sync::Arc};

use parking_lot::Mutex;

use crate::{CacheStore, Error};

/// Recorded store operation with full context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp<K, V> {
    /// A get operation was performed with the given key.
    Get(K),
    /// A set operation was performed with the given key and value.
    Set {
        /// The key that was written.
        key: K,
        /// The value that was written.
        value: V,
    },
}

impl<K, V> StoreOp<K, V> {
    /// Returns `true` if this is a [`StoreOp::Set`].
    #[must_use]
    pub fn is_set(&self) -> bool {
        matches!(self, Self::Set { .. })
    }
}

type FailPredicate<K, V> = Box<dyn Fn(&StoreOp<K, V>) -> bool + Send + Sync>;

/// A configurable mock store for testing.
///
/// Clones share data, the operation log and the failure predicate, so a test can
/// hand one clone to the code under test and inspect another.
///
/// # Examples
///
/// ```
/// use leasecache_store::{CacheStore, testing::{MockStore, StoreOp}};
///
/// # futures::executor::block_on(async {
/// let store = MockStore::<String, i32>::new();
///
/// store.set(&"key".to_string(), 42).await.unwrap();
/// assert_eq!(store.get(&"key".to_string()).await.unwrap(), Some(42));
///
/// assert_eq!(store.operations(), vec![
///     StoreOp::Set { key: "key".to_string(), value: 42 },
///     StoreOp::Get("key".to_string()),
/// ]);
///
/// store.fail_when(|op| op.is_set());
/// assert!(store.set(&"key".to_string(), 1).await.is_err());
/// # });
/// ```
pub struct MockStore<K, V> {
    data: Arc<Mutex<HashMap<K, V>>>,
    operations: Arc<Mutex<Vec<StoreOp<K, V>>>>,
    fail_when: Arc<Mutex<Option<FailPredicate<K, V>>>>,
}

impl<K, V> std::fmt::Debug for MockStore<K, V>
where
    K: std::fmt::Debug,
    V: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockStore")
            .field("data", &self.data)
            .field("operations", &self.operations)
            .field("fail_when", &self.fail_when.lock().is_some())
            .finish()
    }
}

impl<K, V> Clone for MockStore<K, V> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
            operations: Arc::clone(&self.operations),
            fail_when: Arc::clone(&self.fail_when),
        }
    }
}

impl<K, V> Default for MockStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> MockStore<K, V> {
    /// Creates a new empty mock store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: Arc::new(Mutex::new(HashMap::new())),
            operations: Arc::new(Mutex::new(Vec::new())),
            fail_when: Arc::new(Mutex::new(None)),
        }
    }
}

impl<K, V> MockStore<K, V>
where
    K: Eq + Hash,
{
    /// Creates a mock store with pre-populated data.
    #[must_use]
    pub fn with_data(data: HashMap<K, V>) -> Self {
        Self {
            data: Arc::new(Mutex::new(data)),
            operations: Arc::new(Mutex::new(Vec::new())),
            fail_when: Arc::new(Mutex::new(None)),
        }
    }

    /// Returns the number of entries in the store.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.data.lock().len()
    }

    /// Returns true if the store contains the given key.
    #[must_use]
    pub fn contains_key(&self, key: &K) -> bool {
        self.data.lock().contains_key(key)
    }

    /// Reads a value without recording an operation.
    #[must_use]
    pub fn peek(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        self.data.lock().get(key).cloned()
    }
}

impl<K, V> MockStore<K, V>
where
    K: Clone,
    V: Clone,
{
    /// Sets a predicate that determines when operations should fail.
    ///
    /// Failing operations are still recorded; they just don't touch the data.
    pub fn fail_when<F>(&self, predicate: F)
    where
        F: Fn(&StoreOp<K, V>) -> bool + Send + Sync + 'static,
    {
        *self.fail_when.lock() = Some(Box::new(predicate));
    }

    /// Clears the failure predicate, allowing all operations to succeed.
    pub fn clear_failures(&self) {
        *self.fail_when.lock() = None;
    }

    /// Returns a clone of all recorded operations.
    #[must_use]
    pub fn operations(&self) -> Vec<StoreOp<K, V>> {
        self.operations.lock().clone()
    }

    /// Returns the recorded `set` operations only.
    #[must_use]
    pub fn writes(&self) -> Vec<StoreOp<K, V>> {
        self.operations.lock().iter().filter(|op| op.is_set()).cloned().collect()
    }

    /// Clears all recorded operations.
    pub fn clear_operations(&self) {
        self.operations.lock().clear();
    }

    fn record(&self, op: StoreOp<K, V>) {
        self.operations.lock().push(op);
    }

    fn should_fail(&self, op: &StoreOp<K, V>) -> bool {
        self.fail_when.lock().as_ref().is_some_and(|predicate| predicate(op))
    }
}

impl<K, V> CacheStore<K, V> for MockStore<K, V>
where
    K: Clone + Eq + Hash + Send + Sync,
    V: Clone + Send + Sync,
{
    async fn get(&self, key: &K) -> Result<Option<V>, Error> {
        let op = StoreOp::Get(key.clone());
        let fail = self.should_fail(&op);
        self.record(op);
        if fail {
            return Err(Error::from_message("mock: get failed"));
        }
        Ok(self.data.lock().get(key).cloned())
    }

    async fn set(&self, key: &K, value: V) -> Result<(), Error> {
        let op = StoreOp::Set {
            key: key.clone(),
            value: value.clone(),
        };
        let fail = self.should_fail(&op);
        self.record(op);
        if fail {
            return Err(Error::from_message("mock: set failed"));
        }
        self.data.lock().insert(key.clone(), value);
        Ok(())
    }

    fn len(&self) -> Option<u64> {
        Some(self.data.lock().len() as u64)
    }
}
