// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for the store contract and the in-memory store.

use std::collections::HashMap;
use std::sync::Arc;

use leasecache_store::{CacheStore, Error, InMemoryStore};
use parking_lot::Mutex;

/// Minimal implementation that only provides required methods.
struct MinimalStore<K, V> {
    data: Mutex<HashMap<K, V>>,
}

impl<K, V> MinimalStore<K, V> {
    fn new() -> Self {
        Self {
            data: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, V> CacheStore<K, V> for MinimalStore<K, V>
where
    K: Clone + Eq + std::hash::Hash + Send + Sync,
    V: Clone + Send + Sync,
{
    async fn get(&self, key: &K) -> Result<Option<V>, Error> {
        Ok(self.data.lock().get(key).cloned())
    }

    async fn set(&self, key: &K, value: V) -> Result<(), Error> {
        self.data.lock().insert(key.clone(), value);
        Ok(())
    }
}

#[tokio::test]
async fn minimal_store_len_defaults_to_none() {
    let store = MinimalStore::<String, i32>::new();
    assert_eq!(store.len(), None);
}

#[tokio::test]
async fn arc_store_delegates_to_inner() {
    let inner = Arc::new(MinimalStore::<String, i32>::new());
    let shared = Arc::clone(&inner);

    shared.set(&"key".to_string(), 3).await.expect("set failed");

    assert_eq!(inner.get(&"key".to_string()).await.expect("get failed"), Some(3));
    assert_eq!(CacheStore::<String, i32>::len(&shared), None);
}

#[tokio::test]
async fn memory_get_returns_none_for_missing_key() {
    let store = InMemoryStore::<String, i32>::new();
    let value = store.get(&"missing".to_string()).await.expect("get failed");
    assert!(value.is_none());
}

#[tokio::test]
async fn memory_set_overwrites_existing_value() {
    let store = InMemoryStore::<String, i32>::with_capacity(100);

    store.set(&"key".to_string(), 1).await.expect("set failed");
    store.set(&"key".to_string(), 2).await.expect("set failed");

    assert_eq!(store.get(&"key".to_string()).await.expect("get failed"), Some(2));
}

#[test]
fn memory_new_store_is_empty() {
    let store = InMemoryStore::<String, i32>::default();
    assert_eq!(store.len(), Some(0));
}
