// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Storage contract for self-populating caches.
//!
//! This crate defines the [`CacheStore`] trait that the `leasecache` crate reads from and writes
//! to, along with the opaque [`Error`] type store backends report failures with.
//!
//! # Overview
//!
//! A store only has to answer two questions: "what is cached under this key?" and "cache this
//! value under this key". Everything else (who computes the value, when, and how often) is
//! decided by `leasecache`. Stores shared by several processes must tolerate concurrent writers
//! of the same key; last write wins.
//!
//! # Implementing a Store
//!
//! ```
//! use leasecache_store::{CacheStore, Error};
//! use std::collections::HashMap;
//! use std::sync::RwLock;
//!
//! struct SimpleStore<K, V>(RwLock<HashMap<K, V>>);
//!
//! impl<K, V> CacheStore<K, V> for SimpleStore<K, V>
//! where
//!     K: Clone + Eq + std::hash::Hash + Send + Sync,
//!     V: Clone + Send + Sync,
//! {
//!     async fn get(&self, key: &K) -> Result<Option<V>, Error> {
//!         Ok(self.0.read().map_err(|e| Error::from_message(e.to_string()))?.get(key).cloned())
//!     }
//!
//!     async fn set(&self, key: &K, value: V) -> Result<(), Error> {
//!         self.0.write().map_err(|e| Error::from_message(e.to_string()))?.insert(key.clone(), value);
//!         Ok(())
//!     }
//! }
//! ```

pub mod error;
#[cfg(any(feature = "memory", test))]
pub mod memory;
pub(crate) mod store;
#[cfg(any(feature = "test-util", test))]
pub mod testing;

#[doc(inline)]
pub use error::{Error, Result};
#[cfg(any(feature = "memory", test))]
#[doc(inline)]
pub use memory::{InMemoryStore, InMemoryStoreBuilder};
#[doc(inline)]
pub use store::CacheStore;
