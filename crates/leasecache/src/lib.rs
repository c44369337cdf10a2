// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! A self-populating cache whose background repopulation is coordinated by a lease.
//!
//! [`SelfPopulatingCache`] sits in front of a [`CacheStore`] that may be shared by many
//! processes. It serves values from the store, computes missing ones on demand, and
//! recomputes stale ones in the background so that a stale notification delivered to
//! every process results in a single computation fleet-wide.
//!
//! # Reading
//!
//! [`get`](SelfPopulatingCache::get) returns the stored value when there is one. On a
//! miss it runs the populate function, writes the result, and returns it. Misses do not
//! take a lease: concurrent misses on the same key each compute and write the value,
//! and the store keeps the last write.
//!
//! # Repopulating
//!
//! [`on_stale`](SelfPopulatingCache::on_stale) (or [`refresh`](SelfPopulatingCache::refresh))
//! starts a background repopulation that first acquires a lease named
//! `namespace + key` from the [`LeaseCoordinator`]:
//!
//! - If another holder has the lease, the repopulation is skipped. That holder is already
//!   doing the work.
//! - If the coordinator fails, a [`LockError`] is reported.
//! - If computing or storing the value fails, a [`PopulateError`] naming the lease is
//!   reported and the lease is left to expire, which keeps other processes from retrying
//!   until then.
//! - On success the lease is released right after the value is written.
//!
//! Background failures go to the error sink set with
//! [`on_error`](SelfPopulatingCacheBuilder::on_error) instead of to whoever delivered
//! the notification. A [`StaleNotifier`] can be connected with
//! [`subscribe`](SelfPopulatingCache::subscribe).
//!
//! # Time Budget
//!
//! Every populate invocation runs on its own Tokio task under a [`TimeoutGuard`]. When
//! the budget runs out the caller receives a [`TimeoutError`] as the cause of a
//! [`PopulateError`], but the invocation keeps running and its writes still land.
//! Populate functions should therefore be idempotent.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use leasecache::{InMemoryLeases, InMemoryStore, Leased, SelfPopulatingCache, StaleEvent};
//! use tick::Clock;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let clock = Clock::new_tokio();
//! let store = Arc::new(InMemoryStore::<String, String>::new());
//! let leases = InMemoryLeases::new(clock.clone());
//!
//! // Two caches sharing a store and a coordinator, as two processes would.
//! let build = || {
//!     SelfPopulatingCache::builder::<String, String>(clock.clone())
//!         .store(Arc::clone(&store))
//!         .leases(leases.clone())
//!         .populate(|key: String| async move { Ok::<_, std::io::Error>(format!("profile of {key}")) })
//!         .build()
//! };
//! let (first, second) = (build()?, build()?);
//!
//! assert_eq!(first.get(&"alice".to_string()).await?, "profile of alice");
//!
//! // Both see the same stale event; only one recomputes.
//! let a = first.on_stale(StaleEvent::new("alice".to_string()));
//! let b = second.on_stale(StaleEvent::new("alice".to_string()));
//! let (a, b) = (a.await?, b.await?);
//! assert!(matches!((&a, &b), (Leased::Populated(_), Leased::Skipped) | (Leased::Skipped, Leased::Populated(_))));
//! # Ok(())
//! # }
//! ```

mod builder;
mod cache;
mod error;
mod leased;
mod options;
mod populate;
mod stale;
mod telemetry;
mod timeout;

#[doc(inline)]
pub use builder::SelfPopulatingCacheBuilder;
#[doc(inline)]
pub use cache::SelfPopulatingCache;
#[doc(inline)]
pub use error::{BoxError, CancelledError, ConfigError, Error, LockError, PopulateError, TimeoutError};
#[cfg(feature = "memory")]
#[doc(inline)]
pub use leasecache_lease::InMemoryLeases;
#[doc(inline)]
pub use leasecache_lease::{Lease, LeaseCoordinator};
#[doc(inline)]
pub use leasecache_store::CacheStore;
#[cfg(feature = "memory")]
#[doc(inline)]
pub use leasecache_store::InMemoryStore;
#[doc(inline)]
pub use leased::Leased;
#[doc(inline)]
pub use options::{DEFAULT_LEASE_EXPIRES_IN, DEFAULT_NAMESPACE, DEFAULT_POPULATE_TIMEOUT, PopulateOptions};
#[doc(inline)]
pub use stale::{Refresh, StaleEvent, StaleNotifier, Subscription};
#[doc(inline)]
pub use telemetry::CacheName;
#[doc(inline)]
pub use timeout::TimeoutGuard;

#[cfg(any(feature = "test-util", test))]
#[doc(inline)]
pub use leasecache_lease::testing::{LeaseOp, MockLeases};
#[cfg(any(feature = "test-util", test))]
#[doc(inline)]
pub use leasecache_store::testing::{MockStore, StoreOp};
