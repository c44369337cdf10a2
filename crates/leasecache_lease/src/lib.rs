// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Distributed lease contract for lease-coordinated caches.
//!
//! A [`LeaseCoordinator`] hands out named, time-bounded [`Lease`]s. At most one holder
//! owns a given name at a time; a holder that never releases loses the lease once its
//! lifetime runs out, so a crashed process can't wedge a key forever.
//!
//! Failed acquisitions carry an [`ErrorKind`]: [`ErrorKind::Held`] is benign contention
//! (someone else is doing the work), [`ErrorKind::Unavailable`] is an infrastructure fault.
//!
//! # Implementing a Coordinator
//!
//! ```
//! use std::time::Duration;
//! use leasecache_lease::{Error, Lease, LeaseCoordinator};
//!
//! /// A coordinator that grants everything and never contends.
//! struct Permissive;
//!
//! impl LeaseCoordinator for Permissive {
//!     async fn acquire(&self, name: &str, _lifetime: Duration) -> Result<Lease, Error> {
//!         Ok(Lease::new(name, || async { Ok(()) }))
//!     }
//! }
//!
//! # futures::executor::block_on(async {
//! let lease = Permissive.acquire("cache:key", Duration::from_secs(5)).await?;
//! assert_eq!(lease.name(), "cache:key");
//! lease.release().await?;
//! # Ok::<(), Error>(())
//! # });
//! ```

mod coordinator;
pub mod error;
mod lease;
#[cfg(any(feature = "memory", test))]
pub mod memory;
#[cfg(any(feature = "test-util", test))]
pub mod testing;

#[doc(inline)]
pub use coordinator::LeaseCoordinator;
#[doc(inline)]
pub use error::{Error, ErrorKind, Result};
#[doc(inline)]
pub use lease::Lease;
#[cfg(any(feature = "memory", test))]
#[doc(inline)]
pub use memory::InMemoryLeases;
