// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! A single-process lease coordinator.
//!
//! [`InMemoryLeases`] enforces the lease contract for every cache that shares a
//! clone of it. It is the coordinator used by tests and demos to stand in for a
//! fleet-wide service: several caches built on one `InMemoryLeases` behave like
//! several processes talking to the same lock server.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tick::Clock;

use crate::{Error, Lease, LeaseCoordinator};

/// An in-memory lease coordinator with clock-driven expiry.
///
/// Every grant carries a fencing token. Releasing a lease that has already
/// expired (and possibly been granted to someone else) is a no-op, so a slow
/// former holder can never free the current holder's lease.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use leasecache_lease::{InMemoryLeases, LeaseCoordinator};
/// use tick::Clock;
/// # futures::executor::block_on(async {
///
/// let leases = InMemoryLeases::new(Clock::new_frozen());
///
/// let lease = leases.acquire("cache:k", Duration::from_secs(30)).await?;
/// assert!(leases.acquire("cache:k", Duration::from_secs(30)).await.unwrap_err().is_held());
///
/// lease.release().await?;
/// assert!(!leases.is_held("cache:k"));
/// # Ok::<(), leasecache_lease::Error>(())
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct InMemoryLeases {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    clock: Clock,
    next_token: AtomicU64,
    grants: Mutex<HashMap<String, Grant>>,
}

#[derive(Debug, Clone, Copy)]
struct Grant {
    token: u64,
    /// `None` when the lifetime is too large to represent; such grants never expire.
    expires_at: Option<Instant>,
}

impl Grant {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|expires_at| now < expires_at)
    }
}

impl InMemoryLeases {
    /// Creates a coordinator whose lease expiry follows `clock`.
    #[must_use]
    pub fn new(clock: Clock) -> Self {
        Self {
            inner: Arc::new(Inner {
                clock,
                next_token: AtomicU64::new(1),
                grants: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Returns `true` if an unexpired lease is currently granted under `name`.
    #[must_use]
    pub fn is_held(&self, name: &str) -> bool {
        let now = self.inner.clock.instant();
        self.inner.grants.lock().get(name).is_some_and(|grant| grant.is_live(now))
    }

    /// Returns the number of unexpired leases.
    #[must_use]
    pub fn held_count(&self) -> usize {
        let now = self.inner.clock.instant();
        self.inner.grants.lock().values().filter(|grant| grant.is_live(now)).count()
    }

    pub(crate) fn try_acquire(&self, name: &str, lifetime: Duration) -> Result<Lease, Error> {
        let now = self.inner.clock.instant();
        let token = {
            let mut grants = self.inner.grants.lock();
            if grants.get(name).is_some_and(|grant| grant.is_live(now)) {
                return Err(Error::held(name));
            }

            let token = self.inner.next_token.fetch_add(1, Ordering::Relaxed);
            grants.insert(
                name.to_owned(),
                Grant {
                    token,
                    expires_at: now.checked_add(lifetime),
                },
            );
            token
        };

        let inner = Arc::clone(&self.inner);
        let owned_name = name.to_owned();
        Ok(Lease::new(name, move || async move {
            inner.release(&owned_name, token);
            Ok(())
        }))
    }
}

impl Inner {
    fn release(&self, name: &str, token: u64) {
        let mut grants = self.grants.lock();
        if grants.get(name).is_some_and(|grant| grant.token == token) {
            grants.remove(name);
        }
    }
}

impl LeaseCoordinator for InMemoryLeases {
    async fn acquire(&self, name: &str, lifetime: Duration) -> Result<Lease, Error> {
        self.try_acquire(name, lifetime)
    }
}
