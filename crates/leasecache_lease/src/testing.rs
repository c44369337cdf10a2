// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Mock lease coordinator for testing.
//!
//! [`MockLeases`] enforces real lease semantics (it delegates to
//! [`InMemoryLeases`]) while recording every operation and letting tests inject
//! coordinator outages.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tick::Clock;

use crate::{Error, InMemoryLeases, Lease, LeaseCoordinator};

/// Recorded lease operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaseOp {
    /// An acquire was attempted.
    Acquire {
        /// The lease name.
        name: String,
        /// The requested lifetime.
        lifetime: Duration,
    },
    /// A release was attempted.
    Release(String),
}

type FailPredicate = Box<dyn Fn(&LeaseOp) -> bool + Send + Sync>;

/// A recording, failure-injecting lease coordinator.
///
/// Clones share the grants, the operation log and the failure predicate.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use leasecache_lease::{ErrorKind, LeaseCoordinator, testing::{LeaseOp, MockLeases}};
/// use tick::Clock;
///
/// # futures::executor::block_on(async {
/// let leases = MockLeases::new(Clock::new_frozen());
/// leases.fail_when(|op| matches!(op, LeaseOp::Acquire { .. }));
///
/// let error = leases.acquire("cache:k", Duration::from_secs(1)).await.unwrap_err();
/// assert_eq!(error.kind(), ErrorKind::Unavailable);
/// # });
/// ```
#[derive(Clone)]
pub struct MockLeases {
    leases: InMemoryLeases,
    operations: Arc<Mutex<Vec<LeaseOp>>>,
    fail_when: Arc<Mutex<Option<FailPredicate>>>,
}

impl std::fmt::Debug for MockLeases {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockLeases")
            .field("leases", &self.leases)
            .field("operations", &self.operations)
            .field("fail_when", &self.fail_when.lock().is_some())
            .finish()
    }
}

impl MockLeases {
    /// Creates a mock coordinator whose lease expiry follows `clock`.
    #[must_use]
    pub fn new(clock: Clock) -> Self {
        Self {
            leases: InMemoryLeases::new(clock),
            operations: Arc::new(Mutex::new(Vec::new())),
            fail_when: Arc::new(Mutex::new(None)),
        }
    }

    /// The coordinator that enforces the actual grants.
    #[must_use]
    pub fn leases(&self) -> &InMemoryLeases {
        &self.leases
    }

    /// Returns `true` if an unexpired lease is currently granted under `name`.
    #[must_use]
    pub fn is_held(&self, name: &str) -> bool {
        self.leases.is_held(name)
    }

    /// Sets a predicate that decides which operations fail with
    /// [`ErrorKind::Unavailable`](crate::ErrorKind::Unavailable).
    pub fn fail_when<F>(&self, predicate: F)
    where
        F: Fn(&LeaseOp) -> bool + Send + Sync + 'static,
    {
        *self.fail_when.lock() = Some(Box::new(predicate));
    }

    /// Clears the failure predicate.
    pub fn clear_failures(&self) {
        *self.fail_when.lock() = None;
    }

    /// Returns a clone of all recorded operations.
    #[must_use]
    pub fn operations(&self) -> Vec<LeaseOp> {
        self.operations.lock().clone()
    }

    /// Returns how many releases were attempted.
    #[must_use]
    pub fn release_count(&self) -> usize {
        self.operations
            .lock()
            .iter()
            .filter(|op| matches!(op, LeaseOp::Release(_)))
            .count()
    }

    fn record(&self, op: LeaseOp) -> bool {
        let fail = self.fail_when.lock().as_ref().is_some_and(|predicate| predicate(&op));
        self.operations.lock().push(op);
        fail
    }
}

impl LeaseCoordinator for MockLeases {
    async fn acquire(&self, name: &str, lifetime: Duration) -> Result<Lease, Error> {
        let op = LeaseOp::Acquire {
            name: name.to_owned(),
            lifetime,
        };
        if self.record(op) {
            return Err(Error::unavailable(name, "mock: acquire failed"));
        }

        let granted = self.leases.try_acquire(name, lifetime)?;
        let mock = self.clone();
        Ok(Lease::new(name, move || async move {
            let name = granted.name().to_owned();
            if mock.record(LeaseOp::Release(name.clone())) {
                return Err(Error::unavailable(name, "mock: release failed"));
            }
            granted.release().await
        }))
    }
}
