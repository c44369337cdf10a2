// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::Display;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use leasecache_lease::LeaseCoordinator;
use leasecache_store::CacheStore;

use crate::error::{Error, LockError, PopulateError, panic_cause};
use crate::populate::Populator;
use crate::telemetry::{CacheActivity, CacheOperation};

/// Outcome of a lease-guarded repopulation.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum Leased<V> {
    /// This caller held the lease, computed the value, and stored it.
    Populated(V),
    /// Another holder owns the lease for this key, so nothing was done.
    Skipped,
}

impl<V> Leased<V> {
    /// Returns the populated value, or `None` if the repopulation was skipped.
    pub fn into_value(self) -> Option<V> {
        match self {
            Self::Populated(value) => Some(value),
            Self::Skipped => None,
        }
    }

    /// Returns `true` if another holder owned the lease.
    #[must_use]
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped)
    }
}

/// A [`Populator`] that only runs while holding a lease named after the key.
#[derive(Debug)]
pub(crate) struct LeasedPopulator<K, V, S, L> {
    populator: Populator<K, V, S>,
    leases: L,
    namespace: String,
    lease_expires_in: Duration,
}

impl<K, V, S, L> LeasedPopulator<K, V, S, L> {
    pub(crate) fn new(populator: Populator<K, V, S>, leases: L, namespace: String, lease_expires_in: Duration) -> Self {
        Self {
            populator,
            leases,
            namespace,
            lease_expires_in,
        }
    }

    pub(crate) fn populator(&self) -> &Populator<K, V, S> {
        &self.populator
    }

    pub(crate) fn leases(&self) -> &L {
        &self.leases
    }

    pub(crate) fn namespace(&self) -> &str {
        &self.namespace
    }

    pub(crate) fn lease_expires_in(&self) -> Duration {
        self.lease_expires_in
    }

    pub(crate) fn lease_name(&self, key: &impl Display) -> String {
        format!("{}{key}", self.namespace)
    }
}

impl<K, V, S, L> LeasedPopulator<K, V, S, L>
where
    K: Clone + Display + Send + Sync + 'static,
    V: Clone + Send + 'static,
    S: CacheStore<K, V>,
    L: LeaseCoordinator,
{
    /// Repopulates `key` if, and only if, its lease can be acquired.
    ///
    /// Contention for the lease resolves to [`Leased::Skipped`]. Any other coordinator
    /// failure is a [`LockError`]. Once the lease is held, every failure to compute or
    /// store the value is a [`PopulateError`] naming the lease, and the lease is dropped
    /// without being released so that it blocks further attempts until it expires.
    ///
    /// Panics raised by the store or the coordinator are reported the same way as the
    /// errors they would otherwise have returned.
    pub(crate) async fn leased_populate(&self, key: &K) -> Result<Leased<V>, Error> {
        let telemetry = self.populator.telemetry();
        let name = self.lease_name(key);

        let acquired = AssertUnwindSafe(self.leases.acquire(&name, self.lease_expires_in))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(leasecache_lease::Error::unavailable(&name, panic_cause(panic))));

        let lease = match acquired {
            Ok(lease) => lease,
            Err(error) if error.is_held() => {
                telemetry.record(CacheOperation::Refresh, CacheActivity::LeaseDenied, key, None);
                return Ok(Leased::Skipped);
            }
            Err(error) => {
                telemetry.record(CacheOperation::Refresh, CacheActivity::LeaseError, key, None);
                return Err(LockError::caused_by(name, error).into());
            }
        };

        let populated = match AssertUnwindSafe(self.populator.populate(key, Some(&name))).catch_unwind().await {
            Ok(populated) => populated,
            Err(panic) => {
                telemetry.record(CacheOperation::Refresh, CacheActivity::PopulateFailed, key, None);
                Err(PopulateError::leased(key.to_string(), &name, panic_cause(panic)).into())
            }
        };

        let value = match populated {
            Ok(value) => value,
            Err(Error::Store(error)) => return Err(PopulateError::leased(key.to_string(), &name, error).into()),
            Err(error) => return Err(error),
        };

        // A lease that fails to release is still bounded by its lifetime.
        let released = AssertUnwindSafe(lease.release())
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(leasecache_lease::Error::unavailable(&name, panic_cause(panic))));

        match released {
            Ok(()) => telemetry.record(CacheOperation::Refresh, CacheActivity::Released, key, None),
            Err(error) => {
                telemetry.record(CacheOperation::Refresh, CacheActivity::ReleaseFailed, key, None);
                tracing::debug!(lease = %name, error = %error, "lease will expire on its own");
            }
        }

        Ok(Leased::Populated(value))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use leasecache_lease::Lease;
    use leasecache_lease::testing::{LeaseOp, MockLeases};
    use leasecache_store::testing::MockStore;
    use ohno::ErrorExt;
    use tick::Clock;

    use super::*;
    use crate::error::BoxError;
    use crate::populate::PopulateFn;
    use crate::telemetry::CacheTelemetry;

    fn leased<S, L, F, Fut>(store: &S, leases: &L, f: F) -> LeasedPopulator<String, String, S, L>
    where
        S: CacheStore<String, String> + Clone,
        L: LeaseCoordinator + Clone,
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, BoxError>> + Send + 'static,
    {
        let clock = Clock::new_tokio();
        let populator = Populator::new(
            PopulateFn::new(f),
            store.clone(),
            Duration::from_secs(5),
            clock,
            CacheTelemetry::new("test", false),
        );
        LeasedPopulator::new(populator, leases.clone(), "ns:".to_string(), Duration::from_secs(300))
    }

    /// Store whose writes panic.
    #[derive(Clone)]
    struct PanickingStore;

    impl CacheStore<String, String> for PanickingStore {
        async fn get(&self, _key: &String) -> Result<Option<String>, leasecache_store::Error> {
            Ok(None)
        }

        async fn set(&self, key: &String, _value: String) -> Result<(), leasecache_store::Error> {
            panic!("store cannot write {key}")
        }
    }

    /// Coordinator whose acquire and release panic.
    #[derive(Clone)]
    struct PanickingLeases {
        on_acquire: bool,
    }

    impl LeaseCoordinator for PanickingLeases {
        async fn acquire(&self, name: &str, _lifetime: Duration) -> Result<Lease, leasecache_lease::Error> {
            assert!(!self.on_acquire, "coordinator crashed while acquiring {name}");
            Ok(Lease::new(name, crash_on_release))
        }
    }

    async fn crash_on_release() -> Result<(), leasecache_lease::Error> {
        panic!("coordinator crashed while releasing")
    }

    fn key() -> String {
        "k".to_string()
    }

    #[test]
    fn leased_accessors() {
        let populated = Leased::Populated(7);
        assert!(!populated.is_skipped());
        assert_eq!(populated.into_value(), Some(7));

        let skipped = Leased::<i32>::Skipped;
        assert!(skipped.is_skipped());
        assert_eq!(skipped.into_value(), None);
    }

    #[tokio::test]
    async fn lease_name_is_namespace_plus_key() {
        let populator = leased(&MockStore::new(), &MockLeases::new(Clock::new_frozen()), |k| async move {
            Ok::<_, BoxError>(k)
        });

        assert_eq!(populator.lease_name(&"user:1"), "ns:user:1");
        assert_eq!(populator.namespace(), "ns:");
        assert_eq!(populator.lease_expires_in(), Duration::from_secs(300));
    }

    #[tokio::test]
    async fn populates_and_releases_on_success() {
        let store = MockStore::new();
        let leases = MockLeases::new(Clock::new_frozen());
        let populator = leased(&store, &leases, |_| async { Ok::<_, BoxError>("fresh".to_string()) });

        let outcome = populator.leased_populate(&key()).await.unwrap();

        assert_eq!(outcome, Leased::Populated("fresh".to_string()));
        assert_eq!(store.peek(&key()), Some("fresh".to_string()));
        assert_eq!(
            leases.operations(),
            vec![
                LeaseOp::Acquire {
                    name: "ns:k".to_string(),
                    lifetime: Duration::from_secs(300),
                },
                LeaseOp::Release("ns:k".to_string()),
            ]
        );
        assert!(!leases.is_held("ns:k"));
    }

    #[tokio::test]
    async fn held_lease_skips_without_populating() {
        let store = MockStore::new();
        let leases = MockLeases::new(Clock::new_frozen());
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let populator = leased(&store, &leases, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, BoxError>("fresh".to_string()) }
        });

        let _held = leases.acquire("ns:k", Duration::from_secs(300)).await.unwrap();
        let outcome = populator.leased_populate(&key()).await.unwrap();

        assert!(outcome.is_skipped());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(store.writes().is_empty());
    }

    #[tokio::test]
    async fn coordinator_outage_is_lock_error() {
        let store = MockStore::new();
        let leases = MockLeases::new(Clock::new_frozen());
        leases.fail_when(|op| matches!(op, LeaseOp::Acquire { .. }));
        let populator = leased(&store, &leases, |_| async { Ok::<_, BoxError>("fresh".to_string()) });

        let error = populator.leased_populate(&key()).await.unwrap_err();

        let Error::Lock(error) = error else {
            panic!("expected a lock error, got {error:?}");
        };
        assert_eq!(error.lease(), "ns:k");
        assert!(store.writes().is_empty());
    }

    #[tokio::test]
    async fn failed_populate_leaves_lease_held() {
        let store = MockStore::new();
        let leases = MockLeases::new(Clock::new_frozen());
        let populator = leased(&store, &leases, |_| async { Err::<String, BoxError>("boom".into()) });

        let error = populator.leased_populate(&key()).await.unwrap_err();

        let Error::Populate(error) = error else {
            panic!("expected a populate error, got {error:?}");
        };
        assert_eq!(error.key(), "k");
        assert_eq!(error.lease(), Some("ns:k"));
        assert!(error.to_string().contains("boom"));
        assert!(leases.is_held("ns:k"));
        assert_eq!(leases.release_count(), 0);
    }

    #[tokio::test]
    async fn failed_release_still_reports_success() {
        let store = MockStore::new();
        let leases = MockLeases::new(Clock::new_frozen());
        leases.fail_when(|op| matches!(op, LeaseOp::Release(_)));
        let populator = leased(&store, &leases, |_| async { Ok::<_, BoxError>("fresh".to_string()) });

        let outcome = populator.leased_populate(&key()).await.unwrap();

        assert_eq!(outcome.into_value(), Some("fresh".to_string()));
        assert_eq!(leases.release_count(), 1);
        assert!(leases.is_held("ns:k"));
    }

    #[tokio::test]
    async fn failed_write_is_populate_error_under_lease() {
        let store = MockStore::new();
        store.fail_when(|op| op.is_set());
        let leases = MockLeases::new(Clock::new_frozen());
        let populator = leased(&store, &leases, |_| async { Ok::<_, BoxError>("fresh".to_string()) });

        let error = populator.leased_populate(&key()).await.unwrap_err();

        let Error::Populate(error) = error else {
            panic!("expected a populate error, got {error:?}");
        };
        assert_eq!(error.key(), "k");
        assert_eq!(error.lease(), Some("ns:k"));
        assert!(error.find_source::<leasecache_store::Error>().is_some());
        assert!(error.to_string().contains("mock: set failed"), "{error}");
        assert!(leases.is_held("ns:k"));
        assert_eq!(leases.release_count(), 0);
    }

    #[tokio::test]
    async fn panicking_write_is_populate_error_under_lease() {
        let leases = MockLeases::new(Clock::new_frozen());
        let populator = leased(&PanickingStore, &leases, |_| async { Ok::<_, BoxError>("fresh".to_string()) });

        let error = populator.leased_populate(&key()).await.unwrap_err();

        let Error::Populate(error) = error else {
            panic!("expected a populate error, got {error:?}");
        };
        assert_eq!(error.lease(), Some("ns:k"));
        assert!(error.to_string().contains("panicked: store cannot write k"), "{error}");
        assert!(leases.is_held("ns:k"));
    }

    #[tokio::test]
    async fn panicking_acquire_is_lock_error() {
        let store = MockStore::new();
        let leases = PanickingLeases { on_acquire: true };
        let populator = leased(&store, &leases, |_| async { Ok::<_, BoxError>("fresh".to_string()) });

        let error = populator.leased_populate(&key()).await.unwrap_err();

        let Error::Lock(error) = error else {
            panic!("expected a lock error, got {error:?}");
        };
        assert_eq!(error.lease(), "ns:k");
        assert!(error.to_string().contains("coordinator crashed while acquiring ns:k"), "{error}");
        assert!(store.writes().is_empty());
    }

    #[tokio::test]
    async fn panicking_release_still_reports_success() {
        let store = MockStore::new();
        let leases = PanickingLeases { on_acquire: false };
        let populator = leased(&store, &leases, |_| async { Ok::<_, BoxError>("fresh".to_string()) });

        let outcome = populator.leased_populate(&key()).await.unwrap();

        assert_eq!(outcome.into_value(), Some("fresh".to_string()));
        assert_eq!(store.peek(&key()), Some("fresh".to_string()));
    }
}
