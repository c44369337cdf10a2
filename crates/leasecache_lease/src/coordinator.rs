// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Arc;
use std::time::Duration;

use crate::{Error, Lease};

/// A distributed mutual-exclusion service handing out named, expiring leases.
///
/// Implementations must guarantee that at most one unexpired lease exists per name.
/// Best effort is acceptable: no consensus is assumed, and callers tolerate the window
/// between a lease expiring and its former holder noticing.
pub trait LeaseCoordinator: Send + Sync {
    /// Attempts to acquire the lease `name` for at most `lifetime`.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] of kind [`Held`](crate::ErrorKind::Held) when another holder
    /// owns the lease, or [`Unavailable`](crate::ErrorKind::Unavailable) when the
    /// coordinator itself failed.
    fn acquire(&self, name: &str, lifetime: Duration) -> impl Future<Output = Result<Lease, Error>> + Send;
}

impl<C> LeaseCoordinator for Arc<C>
where
    C: LeaseCoordinator,
{
    fn acquire(&self, name: &str, lifetime: Duration) -> impl Future<Output = Result<Lease, Error>> + Send {
        (**self).acquire(name, lifetime)
    }
}
