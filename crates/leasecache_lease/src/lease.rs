// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::Debug;
use std::pin::Pin;

use crate::Error;

type ReleaseFuture = Pin<Box<dyn Future<Output = Result<(), Error>> + Send>>;
type Releaser = Box<dyn FnOnce() -> ReleaseFuture + Send>;

/// A granted lease.
///
/// The lease is held until [`release`](Self::release) is called or its lifetime
/// runs out. Dropping a `Lease` does **not** release it: the coordinator keeps
/// the grant until it expires. Callers that want the key blocked for the full
/// lifetime (for example after a failed populate) simply drop the lease.
pub struct Lease {
    name: String,
    releaser: Releaser,
}

impl Lease {
    /// Creates a lease from the coordinator's release callback.
    ///
    /// `release` is invoked at most once, when [`Lease::release`] is called.
    pub fn new<F, Fut>(name: impl Into<String>, release: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), Error>> + Send + 'static,
    {
        Self {
            name: name.into(),
            releaser: Box::new(move || Box::pin(release())),
        }
    }

    /// The name the lease was acquired under.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Gives the lease back to the coordinator before it expires.
    ///
    /// # Errors
    ///
    /// Returns the coordinator's error if the release could not be delivered. The
    /// lease then stays held until it expires.
    pub async fn release(self) -> Result<(), Error> {
        (self.releaser)().await
    }
}

impl Debug for Lease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lease").field("name", &self.name).finish_non_exhaustive()
    }
}
