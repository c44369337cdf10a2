// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Error types reported by self-populating caches.

use std::any::Any;
use std::fmt::{self, Display, Formatter};
use std::time::Duration;

use ohno::ErrorExt;

/// A boxed error as produced by populate functions.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A populate function did not complete within its time budget.
///
/// The timed-out function is not cancelled. It keeps running in the background
/// and whatever it writes still lands; only the caller stops waiting for it.
#[ohno::error]
#[display("did not complete within {timeout:?}")]
pub struct TimeoutError {
    timeout: Duration,
}

impl TimeoutError {
    /// The budget that was exceeded.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// The lease a failed populate ran under, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct HeldLease(Option<String>);

impl Display for HeldLease {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(name) => write!(f, " under lease '{name}'"),
            None => Ok(()),
        }
    }
}

/// A populate function failed, panicked, or ran out of time.
///
/// Carries the key and, on the lease-guarded path, the name of the lease that
/// was held while populating. The original failure is the error's source.
///
/// # Example
///
/// ```
/// use leasecache::PopulateError;
///
/// # fn inspect(error: &PopulateError) {
/// eprintln!("populating {} failed (lease: {:?})", error.key(), error.lease());
/// # }
/// ```
#[ohno::error]
#[display("failed to populate key '{key}'{lease}")]
pub struct PopulateError {
    key: String,
    lease: HeldLease,
}

impl PopulateError {
    pub(crate) fn unleased(key: impl Into<String>, cause: impl Into<BoxError>) -> Self {
        Self::caused_by(key, HeldLease(None), cause)
    }

    pub(crate) fn leased(key: impl Into<String>, lease: impl Into<String>, cause: impl Into<BoxError>) -> Self {
        Self::caused_by(key, HeldLease(Some(lease.into())), cause)
    }

    /// The key whose value could not be computed.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The lease held during the failed attempt.
    ///
    /// The lease is not released after a failure; it stays held until it expires.
    #[must_use]
    pub fn lease(&self) -> Option<&str> {
        self.lease.0.as_deref()
    }

    /// Returns `true` if the populate function ran out of time.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        self.find_source::<TimeoutError>().is_some()
    }
}

/// The lease coordinator failed for a reason other than contention.
#[ohno::error]
#[display("failed to acquire lease '{lease}'")]
pub struct LockError {
    lease: String,
}

impl LockError {
    /// The name of the lease that could not be acquired.
    #[must_use]
    pub fn lease(&self) -> &str {
        &self.lease
    }
}

/// A background repopulation was cancelled before it finished, usually because the
/// runtime shut down.
#[ohno::error]
#[display("repopulation of key '{key}' was cancelled")]
pub struct CancelledError {
    key: String,
}

impl CancelledError {
    /// The key whose repopulation was cancelled.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

/// A cache was configured with invalid options.
#[ohno::error]
#[display("invalid cache configuration: {reason}")]
pub struct ConfigError {
    reason: String,
}

/// An error returned by a self-populating cache.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// The value could not be computed.
    Populate(PopulateError),
    /// The lease coordinator could not be used.
    Lock(LockError),
    /// The underlying store rejected a read or write.
    Store(leasecache_store::Error),
    /// A background repopulation was cancelled.
    Cancelled(CancelledError),
}

impl Error {
    /// Returns `true` if the failure was a populate function exceeding its budget.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Populate(e) if e.is_timeout())
    }

    /// The key a populate failure or cancellation was about, if this is one.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::Populate(e) => Some(e.key()),
            Self::Cancelled(e) => Some(e.key()),
            Self::Lock(_) | Self::Store(_) => None,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Populate(e) => Display::fmt(e, f),
            Self::Lock(e) => Display::fmt(e, f),
            Self::Store(e) => Display::fmt(e, f),
            Self::Cancelled(e) => Display::fmt(e, f),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Populate(e) => Some(e),
            Self::Lock(e) => Some(e),
            Self::Store(e) => Some(e),
            Self::Cancelled(e) => Some(e),
        }
    }
}

impl From<PopulateError> for Error {
    fn from(error: PopulateError) -> Self {
        Self::Populate(error)
    }
}

impl From<LockError> for Error {
    fn from(error: LockError) -> Self {
        Self::Lock(error)
    }
}

impl From<leasecache_store::Error> for Error {
    fn from(error: leasecache_store::Error) -> Self {
        Self::Store(error)
    }
}

impl From<CancelledError> for Error {
    fn from(error: CancelledError) -> Self {
        Self::Cancelled(error)
    }
}

/// Turns a caught panic payload into an error carrying the panic message.
pub(crate) fn panic_cause(payload: Box<dyn Any + Send>) -> BoxError {
    let message = payload
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| payload.downcast_ref::<&str>().copied())
        .unwrap_or("non-string panic payload");
    format!("panicked: {message}").into()
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    static_assertions::assert_impl_all!(Error: Send, Sync, std::error::Error);
    static_assertions::assert_impl_all!(PopulateError: Send, Sync, std::error::Error);
    static_assertions::assert_impl_all!(LockError: Send, Sync, std::error::Error);
    static_assertions::assert_impl_all!(TimeoutError: Send, Sync, std::error::Error);

    #[test]
    fn timeout_error_display() {
        let error = TimeoutError::new(Duration::from_millis(250));
        assert_eq!(error.to_string(), "did not complete within 250ms");
        assert_eq!(error.timeout(), Duration::from_millis(250));
    }

    #[test]
    fn unleased_populate_error_mentions_key_and_cause() {
        let error = PopulateError::unleased("user:1", "backend exploded");
        let message = error.to_string();

        assert!(message.starts_with("failed to populate key 'user:1'\n"), "{message}");
        assert!(message.contains("backend exploded"), "{message}");
        assert_eq!(error.key(), "user:1");
        assert_eq!(error.lease(), None);
        assert!(!error.is_timeout());
    }

    #[test]
    fn leased_populate_error_mentions_lease() {
        let error = PopulateError::leased("user:1", "leasecache:user:1", "backend exploded");

        assert!(
            error
                .to_string()
                .starts_with("failed to populate key 'user:1' under lease 'leasecache:user:1'")
        );
        assert_eq!(error.lease(), Some("leasecache:user:1"));
    }

    #[test]
    fn populate_error_detects_timeout_cause() {
        let error = PopulateError::unleased("k", TimeoutError::new(Duration::from_secs(1)));
        assert!(error.is_timeout());
        assert!(Error::from(error).is_timeout());
    }

    #[test]
    fn lock_error_carries_lease_and_cause() {
        let cause = leasecache_lease::Error::unavailable("ns:k", "connection refused");
        let error = LockError::caused_by("ns:k", cause);

        assert_eq!(error.lease(), "ns:k");
        assert!(error.to_string().starts_with("failed to acquire lease 'ns:k'"));
        assert!(error.find_source::<leasecache_lease::Error>().is_some());
    }

    #[test]
    fn config_error_display() {
        let error = ConfigError::new("populate function is required");
        assert_eq!(error.to_string(), "invalid cache configuration: populate function is required");
    }

    #[test]
    fn error_delegates_display_and_exposes_inner_source() {
        let error = Error::from(LockError::new("ns:k"));
        assert_eq!(error.to_string(), "failed to acquire lease 'ns:k'");
        assert!(error.source().is_some());
        assert_eq!(error.key(), None);
        assert!(!error.is_timeout());

        let error = Error::from(leasecache_store::Error::from_message("disk full"));
        assert!(matches!(error, Error::Store(_)));
        assert!(error.to_string().contains("disk full"));

        let error = Error::from(PopulateError::unleased("k", "boom"));
        assert_eq!(error.key(), Some("k"));

        let error = Error::from(CancelledError::new("k"));
        assert_eq!(error.to_string(), "repopulation of key 'k' was cancelled");
        assert_eq!(error.key(), Some("k"));
    }

    #[test]
    fn panic_cause_keeps_the_message() {
        let from_str = panic_cause(Box::new("store exploded"));
        assert_eq!(from_str.to_string(), "panicked: store exploded");

        let from_string = panic_cause(Box::new(format!("key {} exploded", 7)));
        assert_eq!(from_string.to_string(), "panicked: key 7 exploded");

        let opaque = panic_cause(Box::new(42_u32));
        assert_eq!(opaque.to_string(), "panicked: non-string panic payload");
    }
}
