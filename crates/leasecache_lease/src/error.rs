// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Error types for lease operations.

use std::fmt;

/// Why a lease operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Another holder owns the lease. This is expected contention, not a fault.
    Held,
    /// The coordinator could not be reached or answered with a protocol error.
    Unavailable,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Held => f.write_str("is already held"),
            Self::Unavailable => f.write_str("is unavailable"),
        }
    }
}

/// An error from a lease coordinator.
///
/// # Example
///
/// ```
/// use leasecache_lease::{Error, ErrorKind};
///
/// let contention = Error::held("cache:user:1");
/// assert!(contention.is_held());
///
/// let outage = Error::unavailable("cache:user:1", "connection refused");
/// assert_eq!(outage.kind(), ErrorKind::Unavailable);
/// ```
#[ohno::error]
#[display("lease '{name}' {kind}")]
pub struct Error {
    name: String,
    kind: ErrorKind,
}

impl Error {
    /// Creates an error reporting that `name` is held by someone else.
    pub fn held(name: impl Into<String>) -> Self {
        Self::new(name, ErrorKind::Held)
    }

    /// Creates an error reporting an infrastructure failure while handling `name`.
    pub fn unavailable(name: impl Into<String>, cause: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::caused_by(name, ErrorKind::Unavailable, cause)
    }

    /// The lease name the failed operation was about.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The failure classification.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns `true` if the lease is held by another holder.
    #[must_use]
    pub fn is_held(&self) -> bool {
        self.kind == ErrorKind::Held
    }
}

/// A specialized [`Result`] type for lease operations.
pub type Result<T> = std::result::Result<T, Error>;
