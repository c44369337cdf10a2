// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

/// Default lifetime of a repopulation lease.
pub const DEFAULT_LEASE_EXPIRES_IN: Duration = Duration::from_secs(300);

/// Default time budget of one populate invocation.
pub const DEFAULT_POPULATE_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Default prefix of lease names.
pub const DEFAULT_NAMESPACE: &str = "leasecache:";

/// Tunables of a self-populating cache.
///
/// With the `serde` feature the options can be loaded from configuration. Durations
/// are written as whole milliseconds and every field is optional:
///
/// ```json
/// { "lease_expires_in_ms": 300000, "populate_timeout_ms": 30000, "namespace": "users:" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[non_exhaustive]
pub struct PopulateOptions {
    /// How long an unreleased lease blocks further repopulation of its key.
    ///
    /// This is also the effective retry backoff after a failed repopulation, since the
    /// lease is left to expire instead of being released.
    #[cfg_attr(feature = "serde", serde(rename = "lease_expires_in_ms", with = "millis"))]
    pub lease_expires_in: Duration,

    /// How long one populate invocation may run before it is reported as timed out.
    #[cfg_attr(feature = "serde", serde(rename = "populate_timeout_ms", with = "millis"))]
    pub populate_timeout: Duration,

    /// Prefix of lease names. Keeps this cache's leases apart from other users of the
    /// same coordinator.
    pub namespace: String,
}

impl PopulateOptions {
    /// Creates options with the defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets [`lease_expires_in`](Self::lease_expires_in).
    #[must_use]
    pub fn lease_expires_in(mut self, lease_expires_in: Duration) -> Self {
        self.lease_expires_in = lease_expires_in;
        self
    }

    /// Sets [`populate_timeout`](Self::populate_timeout).
    #[must_use]
    pub fn populate_timeout(mut self, populate_timeout: Duration) -> Self {
        self.populate_timeout = populate_timeout;
        self
    }

    /// Sets [`namespace`](Self::namespace).
    #[must_use]
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }
}

impl Default for PopulateOptions {
    fn default() -> Self {
        Self {
            lease_expires_in: DEFAULT_LEASE_EXPIRES_IN,
            populate_timeout: DEFAULT_POPULATE_TIMEOUT,
            namespace: DEFAULT_NAMESPACE.to_owned(),
        }
    }
}

#[cfg(feature = "serde")]
mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = PopulateOptions::default();

        assert_eq!(options.lease_expires_in, Duration::from_secs(300));
        assert_eq!(options.populate_timeout, Duration::from_secs(30));
        assert_eq!(options.namespace, "leasecache:");
        assert_eq!(PopulateOptions::new(), options);
    }

    #[test]
    fn setters() {
        let options = PopulateOptions::new()
            .lease_expires_in(Duration::from_secs(60))
            .populate_timeout(Duration::from_secs(5))
            .namespace("users:");

        assert_eq!(options.lease_expires_in, Duration::from_secs(60));
        assert_eq!(options.populate_timeout, Duration::from_secs(5));
        assert_eq!(options.namespace, "users:");
    }

    #[test]
    #[cfg(feature = "serde")]
    fn deserialize_partial_config() {
        let options: PopulateOptions = serde_json::from_str(r#"{ "populate_timeout_ms": 1500, "namespace": "users:" }"#).unwrap();

        assert_eq!(options.populate_timeout, Duration::from_millis(1500));
        assert_eq!(options.lease_expires_in, DEFAULT_LEASE_EXPIRES_IN);
        assert_eq!(options.namespace, "users:");
    }

    #[test]
    #[cfg(feature = "serde")]
    fn serialize_as_millis() {
        let json = serde_json::to_value(PopulateOptions::new().lease_expires_in(Duration::from_secs(2))).unwrap();

        assert_eq!(json["lease_expires_in_ms"], 2000);
        assert_eq!(json["populate_timeout_ms"], 30_000);
    }
}
