// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Field names of the events emitted by [`CacheTelemetry`](super::CacheTelemetry).

#[cfg(test)]
pub(crate) const CACHE_NAME: &str = "cache.name";

#[cfg(test)]
pub(crate) const CACHE_EVENT_NAME: &str = "cache.event";

#[cfg(test)]
pub(crate) const CACHE_OPERATION_NAME: &str = "cache.operation";

#[cfg(test)]
pub(crate) const CACHE_ACTIVITY_NAME: &str = "cache.activity";

#[cfg(test)]
pub(crate) const CACHE_KEY_NAME: &str = "cache.key";

#[cfg(test)]
pub(crate) const CACHE_DURATION_NAME: &str = "cache.duration_ns";
