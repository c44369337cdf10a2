// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Structured logging for cache activity.
//!
//! Every notable step of a read or a repopulation is recorded as one `tracing` event named
//! `cache.event`, carrying the cache name, the operation, the activity, the key, and (when
//! measured) the duration in nanoseconds.

use std::fmt::Display;
use std::time::Duration;

use tracing::Level;

pub(crate) mod attributes;
pub(crate) mod ext;
#[cfg(test)]
pub(crate) mod testing;

/// Human-readable name of a cache instance, used to tell caches apart in logs.
pub type CacheName = &'static str;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CacheOperation {
    Get,
    Populate,
    Refresh,
}

impl CacheOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "cache.get",
            Self::Populate => "cache.populate",
            Self::Refresh => "cache.refresh",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CacheActivity {
    Hit,
    Miss,
    Populated,
    PopulateFailed,
    TimedOut,
    LeaseDenied,
    LeaseError,
    Released,
    ReleaseFailed,
}

impl CacheActivity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "cache.hit",
            Self::Miss => "cache.miss",
            Self::Populated => "cache.populated",
            Self::PopulateFailed => "cache.populate_failed",
            Self::TimedOut => "cache.timed_out",
            Self::LeaseDenied => "cache.lease_denied",
            Self::LeaseError => "cache.lease_error",
            Self::Released => "cache.released",
            Self::ReleaseFailed => "cache.release_failed",
        }
    }

    pub fn level(self) -> Level {
        match self {
            Self::Hit | Self::Miss | Self::LeaseDenied | Self::Released => Level::DEBUG,
            Self::Populated => Level::INFO,
            Self::PopulateFailed | Self::TimedOut | Self::LeaseError | Self::ReleaseFailed => Level::WARN,
        }
    }
}

/// Emits cache events for one cache instance.
#[derive(Debug, Clone)]
pub(crate) struct CacheTelemetry {
    name: CacheName,
    logging_enabled: bool,
}

impl CacheTelemetry {
    pub(crate) fn new(name: CacheName, logging_enabled: bool) -> Self {
        Self { name, logging_enabled }
    }

    #[inline]
    pub(crate) fn record(&self, operation: CacheOperation, activity: CacheActivity, key: &dyn Display, duration: Option<Duration>) {
        if self.logging_enabled {
            Self::emit(self.name, operation, activity, key, duration);
        }
    }

    fn emit(cache_name: CacheName, operation: CacheOperation, activity: CacheActivity, key: &dyn Display, duration: Option<Duration>) {
        let op = operation.as_str();
        let act = activity.as_str();
        let duration_ns = duration.map(|d| d.as_nanos());

        // Tracing level must be constant, so we use a macro to select the appropriate level.
        // Field names must match constants in attributes.rs.
        macro_rules! emit_event {
            ($level:ident) => {
                tracing::$level!(
                    cache.name = cache_name,
                    cache.operation = op,
                    cache.activity = act,
                    cache.key = %key,
                    cache.duration_ns = ?duration_ns,
                    "cache.event"
                )
            };
        }

        let level = activity.level();
        if level == Level::WARN {
            emit_event!(warn);
        } else if level == Level::INFO {
            emit_event!(info);
        } else {
            emit_event!(debug);
        }
    }
}
