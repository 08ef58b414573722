// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Structured logs and metrics for cache operations.
//!
//! Logging requires the `logs` feature and emits `tracing` events; metrics require the
//! `metrics` feature and record OpenTelemetry instruments. Both are off unless enabled
//! through [`TelemetryConfig`], and neither affects results.

use std::time::Duration;

pub(crate) mod attributes;
mod config;
pub(crate) mod ext;
#[cfg(any(feature = "metrics", test))]
mod metrics;
#[cfg(test)]
pub(crate) mod testing;

pub use config::TelemetryConfig;

/// The cache operation an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CacheOperation {
    Call,
    Batch,
    Invalidate,
    InvalidateAll,
}

impl CacheOperation {
    #[cfg_attr(
        not(any(feature = "logs", feature = "metrics", test)),
        expect(dead_code, reason = "names are only read by telemetry sinks")
    )]
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Call => "cache.call",
            Self::Batch => "cache.batch",
            Self::Invalidate => "cache.invalidate",
            Self::InvalidateAll => "cache.invalidate_all",
        }
    }
}

/// What happened during a cache operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CacheActivity {
    /// A stored value was returned.
    Hit,
    /// Nothing usable was stored; the computation ran.
    Miss,
    /// A computed value was written.
    Stored,
    /// The store was skipped: the entry is offline or has nothing tracked.
    Bypass,
    /// The store became unreachable; the entry went offline.
    Offline,
    /// Keys were deleted.
    Invalidated,
    /// The operation failed.
    Error,
}

impl CacheActivity {
    #[cfg_attr(
        not(any(feature = "logs", feature = "metrics", test)),
        expect(dead_code, reason = "names are only read by telemetry sinks")
    )]
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "cache.hit",
            Self::Miss => "cache.miss",
            Self::Stored => "cache.stored",
            Self::Bypass => "cache.bypass",
            Self::Offline => "cache.offline",
            Self::Invalidated => "cache.invalidated",
            Self::Error => "cache.error",
        }
    }

    #[cfg(any(feature = "logs", test))]
    pub(crate) fn level(self) -> tracing::Level {
        match self {
            Self::Hit | Self::Miss => tracing::Level::DEBUG,
            Self::Stored | Self::Bypass | Self::Invalidated => tracing::Level::INFO,
            Self::Offline | Self::Error => tracing::Level::ERROR,
        }
    }
}

/// Records cache events to the configured sinks.
#[derive(Clone, Debug, Default)]
pub(crate) struct CacheTelemetry {
    #[cfg(any(feature = "logs", test))]
    logs_enabled: bool,
    #[cfg(any(feature = "metrics", test))]
    instruments: Option<metrics::Instruments>,
}

impl CacheTelemetry {
    #[cfg_attr(
        not(any(feature = "logs", feature = "metrics", test)),
        expect(unused_variables, reason = "no-op when telemetry is compiled out")
    )]
    pub(crate) fn record(&self, namespace: &str, operation: CacheOperation, activity: CacheActivity, duration: Option<Duration>) {
        #[cfg(any(feature = "metrics", test))]
        if let Some(instruments) = &self.instruments {
            instruments.record(namespace, operation, activity, duration);
        }

        #[cfg(any(feature = "logs", test))]
        if self.logs_enabled {
            emit(namespace, operation, activity, duration);
        }
    }
}

#[cfg(any(feature = "logs", test))]
fn emit(namespace: &str, operation: CacheOperation, activity: CacheActivity, duration: Option<Duration>) {
    let operation = operation.as_str();
    let activity_name = activity.as_str();
    let duration_ns = duration.map(|d| d.as_nanos());

    // Field names must match the constants in attributes.rs.
    macro_rules! emit_at {
        ($level:ident) => {
            tracing::$level!(
                cache.namespace = namespace,
                cache.operation = operation,
                cache.activity = activity_name,
                cache.duration_ns = ?duration_ns,
                "cache.event"
            )
        };
    }

    let level = activity.level();
    if level == tracing::Level::ERROR {
        emit_at!(error);
    } else if level == tracing::Level::INFO {
        emit_at!(info);
    } else {
        emit_at!(debug);
    }
}
