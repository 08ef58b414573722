// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#[cfg(any(feature = "metrics", test))]
use opentelemetry::metrics::MeterProvider;

use crate::telemetry::CacheTelemetry;

/// Configuration for cache telemetry.
///
/// Everything is disabled by default. Enable logs and/or metrics with the builder
/// methods, then pass the configuration to
/// [`CacheBuilder::telemetry`](crate::CacheBuilder::telemetry).
///
/// # Examples
///
/// ```
/// use rcache::TelemetryConfig;
///
/// let config = TelemetryConfig::new();
/// # #[cfg(feature = "logs")]
/// let config = config.with_logs();
/// # let _ = config;
/// ```
#[derive(Clone, Debug, Default)]
pub struct TelemetryConfig {
    #[cfg(any(feature = "logs", test))]
    logs_enabled: bool,
    #[cfg(any(feature = "metrics", test))]
    meter: Option<opentelemetry::metrics::Meter>,
}

impl TelemetryConfig {
    /// Creates a configuration with logs and metrics disabled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Emits a `tracing` event for every cache activity.
    ///
    /// Hits and misses log at debug level, writes, bypasses and invalidations at info,
    /// and offline transitions and failures at error.
    #[cfg(any(feature = "logs", test))]
    #[must_use]
    pub fn with_logs(self) -> Self {
        Self {
            logs_enabled: true,
            ..self
        }
    }

    /// Records OpenTelemetry metrics through a meter obtained from `provider`.
    ///
    /// Emits the `cache.event.count` counter and the `cache.operation.duration`
    /// histogram, both tagged with namespace, operation and activity.
    #[cfg(any(feature = "metrics", test))]
    #[must_use]
    pub fn with_metrics(mut self, provider: &dyn MeterProvider) -> Self {
        self.meter = Some(super::metrics::create_meter(provider));
        self
    }

    pub(crate) fn build(self) -> CacheTelemetry {
        CacheTelemetry {
            #[cfg(any(feature = "logs", test))]
            logs_enabled: self.logs_enabled,
            #[cfg(any(feature = "metrics", test))]
            instruments: self.meter.as_ref().map(super::metrics::Instruments::new),
        }
    }
}
