// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use opentelemetry::{
    InstrumentationScope, KeyValue,
    metrics::{Counter, Histogram, Meter, MeterProvider},
};

use super::{CacheActivity, CacheOperation, attributes};

const METER_NAME: &str = "rcache";
const VERSION: &str = "v0.1.0";
const SCHEMA_URL: &str = "https://opentelemetry.io/schemas/1.47.0";
const EVENT_COUNT_NAME: &str = "cache.event.count";
const OPERATION_DURATION_NAME: &str = "cache.operation.duration";

pub(crate) fn create_meter(provider: &dyn MeterProvider) -> Meter {
    provider.meter_with_scope(
        InstrumentationScope::builder(METER_NAME)
            .with_version(VERSION)
            .with_schema_url(SCHEMA_URL)
            .build(),
    )
}

#[derive(Clone, Debug)]
pub(crate) struct Instruments {
    event_count: Counter<u64>,
    operation_duration: Histogram<f64>,
}

impl Instruments {
    pub(crate) fn new(meter: &Meter) -> Self {
        Self {
            event_count: meter
                .u64_counter(EVENT_COUNT_NAME)
                .with_description("Cache events")
                .with_unit("{event}")
                .build(),
            operation_duration: meter
                .f64_histogram(OPERATION_DURATION_NAME)
                .with_description("Duration of the store round trip behind a cache event")
                .with_unit("s")
                .build(),
        }
    }

    pub(crate) fn record(&self, namespace: &str, operation: CacheOperation, activity: CacheActivity, duration: Option<Duration>) {
        let attributes = [
            KeyValue::new(attributes::NAMESPACE, namespace.to_owned()),
            KeyValue::new(attributes::OPERATION, operation.as_str()),
            KeyValue::new(attributes::ACTIVITY, activity.as_str()),
        ];

        self.event_count.add(1, &attributes);
        if let Some(duration) = duration {
            self.operation_duration.record(duration.as_secs_f64(), &attributes);
        }
    }
}
