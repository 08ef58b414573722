// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#[cfg(any(feature = "metrics", test))]
pub(crate) const NAMESPACE: &str = "cache.namespace";

#[cfg(any(feature = "metrics", test))]
pub(crate) const OPERATION: &str = "cache.operation";

#[cfg(any(feature = "metrics", test))]
pub(crate) const ACTIVITY: &str = "cache.activity";

#[cfg(test)]
pub(crate) const DURATION: &str = "cache.duration_ns";

#[cfg(test)]
pub(crate) const EVENT: &str = "cache.event";
