// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Error types for cache and store operations.

use recoverable::{Recovery, RecoveryInfo, RecoveryKind};

/// An error from a cache or store operation.
///
/// Every error carries [`RecoveryInfo`] describing whether the condition is
/// transient. Store connectivity problems are classified as
/// [`RecoveryKind::Unavailable`]; the cache layer reacts to those by bypassing
/// the store for the rest of an entry's lifetime. All other failures are
/// permanent and propagate to the caller.
///
/// Use [`ohno::ErrorExt::find_source`] to reach the underlying cause.
///
/// # Examples
///
/// ```
/// use rcache_store::Error;
///
/// let error = Error::connection("connection refused");
/// assert!(error.is_unavailable());
///
/// let error = Error::command("WRONGTYPE");
/// assert!(!error.is_unavailable());
/// ```
#[ohno::error]
pub struct Error {
    recovery_info: RecoveryInfo,
}

impl Error {
    /// The store could not be reached, or the connection was lost mid-operation.
    pub fn connection(cause: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::caused_by(RecoveryInfo::unavailable(), cause)
    }

    /// The store was reached but rejected or failed the command.
    pub fn command(cause: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::caused_by(RecoveryInfo::never(), cause)
    }

    /// A value or argument list could not be encoded or decoded.
    pub fn codec(cause: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::caused_by(RecoveryInfo::never(), cause)
    }

    /// The wrapped computation itself failed.
    pub fn computation(cause: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::caused_by(RecoveryInfo::never(), cause)
    }

    /// The cache was used in a way it does not support.
    pub fn usage(cause: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::caused_by(RecoveryInfo::never(), cause)
    }

    /// Returns `true` when the store is unreachable.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        self.recovery_info.kind() == RecoveryKind::Unavailable
    }
}

impl Recovery for Error {
    fn recovery(&self) -> RecoveryInfo {
        self.recovery_info.clone()
    }
}

/// A specialized [`Result`] type for cache and store operations.
pub type Result<T> = std::result::Result<T, Error>;
