// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Deterministic cache key derivation.

use rcache_store::Error;

use crate::{CallArgs, Codec, JsonCodec};

/// Derives cache keys for one namespace.
///
/// A key has the form `{prefix}:{namespace}:{encoded}`, where `encoded` is the codec's
/// [`encode_arguments`](Codec::encode_arguments) output for `[positional, keywords]`. The namespace's tracking set lives at
/// `{prefix}:{namespace}:keys`.
///
/// Building a key has no side effects, and equal arguments always produce equal keys.
///
/// # Examples
///
/// ```
/// use rcache::{CallArgs, JsonCodec, KeyBuilder};
///
/// let keys = KeyBuilder::new("rc", "reports", JsonCodec);
/// let key = keys.build(&CallArgs::new().arg(1).kwarg("full", true))?;
///
/// assert_eq!(key, r#"rc:reports:[[1],{"full":true}]"#);
/// assert_eq!(keys.tracking_key(), "rc:reports:keys");
/// # Ok::<(), rcache::Error>(())
/// ```
#[derive(Clone, Debug)]
pub struct KeyBuilder<C = JsonCodec> {
    prefix: String,
    namespace: String,
    tracking_key: String,
    skip_receiver: bool,
    codec: C,
}

impl<C> KeyBuilder<C> {
    /// Creates a key builder for `namespace` under `prefix`.
    pub fn new(prefix: impl Into<String>, namespace: impl Into<String>, codec: C) -> Self {
        let prefix = prefix.into();
        let namespace = namespace.into();
        let tracking_key = format!("{prefix}:{namespace}:keys");
        Self {
            prefix,
            namespace,
            tracking_key,
            skip_receiver: false,
            codec,
        }
    }

    /// Excludes the first positional argument from every key.
    ///
    /// Use this when the first argument is a receiver whose identity should not take part
    /// in caching.
    #[must_use]
    pub fn skip_receiver(mut self, skip: bool) -> Self {
        self.skip_receiver = skip;
        self
    }

    /// The key of the namespace's tracking set.
    #[must_use]
    pub fn tracking_key(&self) -> &str {
        &self.tracking_key
    }

    /// The namespace keys are built for.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The prefix every key starts with.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns `true` if the first positional argument is excluded from keys.
    #[must_use]
    pub fn skips_receiver(&self) -> bool {
        self.skip_receiver
    }

    pub(crate) fn codec(&self) -> &C {
        &self.codec
    }
}

impl<C: Codec> KeyBuilder<C> {
    /// Builds the key for one call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::codec`] if the codec cannot encode the arguments.
    pub fn build(&self, args: &CallArgs) -> Result<String, Error> {
        let positional = if self.skip_receiver {
            args.positional().get(1..).unwrap_or_default()
        } else {
            args.positional()
        };

        let encoded = self.codec.encode_arguments(&(positional, args.keywords()))?;
        Ok(format!("{}:{}:{}", self.prefix, self.namespace, encoded.into_key_segment()))
    }
}
