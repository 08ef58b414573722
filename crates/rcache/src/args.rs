// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Call arguments of a wrapped computation.

use std::collections::BTreeMap;

use rcache_store::Error;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

/// The arguments of one call: an ordered positional list plus keyword arguments.
///
/// Keyword arguments are held sorted by name, so the order in which they are added
/// never changes the derived cache key. Adding a keyword twice keeps the last value.
///
/// The same `CallArgs` value is used to derive the cache key and is handed to the
/// wrapped computation on a miss.
///
/// # Examples
///
/// ```
/// use rcache::CallArgs;
///
/// let args = CallArgs::new().arg(7).arg("users").kwarg("limit", 10);
///
/// assert_eq!(args.parse::<i64>(0)?, 7);
/// assert_eq!(args.parse::<String>(1)?, "users");
/// assert_eq!(args.parse_kwarg::<u32>("limit")?, Some(10));
/// assert_eq!(args.parse_kwarg::<u32>("offset")?, None);
/// # Ok::<(), rcache::Error>(())
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CallArgs {
    positional: Vec<Value>,
    keywords: BTreeMap<String, Value>,
}

impl CallArgs {
    /// Creates an empty argument list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a positional argument.
    #[must_use]
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Sets a keyword argument.
    #[must_use]
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.keywords.insert(name.into(), value.into());
        self
    }

    /// Appends any serializable value as a positional argument.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` cannot be represented as JSON, for example a map with
    /// non-string keys.
    pub fn try_arg<T: Serialize>(self, value: &T) -> Result<Self, Error> {
        let value = serde_json::to_value(value).map_err(Error::codec)?;
        Ok(self.arg(value))
    }

    /// Sets any serializable value as a keyword argument.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` cannot be represented as JSON.
    pub fn try_kwarg<T: Serialize>(self, name: impl Into<String>, value: &T) -> Result<Self, Error> {
        let value = serde_json::to_value(value).map_err(Error::codec)?;
        Ok(self.kwarg(name, value))
    }

    /// The positional arguments, in call order.
    #[must_use]
    pub fn positional(&self) -> &[Value] {
        &self.positional
    }

    /// The keyword arguments, sorted by name.
    #[must_use]
    pub fn keywords(&self) -> &BTreeMap<String, Value> {
        &self.keywords
    }

    /// Returns the positional argument at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.positional.get(index)
    }

    /// Returns the keyword argument called `name`.
    #[must_use]
    pub fn get_kwarg(&self, name: &str) -> Option<&Value> {
        self.keywords.get(name)
    }

    /// Deserializes the positional argument at `index`.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no argument at `index` or it does not deserialize into `T`.
    pub fn parse<T: DeserializeOwned>(&self, index: usize) -> Result<T, Error> {
        let value = self
            .get(index)
            .ok_or_else(|| Error::codec(format!("missing positional argument {index}")))?;
        T::deserialize(value).map_err(Error::codec)
    }

    /// Deserializes the keyword argument called `name`, if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the argument is present but does not deserialize into `T`.
    pub fn parse_kwarg<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, Error> {
        self.get_kwarg(name)
            .map(|value| T::deserialize(value).map_err(Error::codec))
            .transpose()
    }

    /// Returns `true` if there are neither positional nor keyword arguments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.keywords.is_empty()
    }
}
