// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Pluggable serialization of cached values and call arguments.

use base64::Engine;
use rcache_store::Error;
use serde::{Serialize, de::DeserializeOwned};

/// Output of a [`Codec`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Encoded {
    /// Text-safe output, used verbatim in keys.
    Text(String),
    /// Raw bytes, base64 encoded (standard alphabet, padded) when used in keys.
    Binary(Vec<u8>),
}

impl Encoded {
    /// Returns the bytes to store.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Self::Text(text) => text.into_bytes(),
            Self::Binary(bytes) => bytes,
        }
    }

    /// Returns the text-safe form used as the argument segment of a cache key.
    #[must_use]
    pub fn into_key_segment(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Binary(bytes) => base64::engine::general_purpose::STANDARD.encode(bytes),
        }
    }
}

/// A serializer/deserializer pair for cached values and key arguments.
///
/// The same codec encodes call arguments into keys and results into stored values, so it
/// must be deterministic: equal inputs always encode to equal output. Argument encodings
/// must also be injective: distinct arguments never encode to equal output.
///
/// # Examples
///
/// ```
/// use rcache::{Codec, Encoded, JsonCodec};
///
/// let codec = JsonCodec;
/// let encoded = codec.encode(&vec![1, 2, 3])?;
/// assert_eq!(encoded, Encoded::Text("[1,2,3]".to_string()));
///
/// let decoded: Vec<i32> = codec.decode(b"[1,2,3]")?;
/// assert_eq!(decoded, vec![1, 2, 3]);
/// # Ok::<(), rcache::Error>(())
/// ```
pub trait Codec: Clone + Send + Sync + 'static {
    /// Encodes a value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::codec`] if the value cannot be encoded.
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Encoded, Error>;

    /// Decodes a stored value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::codec`] if the bytes are not a valid encoding of `T`.
    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, Error>;

    /// Encodes the `[positional, keywords]` pair of a call for its cache key.
    ///
    /// Defaults to [`encode`](Self::encode), which suits self-describing formats. Formats
    /// that drop type information must override this, otherwise arguments such as `0` and
    /// `""` can share a key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::codec`] if the arguments cannot be encoded.
    fn encode_arguments<T: Serialize + ?Sized>(&self, arguments: &T) -> Result<Encoded, Error> {
        self.encode(arguments)
    }
}

/// JSON codec, the default.
///
/// Produces text, so keys are human-readable: `rc:ns:[[1,"a"],{"flag":true}]`. Date and
/// time types encode through their serde representation, for `chrono` types an ISO 8601
/// string.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Encoded, Error> {
        serde_json::to_string(value).map(Encoded::Text).map_err(Error::codec)
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, Error> {
        serde_json::from_slice(bytes).map_err(Error::codec)
    }
}

/// Compact binary codec based on `bincode`.
///
/// Call arguments are dynamically typed and `bincode` does not record types, so keys hold
/// the base64 form of the bincode-encoded canonical JSON text of the arguments.
///
/// Results must have a fixed shape. Types that deserialize through
/// `deserialize_any`, such as `serde_json::Value` or `#[serde(untagged)]` enums, encode
/// but fail to decode, so every hit on them is an error.
#[derive(Clone, Copy, Debug, Default)]
pub struct BincodeCodec;

impl Codec for BincodeCodec {
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Encoded, Error> {
        bincode::serialize(value).map(Encoded::Binary).map_err(Error::codec)
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, Error> {
        bincode::deserialize(bytes).map_err(Error::codec)
    }

    fn encode_arguments<T: Serialize + ?Sized>(&self, arguments: &T) -> Result<Encoded, Error> {
        let text = serde_json::to_string(arguments).map_err(Error::codec)?;
        self.encode(&text)
    }
}
