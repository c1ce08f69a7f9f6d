//! Text-safe encoding for process payloads
//!
//! Recordings files are YAML and meant to be reviewed in diffs, but process
//! input and output can be arbitrary bytes. Text stays text; bytes become a
//! one-key mapping holding standard base64.

use std::borrow::Cow;
use std::fmt;

use base64::engine::general_purpose;
use base64::Engine as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_yaml::{Mapping, Value};
use thiserror::Error;

/// Key of the single-entry mapping that wraps base64 encoded bytes.
pub const BINARY_MARKER: &str = "__base64__";

#[derive(Debug, Error)]
pub enum CodecError {
    /// The value is neither null, a string, nor a binary mapping.
    /// The original value is handed back unchanged.
    #[error("Unsupported payload value: {0:?}")]
    Unsupported(Value),
    #[error("Invalid base64 payload: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
}

/// A text-or-bytes value carried by a recording (stdin, stdout, stderr).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Payload {
    Text(String),
    Bytes(Vec<u8>),
}

impl Payload {
    /// Wrap raw process output, keeping it as text when it is valid UTF-8.
    pub fn from_output(bytes: Vec<u8>) -> Self {
        match String::from_utf8(bytes) {
            Ok(text) => Payload::Text(text),
            Err(err) => Payload::Bytes(err.into_bytes()),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Payload::Text(text) => text.as_bytes(),
            Payload::Bytes(bytes) => bytes,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(text) => Some(text),
            Payload::Bytes(_) => None,
        }
    }

    pub fn to_string_lossy(&self) -> Cow<'_, str> {
        match self {
            Payload::Text(text) => Cow::Borrowed(text),
            Payload::Bytes(bytes) => String::from_utf8_lossy(bytes),
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Payload::Text(text) => text.into_bytes(),
            Payload::Bytes(bytes) => bytes,
        }
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, Payload::Bytes(_))
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_lossy())
    }
}

impl From<&str> for Payload {
    fn from(value: &str) -> Self {
        Payload::Text(value.to_string())
    }
}

impl From<String> for Payload {
    fn from(value: String) -> Self {
        Payload::Text(value)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(value: Vec<u8>) -> Self {
        Payload::Bytes(value)
    }
}

impl From<&[u8]> for Payload {
    fn from(value: &[u8]) -> Self {
        Payload::Bytes(value.to_vec())
    }
}

/// Encode an optional payload into its persisted form.
///
/// `None` becomes null, text is kept as a plain string and bytes become
/// `{__base64__: <standard base64>}`.
pub fn encode_value(value: Option<&Payload>) -> Value {
    match value {
        None => Value::Null,
        Some(Payload::Text(text)) => Value::String(text.clone()),
        Some(Payload::Bytes(bytes)) => {
            let mut mapping = Mapping::new();
            mapping.insert(
                Value::String(BINARY_MARKER.to_string()),
                Value::String(general_purpose::STANDARD.encode(bytes)),
            );
            Value::Mapping(mapping)
        }
    }
}

/// Reverse [`encode_value`].
///
/// Only the exact one-key binary mapping is turned back into bytes; any other
/// shape that is not a string or null is returned in [`CodecError::Unsupported`].
pub fn decode_value(value: Value) -> Result<Option<Payload>, CodecError> {
    match value {
        Value::Null => Ok(None),
        Value::String(text) => Ok(Some(Payload::Text(text))),
        Value::Mapping(mapping) => match binary_field(&mapping) {
            Some(encoded) => {
                let bytes = general_purpose::STANDARD.decode(encoded)?;
                Ok(Some(Payload::Bytes(bytes)))
            }
            None => Err(CodecError::Unsupported(Value::Mapping(mapping))),
        },
        other => Err(CodecError::Unsupported(other)),
    }
}

fn binary_field(mapping: &Mapping) -> Option<&str> {
    if mapping.len() != 1 {
        return None;
    }
    mapping.get(BINARY_MARKER).and_then(Value::as_str)
}

impl Serialize for Payload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        encode_value(Some(self)).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Payload {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        match decode_value(value).map_err(serde::de::Error::custom)? {
            Some(payload) => Ok(payload),
            None => Err(serde::de::Error::custom("payload cannot be null")),
        }
    }
}
