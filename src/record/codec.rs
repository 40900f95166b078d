//! Cell codec for child collections.
//!
//! A non-empty collection is stored as `base64:` followed by the base64 of its compact
//! JSON text. Unicode characters and `/` are left unescaped in the JSON, which is what
//! `serde_json` produces by default. Cells without the prefix predate the encoding and are
//! handed on untouched as [`DecodedCell::Raw`].

use base64::{Engine, engine::general_purpose::STANDARD};
use log::warn;
use serde_json::Value;

/// Prefix marking an encoded cell.
pub const ENCODED_PREFIX: &str = "base64:";

/// How many characters of unparseable JSON end up in the diagnostic.
const DIAGNOSTIC_EXCERPT: usize = 100;

/// A child-collection cell after decoding.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedCell {
    /// The cell decoded to a sequence of values.
    Items(Vec<Value>),
    /// The cell carried no prefix, or decoded to a JSON string: a legacy payload left
    /// for the normalizer to interpret.
    Raw(String),
}

impl DecodedCell {
    pub fn empty() -> DecodedCell {
        DecodedCell::Items(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            DecodedCell::Items(items) => items.is_empty(),
            DecodedCell::Raw(raw) => raw.is_empty(),
        }
    }
}

impl Default for DecodedCell {
    fn default() -> Self {
        DecodedCell::empty()
    }
}

/// Encodes a child collection for one CSV cell.
///
/// Absent (`null`), empty arrays, empty objects and empty strings encode to the empty
/// string. A string is parsed as JSON first and falls back to an empty collection when it
/// does not hold an array or an object. Scalars encode to the empty string.
pub fn encode(value: &Value) -> String {
    let collection = match value {
        Value::Array(_) | Value::Object(_) => value.clone(),
        Value::String(text) => match serde_json::from_str::<Value>(text) {
            Ok(parsed @ (Value::Array(_) | Value::Object(_))) => parsed,
            _ => Value::Array(Vec::new()),
        },
        _ => Value::Array(Vec::new()),
    };

    let is_empty = match &collection {
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => true,
    };
    if is_empty {
        return String::new();
    }

    let json = collection.to_string();
    format!("{}{}", ENCODED_PREFIX, STANDARD.encode(json.as_bytes()))
}

/// Decodes one CSV cell.
///
/// Never fails: a cell whose base64 or JSON is corrupt logs a diagnostic and decodes to an
/// empty collection, so one bad cell cannot block the rest of an import.
pub fn decode(cell: &str) -> DecodedCell {
    if cell.is_empty() {
        return DecodedCell::empty();
    }

    let Some(payload) = cell.strip_prefix(ENCODED_PREFIX) else {
        return DecodedCell::Raw(cell.to_string());
    };

    let bytes = match STANDARD.decode(payload.trim()) {
        Ok(bytes) => bytes,
        Err(error) => {
            warn!("Failed to decode base64 data: {}", error);
            return DecodedCell::empty();
        }
    };

    let json = match String::from_utf8(bytes) {
        Ok(json) => json,
        Err(error) => {
            warn!("Decoded cell is not valid UTF-8: {}", error);
            return DecodedCell::empty();
        }
    };

    match serde_json::from_str::<Value>(&json) {
        Ok(Value::Array(items)) => DecodedCell::Items(items),
        Ok(Value::Object(map)) => DecodedCell::Items(vec![Value::Object(map)]),
        Ok(Value::String(text)) => DecodedCell::Raw(text),
        Ok(Value::Null) => DecodedCell::empty(),
        Ok(other) => {
            warn!("Decoded cell holds a bare scalar: {}", other);
            DecodedCell::empty()
        }
        Err(error) => {
            warn!("JSON decode error: {}", error);
            warn!(
                "JSON string: {}",
                json.chars().take(DIAGNOSTIC_EXCERPT).collect::<String>()
            );
            DecodedCell::empty()
        }
    }
}
