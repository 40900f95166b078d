//! Brings a decoded child collection into one canonical shape.
//!
//! Three shapes have been produced over time for the same logical collection:
//!
//! 1. a sequence of item maps (current),
//! 2. a whole collection as one JSON string,
//! 3. a sequence whose first element is that JSON string, often with backslash-escaped
//!    quotes (a double-encoding artifact).
//!
//! Items that are not maps survive normalization; the deduplicator drops them.

use log::{debug, warn};
use serde_json::Value;

use super::codec::DecodedCell;

/// Returns the canonical ordered sequence of child items for a decoded cell.
pub fn normalize(cell: DecodedCell) -> Vec<Value> {
    match cell {
        DecodedCell::Raw(text) => parse_collection(&text).unwrap_or_else(|| {
            debug!("Discarding child collection that is not JSON");
            Vec::new()
        }),
        DecodedCell::Items(items) => match items.first() {
            Some(Value::String(wrapped)) => {
                let unescaped = unescape_backslashes(wrapped);
                parse_collection(&unescaped)
                    .or_else(|| parse_collection(wrapped))
                    .unwrap_or_else(|| {
                        warn!("Discarding double-encoded child collection that is not JSON");
                        Vec::new()
                    })
            }
            _ => items,
        },
    }
}

fn parse_collection(text: &str) -> Option<Vec<Value>> {
    match serde_json::from_str::<Value>(text).ok()? {
        Value::Array(items) => Some(items),
        Value::Object(map) => Some(vec![Value::Object(map)]),
        _ => None,
    }
}

/// Removes one level of backslash escaping: `\x` becomes `x`, `\\` becomes `\`.
fn unescape_backslashes(text: &str) -> String {
    let mut unescaped = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                unescaped.push(next);
            }
        } else {
            unescaped.push(c);
        }
    }
    unescaped
}
