use std::collections::HashSet;

use log::debug;
use serde_json::Value;

use super::{ChildItem, ChildTable, table::TableMapper};

/// Removes duplicate child items, keeping the first occurrence of each unique key.
///
/// Items that are not maps, empty maps and items without a usable key are dropped.
/// The order of the kept items is the input order.
pub fn dedup(table: ChildTable, items: impl IntoIterator<Item = Value>) -> Vec<ChildItem> {
    let mapper = TableMapper::for_table(table);
    let mut seen = HashSet::new();
    let mut unique = Vec::new();

    for item in items {
        let Value::Object(item) = item else {
            debug!("Dropping {} item that is not a map", table);
            continue;
        };
        if item.is_empty() {
            continue;
        }

        match mapper.unique_key(&item) {
            Some(key) => {
                if seen.insert(key) {
                    unique.push(item)
                } else {
                    debug!("Dropping duplicate {} item", table)
                }
            }
            None => debug!("Dropping {} item without identifying columns", table),
        }
    }

    unique
}
