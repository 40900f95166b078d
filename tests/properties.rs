//! Property-based tests for the cell codec, the deduplicator and the CSV transport.

use std::collections::HashSet;

use proptest::prelude::*;
use serde_json::{Value, json};

use submission_transfer::{
    item::csv::{CsvRow, read_rows, write_rows},
    record::{
        ChildTable,
        codec::{self, DecodedCell},
        dedup::dedup,
        table::TableMapper,
    },
};

// ─── Strategies ─────────────────────────────────────────────────────────────

fn arb_text() -> impl Strategy<Value = String> {
    "[ -~éüß✓/\\\\\n\",]{0,24}"
}

fn arb_field() -> impl Strategy<Value = Value> {
    ("[a-d]{0,2}", arb_text(), prop::option::of("text|textarea|email"))
        .prop_map(|(name, value, field_type)| match field_type {
            Some(field_type) => json!({
                "field_name": name,
                "field_value": value,
                "field_type": field_type,
            }),
            None => json!({"field_name": name, "field_value": value}),
        })
}

fn arb_action() -> impl Strategy<Value = Value> {
    ("[a-c]{1,2}", prop::option::of(0i64..3), arb_text()).prop_map(|(slug, id, status)| match id {
        Some(id) => json!({"action_slug": slug, "action_id": id, "status": status}),
        None => json!({"action_slug": slug, "status": status}),
    })
}

fn arb_error() -> impl Strategy<Value = Value> {
    ("[xy]{0,1}", "[mn]{0,1}").prop_map(|(name, message)| json!({"name": name, "message": message}))
}

fn arb_items(table: ChildTable) -> BoxedStrategy<Vec<Value>> {
    match table {
        ChildTable::Fields => prop::collection::vec(arb_field(), 0..8).boxed(),
        ChildTable::Actions => prop::collection::vec(arb_action(), 0..8).boxed(),
        ChildTable::Errors => prop::collection::vec(arb_error(), 0..8).boxed(),
    }
}

fn arb_table_and_items() -> impl Strategy<Value = (ChildTable, Vec<Value>)> {
    prop::sample::select(ChildTable::ALL.to_vec())
        .prop_flat_map(|table| (Just(table), arb_items(table)))
}

// ─── Codec ──────────────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn decode_should_invert_encode((_, items) in arb_table_and_items()) {
        let cell = codec::encode(&Value::Array(items.clone()));

        if items.is_empty() {
            prop_assert_eq!(cell.as_str(), "");
        } else {
            prop_assert!(cell.starts_with(codec::ENCODED_PREFIX));
            prop_assert!(cell.len() > codec::ENCODED_PREFIX.len());
        }
        prop_assert_eq!(codec::decode(&cell), DecodedCell::Items(items));
    }

    #[test]
    fn decode_should_never_panic(cell in "(base64:)?[ -~]{0,64}") {
        let _ = codec::decode(&cell);
    }
}

// ─── Deduplicator ───────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn dedup_should_be_idempotent((table, items) in arb_table_and_items()) {
        let once = dedup(table, items);
        let twice = dedup(table, once.iter().cloned().map(Value::Object));

        prop_assert_eq!(once, twice);
    }

    #[test]
    fn dedup_should_keep_first_item_per_key((table, items) in arb_table_and_items()) {
        let mapper = TableMapper::for_table(table);
        let kept = dedup(table, items.clone());

        let keys: Vec<String> = kept.iter().filter_map(|item| mapper.unique_key(item)).collect();
        prop_assert_eq!(keys.len(), kept.len());
        prop_assert_eq!(keys.iter().collect::<HashSet<_>>().len(), keys.len());

        for item in &kept {
            let key = mapper.unique_key(item);
            let first = items
                .iter()
                .filter_map(Value::as_object)
                .find(|candidate| mapper.unique_key(candidate) == key);
            prop_assert_eq!(first, Some(item));
        }
    }
}

// ─── CSV transport ──────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn csv_should_preserve_values(values in prop::collection::vec((arb_text(), arb_text()), 1..6)) {
        let headers = vec!["status".to_string(), "user_agent".to_string()];
        let rows: Vec<CsvRow> = values
            .into_iter()
            .map(|(status, user_agent)| {
                CsvRow::from([
                    ("status".to_string(), status),
                    ("user_agent".to_string(), user_agent),
                ])
            })
            .collect();

        let bytes = write_rows(Vec::new(), &headers, &rows).unwrap();
        let table = read_rows(bytes.as_slice()).unwrap();

        prop_assert_eq!(table.headers, headers);
        prop_assert_eq!(table.rows, rows);
    }
}
