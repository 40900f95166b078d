//! Submission records and the pure transformations applied to them.
//!
//! A record is one parent row (a fixed set of scalar columns) plus three child
//! collections, `fields`, `actions` and `errors`. In a CSV file each child collection
//! travels as one opaque cell produced by [`codec::encode`]; on the way back in, the cell
//! goes through [`codec::decode`], [`normalizer::normalize`], [`dedup::dedup`] and finally
//! [`table::TableMapper::prepare`] before it reaches a store.

use std::{collections::BTreeMap, fmt};

use log::{debug, warn};
use serde_json::{Map, Value};

use crate::item::csv::CsvRow;

pub mod codec;
pub mod dedup;
pub mod normalizer;
pub mod table;

use codec::DecodedCell;
use table::{MissingColumn, PreparedItem};

/// One child item: named keys mapped to scalar values.
pub type ChildItem = Map<String, Value>;

/// Scalar columns of a parent record, keyed by column name.
pub type ScalarColumns = BTreeMap<String, String>;

/// UTF-8 byte-order mark, as it shows up at the start of a decoded header.
pub const BYTE_ORDER_MARK: char = '\u{feff}';

/// Identity column of the parent table. Never carried into a destination store.
pub const ID_COLUMN: &str = "id";

/// Scalar columns of the parent table, in export order.
pub const SCALAR_COLUMNS: [&str; 12] = [
    "form_id",
    "user_id",
    "from_content_id",
    "from_content_type",
    "status",
    "ip_address",
    "user_agent",
    "referrer",
    "submit_type",
    "is_viewed",
    "created_at",
    "updated_at",
];

/// Fixed header row of an export file.
pub const EXPORT_HEADERS: [&str; 16] = [
    "id",
    "form_id",
    "user_id",
    "from_content_id",
    "from_content_type",
    "status",
    "ip_address",
    "user_agent",
    "referrer",
    "submit_type",
    "is_viewed",
    "created_at",
    "updated_at",
    "fields",
    "actions",
    "errors",
];

/// Headers an import source must carry. `id` is accepted but not required.
pub const REQUIRED_HEADERS: [&str; 15] = [
    "form_id",
    "user_id",
    "from_content_id",
    "from_content_type",
    "status",
    "ip_address",
    "user_agent",
    "referrer",
    "submit_type",
    "is_viewed",
    "created_at",
    "updated_at",
    "fields",
    "actions",
    "errors",
];

/// The three child tables hanging off a parent record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChildTable {
    Fields,
    Actions,
    Errors,
}

impl ChildTable {
    /// All child tables, in insertion order.
    pub const ALL: [ChildTable; 3] = [ChildTable::Fields, ChildTable::Actions, ChildTable::Errors];

    /// Name of the CSV column carrying this collection.
    pub fn column(self) -> &'static str {
        match self {
            ChildTable::Fields => "fields",
            ChildTable::Actions => "actions",
            ChildTable::Errors => "errors",
        }
    }

    /// Name of the relational table holding this collection.
    pub fn table_name(self) -> &'static str {
        match self {
            ChildTable::Fields => "records_fields",
            ChildTable::Actions => "records_actions",
            ChildTable::Errors => "records_errors",
        }
    }
}

impl fmt::Display for ChildTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// Strips byte-order-mark artifacts from a column name.
pub fn clean_column_name(name: &str) -> &str {
    name.trim_start_matches(BYTE_ORDER_MARK).trim()
}

/// Returns the scalars that may be written to a parent row.
///
/// Column names lose any byte-order mark, the identity column is dropped, and so is
/// anything that is not one of [`SCALAR_COLUMNS`].
pub fn clean_scalars(scalars: &ScalarColumns) -> ScalarColumns {
    let mut cleaned = ScalarColumns::new();
    for (name, value) in scalars {
        let name = clean_column_name(name);
        if name == ID_COLUMN {
            continue;
        }
        if !SCALAR_COLUMNS.contains(&name) {
            debug!("Ignoring column {} outside the record schema", name);
            continue;
        }
        cleaned.insert(name.to_string(), value.clone());
    }
    cleaned
}

/// A parent record on its way into a store.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub scalars: ScalarColumns,
    pub fields: DecodedCell,
    pub actions: DecodedCell,
    pub errors: DecodedCell,
}

impl Record {
    /// Builds a record from one column-keyed CSV row.
    ///
    /// Empty scalar values are left out so the store applies its own defaults, and each
    /// child cell is decoded. A corrupt child cell degrades to an empty collection.
    pub fn from_row(row: &CsvRow) -> Record {
        let scalars: ScalarColumns = row
            .iter()
            .filter(|(_, value)| !value.is_empty())
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        let cell = |table: ChildTable| {
            let raw = row
                .iter()
                .find(|(name, _)| clean_column_name(name) == table.column())
                .map(|(_, value)| value.as_str())
                .unwrap_or_default();
            codec::decode(raw)
        };

        Record {
            scalars: clean_scalars(&scalars),
            fields: cell(ChildTable::Fields),
            actions: cell(ChildTable::Actions),
            errors: cell(ChildTable::Errors),
        }
    }

    pub fn child(&self, table: ChildTable) -> &DecodedCell {
        match table {
            ChildTable::Fields => &self.fields,
            ChildTable::Actions => &self.actions,
            ChildTable::Errors => &self.errors,
        }
    }
}

/// Child items of one table that survived normalization, deduplication and the
/// required-column check, plus the ones that failed that check.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PreparedChildren {
    pub items: Vec<PreparedItem>,
    pub rejected: Vec<MissingColumn>,
}

/// Runs one decoded child cell through the import pipeline.
pub fn prepare_children(table: ChildTable, cell: &DecodedCell) -> PreparedChildren {
    let items = normalizer::normalize(cell.clone());
    let unique = dedup::dedup(table, items);
    let mapper = table::TableMapper::for_table(table);

    let mut prepared = PreparedChildren::default();
    for item in &unique {
        match mapper.prepare(item) {
            Ok(item) => prepared.items.push(item),
            Err(missing) => {
                warn!("Skipping child item: {}", missing);
                prepared.rejected.push(missing);
            }
        }
    }
    prepared
}

/// A parent row joined with its child collections, as produced by a store for export.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregatedRow {
    pub id: i64,
    pub scalars: ScalarColumns,
    pub fields: Vec<ChildItem>,
    pub actions: Vec<ChildItem>,
    pub errors: Vec<ChildItem>,
}

impl AggregatedRow {
    pub fn child(&self, table: ChildTable) -> &[ChildItem] {
        match table {
            ChildTable::Fields => &self.fields,
            ChildTable::Actions => &self.actions,
            ChildTable::Errors => &self.errors,
        }
    }

    pub fn child_mut(&mut self, table: ChildTable) -> &mut Vec<ChildItem> {
        match table {
            ChildTable::Fields => &mut self.fields,
            ChildTable::Actions => &mut self.actions,
            ChildTable::Errors => &mut self.errors,
        }
    }

    /// Flattens the row into the column-keyed form written to CSV.
    pub fn to_csv_row(&self) -> CsvRow {
        let mut row = CsvRow::new();
        row.insert(ID_COLUMN.to_string(), self.id.to_string());
        for (name, value) in &self.scalars {
            row.insert(name.clone(), value.clone());
        }
        for table in ChildTable::ALL {
            let items: Vec<Value> = self
                .child(table)
                .iter()
                .cloned()
                .map(Value::Object)
                .collect();
            row.insert(table.column().to_string(), codec::encode(&Value::Array(items)));
        }
        row
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn row(pairs: &[(&str, &str)]) -> CsvRow {
        pairs
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn clean_scalars_should_drop_identity_and_bom() {
        let scalars = row(&[("\u{feff}id", "7"), ("form_id", "3"), ("status", "success")]);

        let cleaned = clean_scalars(&scalars);

        assert_eq!(cleaned, row(&[("form_id", "3"), ("status", "success")]));
    }

    #[test]
    fn clean_scalars_should_drop_unknown_columns() {
        let scalars = row(&[("form_id", "3"), ("fields", "x"), ("color", "blue")]);

        assert_eq!(clean_scalars(&scalars), row(&[("form_id", "3")]));
    }

    #[test]
    fn from_row_should_skip_empty_scalars_and_decode_children() {
        let fields = codec::encode(&json!([{"field_name": "email", "field_value": "a@b.c"}]));
        let csv_row = row(&[
            ("id", "12"),
            ("form_id", "3"),
            ("user_id", ""),
            ("fields", &fields),
            ("actions", ""),
            ("errors", "not base64"),
        ]);

        let record = Record::from_row(&csv_row);

        assert_eq!(record.scalars, row(&[("form_id", "3")]));
        assert_eq!(
            record.fields,
            DecodedCell::Items(vec![json!({"field_name": "email", "field_value": "a@b.c"})])
        );
        assert_eq!(record.actions, DecodedCell::Items(vec![]));
        assert_eq!(record.errors, DecodedCell::Raw("not base64".to_string()));
    }

    #[test]
    fn prepare_children_should_keep_first_action() {
        let cell = DecodedCell::Items(vec![
            json!({"action_slug": "send_email", "action_id": 1}),
            json!({"action_id": 2}),
            json!({"action_slug": "send_email", "action_id": 1, "status": "failed"}),
        ]);

        let prepared = prepare_children(ChildTable::Actions, &cell);

        assert_eq!(prepared.items.len(), 1);
        assert!(prepared.rejected.is_empty());
        assert_eq!(prepared.items[0].get("status"), Some(&json!("")));
    }

    #[test]
    fn to_csv_row_should_encode_children() {
        let mut aggregated = AggregatedRow {
            id: 4,
            scalars: row(&[("form_id", "9")]),
            ..Default::default()
        };
        aggregated
            .child_mut(ChildTable::Errors)
            .push(json!({"name": "smtp", "message": "timeout"}).as_object().unwrap().clone());

        let csv_row = aggregated.to_csv_row();

        assert_eq!(csv_row["id"], "4");
        assert_eq!(csv_row["form_id"], "9");
        assert_eq!(csv_row["fields"], "");
        assert!(csv_row["errors"].starts_with("base64:"));
    }
}
