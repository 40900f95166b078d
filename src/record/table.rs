use std::fmt;

use serde_json::{Map, Value};
use thiserror::Error;

use super::{ChildItem, ChildTable};

/// Default applied to an optional column the item does not carry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColumnDefault {
    Text(&'static str),
    Integer(i64),
}

impl ColumnDefault {
    fn to_value(self) -> Value {
        match self {
            ColumnDefault::Text(text) => Value::String(text.to_string()),
            ColumnDefault::Integer(number) => Value::from(number),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnSpec {
    pub name: &'static str,
    /// `None` marks a required column.
    pub default: Option<ColumnDefault>,
}

impl ColumnSpec {
    const fn required(name: &'static str) -> Self {
        Self {
            name,
            default: None,
        }
    }

    const fn text(name: &'static str, default: &'static str) -> Self {
        Self {
            name,
            default: Some(ColumnDefault::Text(default)),
        }
    }

    const fn integer(name: &'static str, default: i64) -> Self {
        Self {
            name,
            default: Some(ColumnDefault::Integer(default)),
        }
    }

    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }
}

/// A child item failed its table's required-column check.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{table} item is missing required column `{column}`")]
pub struct MissingColumn {
    pub table: ChildTable,
    pub column: &'static str,
}

/// A child item ready for insertion: exactly the table's columns, in table order.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedItem {
    pub table: ChildTable,
    pub values: Vec<(&'static str, Value)>,
}

impl PreparedItem {
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|(name, _)| *name == column)
            .map(|(_, value)| value)
    }

    /// The item in the shape an export row carries it.
    pub fn to_child_item(&self) -> ChildItem {
        self.values
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect()
    }
}

/// Schema knowledge for one child table.
#[derive(Debug, PartialEq)]
pub struct TableMapper {
    table: ChildTable,
    columns: &'static [ColumnSpec],
    key_columns: &'static [&'static str],
}

static FIELDS: TableMapper = TableMapper {
    table: ChildTable::Fields,
    columns: &[
        ColumnSpec::required("field_name"),
        ColumnSpec::text("field_value", ""),
        ColumnSpec::text("field_type", "text"),
        ColumnSpec::text("field_attrs", ""),
    ],
    key_columns: &["field_name"],
};

static ACTIONS: TableMapper = TableMapper {
    table: ChildTable::Actions,
    columns: &[
        ColumnSpec::required("action_slug"),
        ColumnSpec::integer("action_id", 0),
        ColumnSpec::text("on_event", "PROCESS"),
        ColumnSpec::text("status", ""),
    ],
    key_columns: &["action_slug", "action_id"],
};

static ERRORS: TableMapper = TableMapper {
    table: ChildTable::Errors,
    columns: &[ColumnSpec::text("name", ""), ColumnSpec::text("message", "")],
    key_columns: &["name", "message"],
};

/// Joins key parts; cannot occur in a form value typed by a person.
const KEY_SEPARATOR: char = '\u{1f}';

impl TableMapper {
    pub fn for_table(table: ChildTable) -> &'static TableMapper {
        match table {
            ChildTable::Fields => &FIELDS,
            ChildTable::Actions => &ACTIONS,
            ChildTable::Errors => &ERRORS,
        }
    }

    pub fn table(&self) -> ChildTable {
        self.table
    }

    pub fn columns(&self) -> &'static [ColumnSpec] {
        self.columns
    }

    /// Column names accepted for insertion, in order.
    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|column| column.name).collect()
    }

    pub fn default_for(&self, column: &str) -> Option<ColumnDefault> {
        self.columns
            .iter()
            .find(|spec| spec.name == column)
            .and_then(|spec| spec.default)
    }

    /// Returns the first required column the item lacks, if any.
    pub fn check_required(&self, item: &ChildItem) -> Result<(), MissingColumn> {
        match self
            .columns
            .iter()
            .find(|spec| spec.is_required() && present(item, spec.name).is_none())
        {
            Some(spec) => Err(MissingColumn {
                table: self.table,
                column: spec.name,
            }),
            None => Ok(()),
        }
    }

    /// Derives the item's uniqueness key.
    ///
    /// `None` when a required column is missing, when the item carries none of the key
    /// columns, or when the key comes out empty; such items carry no identity and are
    /// never inserted. Key columns set explicitly to `""` still count as carried.
    pub fn unique_key(&self, item: &ChildItem) -> Option<String> {
        if self.check_required(item).is_err() {
            return None;
        }

        if self
            .key_columns
            .iter()
            .all(|column| present(item, column).is_none())
        {
            return None;
        }

        let parts: Vec<String> = self
            .key_columns
            .iter()
            .map(|column| match present(item, column) {
                Some(value) => key_text(value),
                None => self
                    .default_for(column)
                    .map(|default| key_text(&default.to_value()))
                    .unwrap_or_default(),
            })
            .collect();

        let key = parts.join(&KEY_SEPARATOR.to_string());
        if key.is_empty() {
            return None;
        }

        Some(key)
    }

    /// Maps an item onto the table's columns, applying defaults.
    ///
    /// Keys the table does not know are dropped.
    pub fn prepare(&self, item: &ChildItem) -> Result<PreparedItem, MissingColumn> {
        self.check_required(item)?;

        let values = self
            .columns
            .iter()
            .map(|spec| {
                let value = match present(item, spec.name) {
                    Some(value) => column_value(value),
                    None => spec
                        .default
                        .map(ColumnDefault::to_value)
                        .unwrap_or(Value::Null),
                };
                (spec.name, value)
            })
            .collect();

        Ok(PreparedItem {
            table: self.table,
            values,
        })
    }
}

impl fmt::Display for TableMapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.table.table_name(), self.column_names().join(", "))
    }
}

/// A key holding `null` counts as absent.
fn present<'a>(item: &'a Map<String, Value>, column: &str) -> Option<&'a Value> {
    item.get(column).filter(|value| !value.is_null())
}

fn key_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Nested values are flattened to their JSON text to fit a scalar column.
fn column_value(value: &Value) -> Value {
    match value {
        Value::Array(_) | Value::Object(_) => Value::String(value.to_string()),
        other => other.clone(),
    }
}
