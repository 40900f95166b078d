use std::future::Future;

use log::{debug, error};
use serde_json::Value;
use sqlx::{
    Pool, QueryBuilder, Row, Sqlite, Transaction, query_builder::Separated, sqlite::SqliteRow,
};

use crate::{
    error::TransferError,
    record::{
        AggregatedRow, ChildItem, ChildTable, SCALAR_COLUMNS, ScalarColumns,
        table::{PreparedItem, TableMapper},
    },
};

use super::{RecordStore, StoreTransaction, TransactionWork, distinct_items};

/// Creates the parent table and the three child tables.
///
/// Scalar columns are `TEXT` so a value goes back out exactly as it came in.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    form_id TEXT,
    user_id TEXT,
    from_content_id TEXT,
    from_content_type TEXT,
    status TEXT,
    ip_address TEXT,
    user_agent TEXT,
    referrer TEXT,
    submit_type TEXT,
    is_viewed TEXT,
    created_at TEXT,
    updated_at TEXT
);
CREATE TABLE IF NOT EXISTS records_fields (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    record_id INTEGER NOT NULL REFERENCES records(id),
    field_name TEXT NOT NULL,
    field_value TEXT,
    field_type TEXT,
    field_attrs TEXT
);
CREATE TABLE IF NOT EXISTS records_actions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    record_id INTEGER NOT NULL REFERENCES records(id),
    action_slug TEXT NOT NULL,
    action_id INTEGER,
    on_event TEXT,
    status TEXT
);
CREATE TABLE IF NOT EXISTS records_errors (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    record_id INTEGER NOT NULL REFERENCES records(id),
    name TEXT,
    message TEXT
);
"#;

/// Runs an async sqlx call from the synchronous store API.
///
/// Needs a multi-threaded tokio runtime.
fn block_on<F: Future>(future: F) -> F::Output {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}

/// A [`RecordStore`] backed by a SQLite pool.
///
/// # Examples
///
/// ```no_run
/// use submission_transfer::item::rdbc::{RecordStore, SqliteRecordStore};
/// use sqlx::SqlitePool;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = SqlitePool::connect("sqlite://submissions.db").await?;
///
/// let store = SqliteRecordStore::new(&pool);
/// store.create_schema()?;
///
/// let rows = store.fetch_aggregated(&[3, 4])?;
/// # Ok(())
/// # }
/// ```
pub struct SqliteRecordStore<'a> {
    pool: &'a Pool<Sqlite>,
}

impl<'a> SqliteRecordStore<'a> {
    pub fn new(pool: &'a Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Creates the four tables when they do not exist yet.
    pub fn create_schema(&self) -> Result<(), TransferError> {
        block_on(sqlx::raw_sql(SCHEMA).execute(self.pool))?;
        Ok(())
    }

    fn child_items(json: Option<String>, table: ChildTable) -> Vec<ChildItem> {
        let Some(json) = json else {
            return Vec::new();
        };
        match serde_json::from_str::<Vec<ChildItem>>(&json) {
            Ok(items) => distinct_items(items),
            Err(e) => {
                error!("Cannot read aggregated {} collection: {}", table, e);
                Vec::new()
            }
        }
    }

    fn map_row(row: &SqliteRow) -> Result<AggregatedRow, TransferError> {
        let mut scalars = ScalarColumns::new();
        for column in SCALAR_COLUMNS {
            if let Some(value) = row.try_get::<Option<String>, _>(column)? {
                scalars.insert(column.to_string(), value);
            }
        }

        let mut aggregated = AggregatedRow {
            id: row.try_get("id")?,
            scalars,
            ..Default::default()
        };
        for table in ChildTable::ALL {
            let json = row.try_get::<Option<String>, _>(table.column())?;
            *aggregated.child_mut(table) = Self::child_items(json, table);
        }
        Ok(aggregated)
    }
}

/// Correlated subquery assembling one child table into a JSON array.
fn push_child_array(query_builder: &mut QueryBuilder<'_, Sqlite>, table: ChildTable) {
    let pairs = TableMapper::for_table(table)
        .column_names()
        .iter()
        .map(|column| format!("'{column}', c.{column}"))
        .collect::<Vec<_>>()
        .join(", ");

    query_builder.push(format!(
        ", (SELECT json_group_array(json_object({pairs})) FROM {} c WHERE c.record_id = r.id) AS {}",
        table.table_name(),
        table.column()
    ));
}

impl RecordStore for SqliteRecordStore<'_> {
    fn fetch_aggregated(&self, form_ids: &[i64]) -> Result<Vec<AggregatedRow>, TransferError> {
        if form_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query_builder = QueryBuilder::<Sqlite>::new("SELECT r.id AS id");
        for column in SCALAR_COLUMNS {
            query_builder.push(format!(", r.{column} AS {column}"));
        }
        for table in ChildTable::ALL {
            push_child_array(&mut query_builder, table);
        }
        query_builder.push(" FROM records r WHERE CAST(r.form_id AS INTEGER) IN (");
        let mut separated = query_builder.separated(", ");
        for form_id in form_ids {
            separated.push_bind(*form_id);
        }
        separated.push_unseparated(") ORDER BY r.id");

        let query = query_builder.build();
        let rows = block_on(query.fetch_all(self.pool))?;

        debug!("Fetched {} records for forms {:?}", rows.len(), form_ids);

        rows.iter().map(Self::map_row).collect()
    }

    fn transaction(&self, work: &mut TransactionWork<'_>) -> Result<(), TransferError> {
        let tx = block_on(self.pool.begin())?;
        let mut store_tx = SqliteTransaction { tx };

        let result = work(&mut store_tx);

        match result {
            Ok(()) => {
                block_on(store_tx.tx.commit())?;
                Ok(())
            }
            Err(e) => {
                if let Err(rollback_error) = block_on(store_tx.tx.rollback()) {
                    error!("Failed to roll back SQLite transaction: {}", rollback_error);
                }
                Err(e)
            }
        }
    }
}

struct SqliteTransaction {
    tx: Transaction<'static, Sqlite>,
}

fn bind_value(builder: &mut Separated<'_, '_, Sqlite, &'static str>, value: &Value) {
    match value {
        Value::Null => {
            builder.push_bind(None::<String>);
        }
        Value::Bool(flag) => {
            builder.push_bind(*flag);
        }
        Value::Number(number) => match number.as_i64() {
            Some(integer) => {
                builder.push_bind(integer);
            }
            None => {
                builder.push_bind(number.as_f64());
            }
        },
        Value::String(text) => {
            builder.push_bind(text.clone());
        }
        nested => {
            builder.push_bind(nested.to_string());
        }
    }
}

impl StoreTransaction for SqliteTransaction {
    fn insert_parent(&mut self, scalars: &ScalarColumns) -> Result<i64, TransferError> {
        if let Some(column) = scalars
            .keys()
            .find(|column| !SCALAR_COLUMNS.contains(&column.as_str()))
        {
            return Err(TransferError::InvalidColumn(column.clone()));
        }

        let mut query_builder = QueryBuilder::<Sqlite>::new("INSERT INTO records");
        if scalars.is_empty() {
            query_builder.push(" DEFAULT VALUES");
        } else {
            query_builder.push(" (");
            query_builder.push(scalars.keys().cloned().collect::<Vec<_>>().join(","));
            query_builder.push(") ");
            query_builder.push_values(std::iter::once(scalars), |mut b, scalars| {
                for value in scalars.values() {
                    b.push_bind(value.clone());
                }
            });
        }

        let query = query_builder.build();
        let result = block_on(query.execute(&mut *self.tx)).map_err(|e| {
            error!("Failed to insert parent record: {}", e);
            TransferError::from(e)
        })?;

        Ok(result.last_insert_rowid())
    }

    fn insert_child(
        &mut self,
        table: ChildTable,
        parent_id: i64,
        item: &PreparedItem,
    ) -> Result<(), TransferError> {
        let mut query_builder = QueryBuilder::<Sqlite>::new("INSERT INTO ");
        query_builder.push(table.table_name());
        query_builder.push(" (record_id");
        for (column, _) in &item.values {
            query_builder.push(",");
            query_builder.push(*column);
        }
        query_builder.push(") ");
        query_builder.push_values(std::iter::once(item), |mut b, item| {
            b.push_bind(parent_id);
            for (_, value) in &item.values {
                bind_value(&mut b, value);
            }
        });

        let query = query_builder.build();
        block_on(query.execute(&mut *self.tx)).map_err(|e| {
            error!("Failed to insert into {}: {}", table.table_name(), e);
            TransferError::from(e)
        })?;

        Ok(())
    }
}
