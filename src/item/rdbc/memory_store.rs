use std::cell::{Cell, RefCell};

use log::debug;

use crate::{
    error::TransferError,
    record::{
        AggregatedRow, ChildTable, SCALAR_COLUMNS, ScalarColumns, table::PreparedItem,
    },
};

use super::{RecordStore, StoreTransaction, TransactionWork, distinct_items};

#[derive(Debug, Clone, PartialEq)]
pub struct StoredParent {
    pub id: i64,
    pub scalars: ScalarColumns,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredChild {
    pub record_id: i64,
    pub item: PreparedItem,
}

#[derive(Debug, Clone, Default)]
struct Tables {
    last_id: i64,
    parents: Vec<StoredParent>,
    fields: Vec<StoredChild>,
    actions: Vec<StoredChild>,
    errors: Vec<StoredChild>,
}

impl Tables {
    fn children(&self, table: ChildTable) -> &Vec<StoredChild> {
        match table {
            ChildTable::Fields => &self.fields,
            ChildTable::Actions => &self.actions,
            ChildTable::Errors => &self.errors,
        }
    }

    fn children_mut(&mut self, table: ChildTable) -> &mut Vec<StoredChild> {
        match table {
            ChildTable::Fields => &mut self.fields,
            ChildTable::Actions => &mut self.actions,
            ChildTable::Errors => &mut self.errors,
        }
    }
}

/// A [`RecordStore`] keeping the four tables in memory.
///
/// A transaction works on the live tables and restores a snapshot taken at its start when
/// it rolls back. Identities are never reused, even after a rollback.
///
/// # Examples
///
/// ```
/// use submission_transfer::item::rdbc::{InMemoryRecordStore, RecordStore};
/// use submission_transfer::record::ScalarColumns;
///
/// let store = InMemoryRecordStore::new();
///
/// let mut scalars = ScalarColumns::new();
/// scalars.insert("form_id".to_string(), "3".to_string());
///
/// store
///     .transaction(&mut |tx| tx.insert_parent(&scalars).map(|_| ()))
///     .unwrap();
///
/// assert_eq!(store.parents().len(), 1);
/// assert_eq!(store.fetch_aggregated(&[3]).unwrap().len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    tables: RefCell<Tables>,
    failing_table: Cell<Option<ChildTable>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every insert into `table` fail with a storage error.
    pub fn fail_inserts_into(self, table: ChildTable) -> Self {
        self.failing_table.set(Some(table));
        self
    }

    /// Lets inserts into every table succeed again.
    pub fn heal(&self) {
        self.failing_table.set(None);
    }

    pub fn parents(&self) -> Vec<StoredParent> {
        self.tables.borrow().parents.clone()
    }

    pub fn children(&self, table: ChildTable) -> Vec<StoredChild> {
        self.tables.borrow().children(table).clone()
    }
}

impl RecordStore for InMemoryRecordStore {
    fn fetch_aggregated(&self, form_ids: &[i64]) -> Result<Vec<AggregatedRow>, TransferError> {
        let tables = self.tables.borrow();

        let rows = tables
            .parents
            .iter()
            .filter(|parent| {
                parent
                    .scalars
                    .get("form_id")
                    .and_then(|form_id| form_id.trim().parse::<i64>().ok())
                    .is_some_and(|form_id| form_ids.contains(&form_id))
            })
            .map(|parent| {
                let mut row = AggregatedRow {
                    id: parent.id,
                    scalars: parent.scalars.clone(),
                    ..Default::default()
                };
                for table in ChildTable::ALL {
                    let items = tables
                        .children(table)
                        .iter()
                        .filter(|child| child.record_id == parent.id)
                        .map(|child| child.item.to_child_item());
                    *row.child_mut(table) = distinct_items(items);
                }
                row
            })
            .collect();

        Ok(rows)
    }

    fn transaction(&self, work: &mut TransactionWork<'_>) -> Result<(), TransferError> {
        let mut tables = self.tables.borrow_mut();
        let snapshot = tables.clone();

        let result = {
            let mut tx = MemoryTransaction {
                tables: &mut *tables,
                failing_table: self.failing_table.get(),
            };
            work(&mut tx)
        };

        if result.is_err() {
            let last_id = tables.last_id;
            *tables = Tables {
                last_id,
                ..snapshot
            };
            debug!("In-memory transaction rolled back");
        }

        result
    }
}

struct MemoryTransaction<'t> {
    tables: &'t mut Tables,
    failing_table: Option<ChildTable>,
}

impl StoreTransaction for MemoryTransaction<'_> {
    fn insert_parent(&mut self, scalars: &ScalarColumns) -> Result<i64, TransferError> {
        if let Some(column) = scalars
            .keys()
            .find(|column| !SCALAR_COLUMNS.contains(&column.as_str()))
        {
            return Err(TransferError::InvalidColumn(column.clone()));
        }

        self.tables.last_id += 1;
        let id = self.tables.last_id;
        self.tables.parents.push(StoredParent {
            id,
            scalars: scalars.clone(),
        });
        Ok(id)
    }

    fn insert_child(
        &mut self,
        table: ChildTable,
        parent_id: i64,
        item: &PreparedItem,
    ) -> Result<(), TransferError> {
        if self.failing_table == Some(table) {
            return Err(TransferError::Storage(format!(
                "insert into {} refused",
                table.table_name()
            )));
        }
        if !self.tables.parents.iter().any(|parent| parent.id == parent_id) {
            return Err(TransferError::Storage(format!(
                "{} row references missing record {}",
                table.table_name(),
                parent_id
            )));
        }

        self.tables.children_mut(table).push(StoredChild {
            record_id: parent_id,
            item: item.clone(),
        });
        Ok(())
    }
}
