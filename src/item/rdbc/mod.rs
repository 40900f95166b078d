use std::collections::HashSet;

use serde_json::Value;

use crate::{
    error::TransferError,
    record::{AggregatedRow, ChildItem, ChildTable, ScalarColumns, table::PreparedItem},
};

/// This module contains the in-memory record store.
pub mod memory_store;

/// This module contains the SQLite record store.
#[cfg(feature = "rdbc-sqlite")]
pub mod sqlite_store;

/// Work executed inside one store transaction.
pub type TransactionWork<'w> =
    dyn FnMut(&mut dyn StoreTransaction) -> Result<(), TransferError> + 'w;

/// Storage collaborator holding the four-table relational layout.
///
/// Any relational engine can sit behind this trait. The importer and exporter only ever
/// call these two operations.
///
/// # Concurrency
///
/// Nothing here serializes two imports running against the same store; doing so can
/// duplicate parent records. Deployments that need it must lock per batch or per parent
/// inside their implementation.
pub trait RecordStore {
    /// Returns one aggregated row per parent record whose `form_id` is in `form_ids`.
    ///
    /// Child collections come back already assembled as item maps. Their order is not
    /// guaranteed.
    fn fetch_aggregated(&self, form_ids: &[i64]) -> Result<Vec<AggregatedRow>, TransferError>;

    /// Runs `work` inside a transaction.
    ///
    /// Commits when `work` returns `Ok`, rolls back and returns the error otherwise.
    fn transaction(&self, work: &mut TransactionWork<'_>) -> Result<(), TransferError>;
}

/// Write operations available inside a [`RecordStore::transaction`].
pub trait StoreTransaction {
    /// Inserts a parent row and returns its generated identity.
    fn insert_parent(&mut self, scalars: &ScalarColumns) -> Result<i64, TransferError>;

    /// Inserts one child row attached to `parent_id`.
    fn insert_child(
        &mut self,
        table: ChildTable,
        parent_id: i64,
        item: &PreparedItem,
    ) -> Result<(), TransferError>;
}

/// Collapses identical child rows, as `SELECT DISTINCT` would.
pub(crate) fn distinct_items(items: impl IntoIterator<Item = ChildItem>) -> Vec<ChildItem> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(Value::Object(item.clone()).to_string()))
        .collect()
}

// Re-export the store types for convenience
pub use memory_store::InMemoryRecordStore;
#[cfg(feature = "rdbc-sqlite")]
pub use sqlite_store::SqliteRecordStore;
