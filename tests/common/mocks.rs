//! Mock version of a store transaction
use std::cell::{Cell, RefCell};

use mockall::mock;

use submission_transfer::{
    error::TransferError,
    item::rdbc::{RecordStore, StoreTransaction, TransactionWork},
    record::{AggregatedRow, ChildTable, ScalarColumns, table::PreparedItem},
};

mock! {
    pub Transaction {}
    impl StoreTransaction for Transaction {
        fn insert_parent(&mut self, scalars: &ScalarColumns) -> Result<i64, TransferError>;
        fn insert_child(
            &mut self,
            table: ChildTable,
            parent_id: i64,
            item: &PreparedItem,
        ) -> Result<(), TransferError>;
    }
}

/// Store handing the same mocked transaction to every unit of work.
pub struct MockedStore {
    pub tx: RefCell<MockTransaction>,
    pub commits: Cell<usize>,
    pub rollbacks: Cell<usize>,
}

impl MockedStore {
    pub fn new(tx: MockTransaction) -> Self {
        Self {
            tx: RefCell::new(tx),
            commits: Cell::new(0),
            rollbacks: Cell::new(0),
        }
    }
}

impl RecordStore for MockedStore {
    fn fetch_aggregated(&self, _form_ids: &[i64]) -> Result<Vec<AggregatedRow>, TransferError> {
        Ok(Vec::new())
    }

    fn transaction(&self, work: &mut TransactionWork<'_>) -> Result<(), TransferError> {
        let result = work(&mut *self.tx.borrow_mut());
        match result {
            Ok(()) => self.commits.set(self.commits.get() + 1),
            Err(_) => self.rollbacks.set(self.rollbacks.get() + 1),
        }
        result
    }
}
