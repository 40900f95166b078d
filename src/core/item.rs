use std::{cell::RefCell, collections::VecDeque};

use crate::error::TransferError;

/// Result of a single read: `Ok(None)` once the source is exhausted.
pub type ItemReaderResult<I> = Result<Option<I>, TransferError>;

/// Result of turning one read item into one writable item.
pub type ItemProcessorResult<O> = Result<O, TransferError>;

/// Result of writing one item.
pub type ItemWriterResult = Result<(), TransferError>;

/// Source of items, read one at a time.
pub trait ItemReader<I> {
    /// Reads the next item, or `Ok(None)` when there is nothing left.
    fn read(&self) -> ItemReaderResult<I>;
}

/// Business logic applied to each item between reading and writing.
pub trait ItemProcessor<I, O> {
    fn process(&self, item: &I) -> ItemProcessorResult<O>;
}

/// Sink of items.
///
/// Every call to [`ItemWriter::write`] is independent: a failure for one item is
/// attributed to that item only and never undoes items written before it.
pub trait ItemWriter<O> {
    fn write(&self, item: &O) -> ItemWriterResult;

    fn flush(&self) -> ItemWriterResult {
        Ok(())
    }

    fn open(&self) -> ItemWriterResult {
        Ok(())
    }

    fn close(&self) -> ItemWriterResult {
        Ok(())
    }
}

/// Processor handing every item through unchanged.
#[derive(Default)]
pub struct PassThroughProcessor;

impl<I: Clone> ItemProcessor<I, I> for PassThroughProcessor {
    fn process(&self, item: &I) -> ItemProcessorResult<I> {
        Ok(item.clone())
    }
}

/// Reader over items that are already in memory, such as a pre-parsed CSV table.
pub struct VecItemReader<I> {
    items: RefCell<VecDeque<I>>,
}

impl<I> VecItemReader<I> {
    pub fn new(items: Vec<I>) -> Self {
        Self {
            items: RefCell::new(items.into()),
        }
    }
}

impl<I> ItemReader<I> for VecItemReader<I> {
    fn read(&self) -> ItemReaderResult<I> {
        Ok(self.items.borrow_mut().pop_front())
    }
}
