use std::{
    cell::{Cell, RefCell},
    fmt,
    time::{Duration, Instant},
};

use log::{debug, error, info, warn};

use crate::error::TransferError;

use super::{
    build_name,
    item::{ItemProcessor, ItemReader, ItemWriter},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    /// Every item was read; individual items may still have failed.
    Success,
    /// The skip limit was exceeded and the step stopped early.
    Error,
}

/// The phase in which an item failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePhase {
    Read,
    Process,
    Write,
}

impl fmt::Display for FailurePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phase = match self {
            FailurePhase::Read => "read",
            FailurePhase::Process => "process",
            FailurePhase::Write => "write",
        };
        f.write_str(phase)
    }
}

/// One failed item, tied to its 1-based position in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    pub position: usize,
    pub phase: FailurePhase,
    pub reason: String,
}

#[derive(Debug)]
pub struct StepResult {
    pub name: String,
    pub start: Instant,
    pub end: Instant,
    pub duration: Duration,
    pub status: StepStatus,
    pub read_count: usize,
    pub write_count: usize,
    pub read_error_count: usize,
    pub process_error_count: usize,
    pub write_error_count: usize,
    pub failures: Vec<ItemFailure>,
}

impl StepResult {
    /// `true` when the step ran to the end and no item failed.
    pub fn is_complete_success(&self) -> bool {
        self.status == StepStatus::Success && self.failures.is_empty()
    }

    /// Positions of the failed items, in source order.
    pub fn failed_positions(&self) -> Vec<usize> {
        self.failures.iter().map(|failure| failure.position).collect()
    }
}

/// Drives every item from a reader through a processor into a writer, one item at a time.
///
/// A failure at any phase is recorded against the item's position and the step moves on
/// to the next item, until more than `skip_limit` items have failed.
pub struct Step<'a, R, W> {
    name: String,
    reader: &'a dyn ItemReader<R>,
    processor: &'a dyn ItemProcessor<R, W>,
    writer: &'a dyn ItemWriter<W>,
    skip_limit: usize,
    read_count: Cell<usize>,
    write_count: Cell<usize>,
    read_error_count: Cell<usize>,
    process_error_count: Cell<usize>,
    write_error_count: Cell<usize>,
    failures: RefCell<Vec<ItemFailure>>,
}

impl<R, W> Step<'_, R, W> {
    /// Runs the step.
    ///
    /// Only failures to open, flush or close the writer abort the step with an error;
    /// everything else is reported through [`StepResult`].
    pub fn execute(&self) -> Result<StepResult, TransferError> {
        let start = Instant::now();

        info!("Start of step: {}", self.name);

        self.writer.open()?;

        let mut position = 0;
        let status = loop {
            position += 1;

            match self.reader.read() {
                Ok(Some(item)) => {
                    self.read_count.set(self.read_count.get() + 1);
                    self.handle_item(position, &item);
                }
                Ok(None) => {
                    debug!("All items of step {} have been read", self.name);
                    break StepStatus::Success;
                }
                Err(err) => {
                    self.read_error_count.set(self.read_error_count.get() + 1);
                    self.record_failure(position, FailurePhase::Read, err);
                }
            }

            if self.is_skip_limit_reached() {
                error!(
                    "Skip limit of {} reached in step {}, stopping",
                    self.skip_limit, self.name
                );
                break StepStatus::Error;
            }
        };

        self.writer.flush()?;
        self.writer.close()?;

        info!(
            "End of step: {}, read: {}, written: {}, failed: {}",
            self.name,
            self.read_count.get(),
            self.write_count.get(),
            self.failures.borrow().len()
        );

        Ok(StepResult {
            name: self.name.clone(),
            start,
            end: Instant::now(),
            duration: start.elapsed(),
            status,
            read_count: self.read_count.get(),
            write_count: self.write_count.get(),
            read_error_count: self.read_error_count.get(),
            process_error_count: self.process_error_count.get(),
            write_error_count: self.write_error_count.get(),
            failures: self.failures.borrow().clone(),
        })
    }

    fn handle_item(&self, position: usize, item: &R) {
        let processed = match self.processor.process(item) {
            Ok(processed) => processed,
            Err(err) => {
                self.process_error_count
                    .set(self.process_error_count.get() + 1);
                self.record_failure(position, FailurePhase::Process, err);
                return;
            }
        };

        match self.writer.write(&processed) {
            Ok(()) => self.write_count.set(self.write_count.get() + 1),
            Err(err) => {
                self.write_error_count.set(self.write_error_count.get() + 1);
                self.record_failure(position, FailurePhase::Write, err);
            }
        }
    }

    fn record_failure(&self, position: usize, phase: FailurePhase, err: TransferError) {
        warn!("Item {} failed during {}: {}", position, phase, err);
        self.failures.borrow_mut().push(ItemFailure {
            position,
            phase,
            reason: err.to_string(),
        });
    }

    fn is_skip_limit_reached(&self) -> bool {
        self.failures.borrow().len() > self.skip_limit
    }
}

pub struct StepBuilder<'a, R, W> {
    name: Option<String>,
    reader: &'a dyn ItemReader<R>,
    processor: &'a dyn ItemProcessor<R, W>,
    writer: &'a dyn ItemWriter<W>,
    skip_limit: usize,
}

impl<'a, R, W> StepBuilder<'a, R, W> {
    pub fn new(
        reader: &'a dyn ItemReader<R>,
        processor: &'a dyn ItemProcessor<R, W>,
        writer: &'a dyn ItemWriter<W>,
    ) -> StepBuilder<'a, R, W> {
        Self {
            name: None,
            reader,
            processor,
            writer,
            skip_limit: usize::MAX,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> StepBuilder<'a, R, W> {
        self.name = Some(name.into());
        self
    }

    /// Number of failed items tolerated before the step stops. Unlimited by default.
    pub fn skip_limit(mut self, skip_limit: usize) -> StepBuilder<'a, R, W> {
        self.skip_limit = skip_limit;
        self
    }

    pub fn build(self) -> Step<'a, R, W> {
        Step {
            name: self.name.unwrap_or_else(build_name),
            reader: self.reader,
            processor: self.processor,
            writer: self.writer,
            skip_limit: self.skip_limit,
            read_count: Cell::new(0),
            write_count: Cell::new(0),
            read_error_count: Cell::new(0),
            process_error_count: Cell::new(0),
            write_error_count: Cell::new(0),
            failures: RefCell::new(Vec::new()),
        }
    }
}
