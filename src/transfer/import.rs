use std::{cell::RefCell, io::Read};

use log::{debug, error, info, warn};

use crate::{
    core::{
        item::{
            ItemProcessor, ItemProcessorResult, ItemWriter, ItemWriterResult, VecItemReader,
        },
        step::{StepBuilder, StepResult},
    },
    error::TransferError,
    item::{
        csv::{CsvRow, CsvTable, csv_reader::CsvRowReaderBuilder},
        rdbc::RecordStore,
    },
    record::{ChildTable, REQUIRED_HEADERS, Record, clean_column_name, clean_scalars, prepare_children},
};

/// Turns each CSV row into a [`Record`]. Never fails: corrupt child cells decode to nothing.
#[derive(Default)]
pub struct RecordRowProcessor;

impl ItemProcessor<CsvRow, Record> for RecordRowProcessor {
    fn process(&self, item: &CsvRow) -> ItemProcessorResult<Record> {
        Ok(Record::from_row(item))
    }
}

/// Checks that every required import header is present.
///
/// Header names are compared after byte-order-mark cleanup. The error lists the missing
/// headers in canonical order.
///
/// # Examples
///
/// ```
/// use submission_transfer::transfer::validate_headers;
///
/// let headers: Vec<String> = ["form_id", "user_id"].iter().map(|h| h.to_string()).collect();
///
/// let err = validate_headers(&headers).unwrap_err();
/// assert!(err.to_string().starts_with("Invalid CSV format. Missing headers: from_content_id"));
/// ```
pub fn validate_headers(headers: &[String]) -> Result<(), TransferError> {
    let missing: Vec<String> = REQUIRED_HEADERS
        .iter()
        .filter(|required| {
            !headers
                .iter()
                .any(|header| clean_column_name(header) == **required)
        })
        .map(|required| required.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        error!("Import rejected, missing headers: {}", missing.join(", "));
        Err(TransferError::MissingHeaders(missing))
    }
}

/// What happens to a record when one of its child rows cannot be inserted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChildFailurePolicy {
    /// The whole record is rolled back and reported as failed.
    #[default]
    Rollback,
    /// The child row is logged and left out; the record still commits.
    Skip,
}

/// Outcome of one data row of an import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordOutcome {
    /// 1-based position of the data row in the source.
    pub position: usize,
    /// Identity assigned by the store, or the reason the record was not written.
    pub result: Result<i64, String>,
}

/// Result of a batch import.
#[derive(Debug)]
pub struct ImportReport {
    pub step: StepResult,
    /// Identities of the committed records, in source order.
    pub record_ids: Vec<i64>,
}

impl ImportReport {
    pub fn imported_count(&self) -> usize {
        self.record_ids.len()
    }

    pub fn failed_count(&self) -> usize {
        self.step.failures.len()
    }

    pub fn is_complete_success(&self) -> bool {
        self.step.is_complete_success()
    }

    /// Per-row outcomes for every row the import reached, in source order.
    pub fn outcomes(&self) -> Vec<RecordOutcome> {
        let reached = self.step.read_count + self.step.read_error_count;
        let mut record_ids = self.record_ids.iter();

        (1..=reached)
            .filter_map(|position| {
                let failure = self
                    .step
                    .failures
                    .iter()
                    .find(|failure| failure.position == position);
                match failure {
                    Some(failure) => Some(RecordOutcome {
                        position,
                        result: Err(failure.reason.clone()),
                    }),
                    None => record_ids.next().map(|id| RecordOutcome {
                        position,
                        result: Ok(*id),
                    }),
                }
            })
            .collect()
    }
}

/// Writes records into a [`RecordStore`], one transaction per record.
///
/// # Examples
///
/// ```
/// use submission_transfer::item::rdbc::InMemoryRecordStore;
/// use submission_transfer::transfer::RecordImporterBuilder;
///
/// let csv = "form_id,user_id,from_content_id,from_content_type,status,ip_address,user_agent,\
/// referrer,submit_type,is_viewed,created_at,updated_at,fields,actions,errors\n\
/// 3,1,,,success,,,,,0,,,,,\n";
///
/// let store = InMemoryRecordStore::new();
/// let importer = RecordImporterBuilder::new(&store).build();
///
/// let report = importer.import_csv(csv.as_bytes()).unwrap();
///
/// assert!(report.is_complete_success());
/// assert_eq!(report.imported_count(), 1);
/// assert_eq!(store.parents()[0].scalars["status"], "success");
/// ```
pub struct RecordImporter<'a> {
    store: &'a dyn RecordStore,
    child_failure: ChildFailurePolicy,
    skip_limit: usize,
    record_ids: RefCell<Vec<i64>>,
}

impl RecordImporter<'_> {
    /// Writes one record: parent row first, then its fields, actions and errors.
    ///
    /// Returns the identity the store assigned to the parent row. On error nothing of the
    /// record remains in the store.
    pub fn import_record(&self, record: &Record) -> Result<i64, TransferError> {
        let scalars = clean_scalars(&record.scalars);
        let mut record_id = 0;

        let result = self.store.transaction(&mut |tx| {
            record_id = tx.insert_parent(&scalars)?;
            debug!("Inserted parent record {}", record_id);

            for table in ChildTable::ALL {
                let prepared = prepare_children(table, record.child(table));
                for item in &prepared.items {
                    match tx.insert_child(table, record_id, item) {
                        Ok(()) => {}
                        Err(e) if self.child_failure == ChildFailurePolicy::Skip => {
                            warn!("Skipping {} item of record {}: {}", table, record_id, e);
                        }
                        Err(e) => return Err(e),
                    }
                }
            }
            Ok(())
        });

        match result {
            Ok(()) => Ok(record_id),
            Err(e) => {
                error!("Record rolled back: {}", e);
                Err(e)
            }
        }
    }

    /// Imports every data row of a CSV source.
    ///
    /// Fails without writing anything when the source cannot be read or lacks a required
    /// header. Once rows are being processed, failures are reported per record.
    pub fn import_csv<R: Read>(&self, source: R) -> Result<ImportReport, TransferError> {
        let reader = CsvRowReaderBuilder::new().from_reader(source)?;
        validate_headers(reader.headers())?;

        let processor = RecordRowProcessor;
        let step = StepBuilder::new(&reader, &processor, self)
            .skip_limit(self.skip_limit)
            .build();

        self.run(step.execute())
    }

    /// Imports rows that were already parsed.
    pub fn import_table(&self, table: &CsvTable) -> Result<ImportReport, TransferError> {
        validate_headers(&table.headers)?;

        let reader = VecItemReader::new(table.rows.clone());
        let processor = RecordRowProcessor;
        let step = StepBuilder::new(&reader, &processor, self)
            .skip_limit(self.skip_limit)
            .build();

        self.run(step.execute())
    }

    fn run(
        &self,
        execution: Result<StepResult, TransferError>,
    ) -> Result<ImportReport, TransferError> {
        let record_ids = self.record_ids.take();
        let step = execution?;

        info!(
            "Imported {} records, {} failed",
            record_ids.len(),
            step.failures.len()
        );

        Ok(ImportReport { step, record_ids })
    }
}

impl ItemWriter<Record> for RecordImporter<'_> {
    fn write(&self, item: &Record) -> ItemWriterResult {
        let record_id = self.import_record(item)?;
        self.record_ids.borrow_mut().push(record_id);
        Ok(())
    }
}

pub struct RecordImporterBuilder<'a> {
    store: &'a dyn RecordStore,
    child_failure: ChildFailurePolicy,
    skip_limit: usize,
}

impl<'a> RecordImporterBuilder<'a> {
    pub fn new(store: &'a dyn RecordStore) -> Self {
        Self {
            store,
            child_failure: ChildFailurePolicy::default(),
            skip_limit: usize::MAX,
        }
    }

    pub fn child_failure(mut self, policy: ChildFailurePolicy) -> Self {
        self.child_failure = policy;
        self
    }

    /// Number of failed records tolerated before the batch stops. Unlimited by default.
    pub fn skip_limit(mut self, skip_limit: usize) -> Self {
        self.skip_limit = skip_limit;
        self
    }

    pub fn build(self) -> RecordImporter<'a> {
        RecordImporter {
            store: self.store,
            child_failure: self.child_failure,
            skip_limit: self.skip_limit,
            record_ids: RefCell::new(Vec::new()),
        }
    }
}
