use std::io::Write;

use chrono::NaiveDate;
use log::info;

use crate::{
    core::item::ItemWriter,
    error::TransferError,
    item::{csv::csv_writer::CsvRowWriterBuilder, rdbc::RecordStore},
    record::EXPORT_HEADERS,
};

/// File name offered for an export taken on `date`.
///
/// ```
/// use chrono::NaiveDate;
/// use submission_transfer::transfer::export_file_name;
///
/// let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
/// assert_eq!(export_file_name(date), "submissions-2024-03-09.csv");
/// ```
pub fn export_file_name(date: NaiveDate) -> String {
    format!("submissions-{}.csv", date.format("%Y-%m-%d"))
}

/// Reads aggregated records from a [`RecordStore`] and writes them as CSV.
pub struct RecordExporter<'a> {
    store: &'a dyn RecordStore,
    headers: Vec<String>,
}

impl RecordExporter<'_> {
    /// Writes every record of the given forms to `out` and hands `out` back.
    ///
    /// Returns [`TransferError::NoRecords`] without writing anything when no record
    /// matches.
    pub fn export<W: Write>(&self, form_ids: &[i64], out: W) -> Result<W, TransferError> {
        let rows = self.store.fetch_aggregated(form_ids)?;
        if rows.is_empty() {
            info!("No records to export for forms {:?}", form_ids);
            return Err(TransferError::NoRecords);
        }

        let writer = CsvRowWriterBuilder::new()
            .headers(self.headers.clone())
            .from_writer(out);

        writer.open()?;
        for row in &rows {
            writer.write(&row.to_csv_row())?;
        }
        writer.flush()?;
        writer.close()?;

        info!("Exported {} records for forms {:?}", rows.len(), form_ids);

        writer.into_inner()
    }

    /// Same as [`RecordExporter::export`], collecting the bytes.
    pub fn export_to_vec(&self, form_ids: &[i64]) -> Result<Vec<u8>, TransferError> {
        self.export(form_ids, Vec::new())
    }
}

pub struct RecordExporterBuilder<'a> {
    store: &'a dyn RecordStore,
    headers: Vec<String>,
}

impl<'a> RecordExporterBuilder<'a> {
    pub fn new(store: &'a dyn RecordStore) -> Self {
        Self {
            store,
            headers: EXPORT_HEADERS.iter().map(|h| h.to_string()).collect(),
        }
    }

    pub fn headers(mut self, headers: Vec<String>) -> Self {
        self.headers = headers;
        self
    }

    pub fn build(self) -> RecordExporter<'a> {
        RecordExporter {
            store: self.store,
            headers: self.headers,
        }
    }
}
