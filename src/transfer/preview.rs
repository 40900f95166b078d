use std::io::Read;

use serde::Serialize;

use crate::{
    core::item::ItemReader,
    error::TransferError,
    item::csv::csv_reader::CsvRowReaderBuilder,
    record::{ChildTable, Record, prepare_children},
};

use super::import::validate_headers;

/// What one data row would import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordPreview {
    pub position: usize,
    pub form_id: Option<String>,
    pub fields: usize,
    pub actions: usize,
    pub errors: usize,
}

/// Summary of an import source, computed without touching a store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportPreview {
    pub record_count: usize,
    /// Distinct `form_id` values, in first-seen order.
    pub form_ids: Vec<String>,
    pub records: Vec<RecordPreview>,
}

/// Parses an import source the way [`RecordImporter`](super::RecordImporter) would.
///
/// Child counts are those left after normalization, deduplication and the required-column
/// check.
///
/// # Errors
///
/// Fails on an unreadable source, missing headers, or a malformed CSV line.
pub fn preview_csv<R: Read>(source: R) -> Result<ImportPreview, TransferError> {
    let reader = CsvRowReaderBuilder::new().from_reader(source)?;
    validate_headers(reader.headers())?;

    let mut preview = ImportPreview::default();
    while let Some(row) = reader.read()? {
        let record = Record::from_row(&row);
        let count = |table: ChildTable| prepare_children(table, record.child(table)).items.len();

        let form_id = record.scalars.get("form_id").cloned();
        if let Some(form_id) = &form_id {
            if !preview.form_ids.contains(form_id) {
                preview.form_ids.push(form_id.clone());
            }
        }

        preview.record_count += 1;
        preview.records.push(RecordPreview {
            position: preview.record_count,
            form_id,
            fields: count(ChildTable::Fields),
            actions: count(ChildTable::Actions),
            errors: count(ChildTable::Errors),
        });
    }

    Ok(preview)
}
