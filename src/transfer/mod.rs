//! Import and export orchestration.
//!
//! [`import::RecordImporter`] writes CSV rows into a [`RecordStore`](crate::item::rdbc::RecordStore),
//! one transaction per record. [`export::RecordExporter`] reads aggregated rows back out into
//! a CSV byte stream. [`preview::preview_csv`] parses an import source without writing it.

/// CSV to store.
pub mod import;

/// Store to CSV.
pub mod export;

/// Dry run of an import.
pub mod preview;

pub use export::{RecordExporter, RecordExporterBuilder, export_file_name};
pub use import::{
    ChildFailurePolicy, ImportReport, RecordImporter, RecordImporterBuilder, RecordOutcome,
    validate_headers,
};
pub use preview::{ImportPreview, RecordPreview, preview_csv};
