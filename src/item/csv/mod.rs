//! CSV transport for submission records.
//!
//! Rows travel as column-name-keyed maps ([`CsvRow`]). The reader takes its column names
//! from the first line, tolerates a leading UTF-8 byte-order mark and pads short rows with
//! empty values. The writer emits a byte-order mark (so spreadsheet tools pick UTF-8),
//! then the header row, then one line per row, quoting fields only where CSV requires it.
//!
//! # Examples
//!
//! ```
//! use submission_transfer::item::csv::{read_rows, write_rows, CsvRow};
//!
//! let mut row = CsvRow::new();
//! row.insert("form_id".to_string(), "3".to_string());
//! row.insert("status".to_string(), "said \"hi\", left".to_string());
//!
//! let headers = vec!["form_id".to_string(), "status".to_string()];
//! let bytes = write_rows(Vec::new(), &headers, &[row.clone()]).unwrap();
//!
//! assert!(bytes.starts_with("\u{feff}".as_bytes()));
//!
//! let table = read_rows(bytes.as_slice()).unwrap();
//! assert_eq!(table.headers, headers);
//! assert_eq!(table.rows, vec![row]);
//! ```

use std::{collections::BTreeMap, io::Read, io::Write};

use crate::{core::item::ItemWriter, error::TransferError};

/// A module providing facilities for reading CSV data rows.
pub mod csv_reader;

/// A module providing facilities for writing CSV data rows.
pub mod csv_writer;

use csv_reader::CsvRowReaderBuilder;
use csv_writer::CsvRowWriterBuilder;

/// One CSV data line keyed by column name.
pub type CsvRow = BTreeMap<String, String>;

/// A whole CSV source: its header row and every data row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CsvTable {
    pub headers: Vec<String>,
    pub rows: Vec<CsvRow>,
}

/// Reads a complete CSV source into memory.
pub fn read_rows<R: Read>(source: R) -> Result<CsvTable, TransferError> {
    CsvRowReaderBuilder::new().from_reader(source)?.read_all()
}

/// Writes `rows` under `headers` and hands the destination back.
pub fn write_rows<W: Write>(
    destination: W,
    headers: &[String],
    rows: &[CsvRow],
) -> Result<W, TransferError> {
    let writer = CsvRowWriterBuilder::new()
        .headers(headers.to_vec())
        .from_writer(destination);

    writer.open()?;
    for row in rows {
        writer.write(row)?;
    }
    writer.flush()?;
    writer.into_inner()
}
