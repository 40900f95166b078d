use csv::{ReaderBuilder, StringRecordsIntoIter, Terminator, Trim};
use log::warn;
use std::{
    cell::{Cell, RefCell},
    fs::File,
    io::Read,
    path::Path,
};

use crate::{
    core::item::{ItemReader, ItemReaderResult},
    error::TransferError,
    record::clean_column_name,
};

use super::{CsvRow, CsvTable};

/// A CSV reader producing one column-keyed [`CsvRow`] per data line.
///
/// The header line is consumed when the reader is built, so a source that cannot be read
/// at all fails up front instead of on the first row.
///
/// # Implementation Details
///
/// - Uses a `RefCell` to provide interior mutability for the CSV record iterator
/// - Field values are never trimmed: scalar columns must survive a round trip unchanged
/// - Rows shorter than the header are padded with empty values
/// - Fields beyond the header are ignored
///
/// # Examples
///
/// ```
/// use submission_transfer::item::csv::csv_reader::CsvRowReaderBuilder;
/// use submission_transfer::core::item::ItemReader;
///
/// let data = "\u{feff}form_id,status\n3,success\n4";
///
/// let reader = CsvRowReaderBuilder::new().from_reader(data.as_bytes()).unwrap();
/// assert_eq!(reader.headers(), ["form_id", "status"]);
///
/// let first = reader.read().unwrap().unwrap();
/// assert_eq!(first["status"], "success");
///
/// // Short rows are padded.
/// let second = reader.read().unwrap().unwrap();
/// assert_eq!(second["status"], "");
///
/// assert!(reader.read().unwrap().is_none());
/// ```
pub struct CsvRowReader<R> {
    headers: Vec<String>,
    records: RefCell<StringRecordsIntoIter<R>>,
    /// Set once the underlying stream failed; the iterator is not read again.
    exhausted: Cell<bool>,
}

impl<R: Read> CsvRowReader<R> {
    /// Column names from the header line, byte-order mark removed.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Reads every remaining row.
    ///
    /// Stops at the first malformed line.
    pub fn read_all(self) -> Result<CsvTable, TransferError> {
        let mut rows = Vec::new();
        while let Some(row) = self.read()? {
            rows.push(row);
        }
        Ok(CsvTable {
            headers: self.headers,
            rows,
        })
    }
}

impl<R: Read> ItemReader<CsvRow> for CsvRowReader<R> {
    /// Reads the next data line and combines it with the header.
    ///
    /// # Returns
    /// - `Ok(Some(row))` if a row is successfully read
    /// - `Ok(None)` if there are no more rows, or the stream failed earlier
    /// - `Err(TransferError::Csv(error))` if the line is malformed
    fn read(&self) -> ItemReaderResult<CsvRow> {
        if self.exhausted.get() {
            return Ok(None);
        }

        let Some(result) = self.records.borrow_mut().next() else {
            return Ok(None);
        };

        let record = match result {
            Ok(record) => record,
            Err(error) => {
                if error.is_io_error() {
                    self.exhausted.set(true);
                }
                return Err(TransferError::Csv(error));
            }
        };

        if record.len() > self.headers.len() {
            warn!(
                "Line {} has {} fields for {} headers, ignoring the extra fields",
                record.position().map(|p| p.line()).unwrap_or_default(),
                record.len(),
                self.headers.len()
            );
        }

        let row = self
            .headers
            .iter()
            .enumerate()
            .map(|(index, header)| {
                let value = record.get(index).unwrap_or_default();
                (header.clone(), value.to_string())
            })
            .collect();

        Ok(Some(row))
    }
}

/// A builder for configuring CSV row reading.
///
/// # Default Configuration
///
/// - Delimiter: comma (,)
/// - Terminator: CRLF, which accepts `\r\n`, `\n` and `\r`
#[derive(Default)]
pub struct CsvRowReaderBuilder {
    /// The delimiter character (default: comma ',')
    delimiter: u8,
    /// The line terminator (default: CRLF)
    terminator: Terminator,
}

impl CsvRowReaderBuilder {
    pub fn new() -> Self {
        Self {
            delimiter: b',',
            terminator: Terminator::CRLF,
        }
    }

    /// Sets the delimiter character for the CSV parsing.
    ///
    /// # Examples
    ///
    /// ```
    /// use submission_transfer::item::csv::csv_reader::CsvRowReaderBuilder;
    ///
    /// let reader = CsvRowReaderBuilder::new()
    ///     .delimiter(b';')
    ///     .from_reader("form_id;status\n3;success".as_bytes())
    ///     .unwrap();
    ///
    /// assert_eq!(reader.headers(), ["form_id", "status"]);
    /// ```
    pub fn delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Sets the line terminator for the CSV parsing.
    pub fn terminator(mut self, terminator: Terminator) -> Self {
        self.terminator = terminator;
        self
    }

    /// Creates a `CsvRowReader` from a reader and consumes its header line.
    pub fn from_reader<R: Read>(self, rdr: R) -> Result<CsvRowReader<R>, TransferError> {
        let mut rdr = ReaderBuilder::new()
            .trim(Trim::None)
            .delimiter(self.delimiter)
            .terminator(self.terminator)
            .has_headers(true)
            .flexible(true) // Short rows are padded rather than rejected
            .from_reader(rdr);

        let headers = rdr
            .headers()?
            .iter()
            .map(|header| clean_column_name(header).to_string())
            .collect();

        Ok(CsvRowReader {
            headers,
            records: RefCell::new(rdr.into_records()),
            exhausted: Cell::new(false),
        })
    }

    /// Creates a `CsvRowReader` from a file path.
    ///
    /// # Errors
    /// Returns `TransferError::Io` if the file cannot be opened.
    pub fn from_path<P: AsRef<Path>>(self, path: P) -> Result<CsvRowReader<File>, TransferError> {
        let file = File::open(path)?;
        self.from_reader(file)
    }
}

#[cfg(test)]
mod tests {
    use std::io::{self, Read};

    use super::*;

    fn headers_and_rows(data: &[u8]) -> CsvTable {
        CsvRowReaderBuilder::new()
            .from_reader(data)
            .unwrap()
            .read_all()
            .unwrap()
    }

    #[test]
    fn rows_should_be_keyed_by_header() {
        let table = headers_and_rows(b"form_id,status\n3,success\n4,failed\n");

        assert_eq!(table.headers, vec!["form_id", "status"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[1]["form_id"], "4");
        assert_eq!(table.rows[1]["status"], "failed");
    }

    #[test]
    fn byte_order_mark_should_not_change_the_result() {
        let plain = headers_and_rows(b"id,form_id\n1,3\n");
        let marked = headers_and_rows(b"\xEF\xBB\xBFid,form_id\n1,3\n");

        assert_eq!(plain, marked);
        assert_eq!(marked.headers[0], "id");
    }

    #[test]
    fn short_rows_should_be_padded() {
        let table = headers_and_rows(b"a,b,c\n1\n");

        assert_eq!(table.rows[0]["a"], "1");
        assert_eq!(table.rows[0]["b"], "");
        assert_eq!(table.rows[0]["c"], "");
    }

    #[test]
    fn long_rows_should_be_truncated() {
        let table = headers_and_rows(b"a,b\n1,2,3\n");

        assert_eq!(table.rows[0].len(), 2);
        assert_eq!(table.rows[0]["b"], "2");
    }

    #[test]
    fn values_should_not_be_trimmed() {
        let table = headers_and_rows(b"a,b\n  padded  ,\"quoted, \"\"value\"\"\"\n");

        assert_eq!(table.rows[0]["a"], "  padded  ");
        assert_eq!(table.rows[0]["b"], "quoted, \"value\"");
    }

    #[test]
    fn empty_source_should_have_no_headers() {
        let table = headers_and_rows(b"");

        assert!(table.headers.is_empty());
        assert!(table.rows.is_empty());
    }

    struct BrokenSource;

    impl Read for BrokenSource {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::other("disk gone"))
        }
    }

    #[test]
    fn unreadable_source_should_fail_up_front() {
        let result = CsvRowReaderBuilder::new().from_reader(BrokenSource);

        assert!(matches!(result, Err(TransferError::Csv(_))));
    }

    #[test]
    fn missing_file_should_fail_with_io_error() {
        let result = CsvRowReaderBuilder::new().from_path("/definitely/not/here.csv");

        assert!(matches!(result, Err(TransferError::Io(_))));
    }
}
