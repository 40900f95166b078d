use std::{
    cell::RefCell,
    fs::File,
    io::{self, Write},
    path::Path,
};

use csv::{QuoteStyle, Writer, WriterBuilder};

use crate::{
    core::item::{ItemWriter, ItemWriterResult},
    error::TransferError,
    record::{BYTE_ORDER_MARK, EXPORT_HEADERS},
};

use super::CsvRow;

/// A CSV writer emitting one line per [`CsvRow`], in header order.
///
/// [`ItemWriter::open`] writes the byte-order mark and the header row; rows lacking a
/// header's column get an empty field.
pub struct CsvRowWriter<T: Write> {
    wrapper: RefCell<Writer<T>>,
    headers: Vec<String>,
    byte_order_mark: bool,
}

impl<T: Write> ItemWriter<CsvRow> for CsvRowWriter<T> {
    fn write(&self, item: &CsvRow) -> ItemWriterResult {
        let fields = self
            .headers
            .iter()
            .map(|header| item.get(header).map(String::as_str).unwrap_or_default());
        self.wrapper.borrow_mut().write_record(fields)?;
        Ok(())
    }

    /// Flush the contents of the internal buffer to the underlying writer.
    ///
    /// Note that this also flushes the underlying writer.
    fn flush(&self) -> ItemWriterResult {
        self.wrapper.borrow_mut().flush()?;
        Ok(())
    }

    fn open(&self) -> ItemWriterResult {
        let mut header = self.headers.clone();
        if self.byte_order_mark {
            match header.first_mut() {
                Some(first) => first.insert(0, BYTE_ORDER_MARK),
                None => header.push(BYTE_ORDER_MARK.to_string()),
            }
        }
        self.wrapper.borrow_mut().write_record(&header)?;
        Ok(())
    }
}

impl<T: Write> CsvRowWriter<T> {
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn into_inner(self) -> Result<T, TransferError> {
        self.wrapper
            .into_inner()
            .into_inner()
            .map_err(|error| TransferError::Io(error.into_error()))
    }
}

pub struct CsvRowWriterBuilder {
    delimiter: u8,
    byte_order_mark: bool,
    headers: Vec<String>,
}

impl Default for CsvRowWriterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CsvRowWriterBuilder {
    /// Comma-delimited, byte-order mark on, the fixed export header.
    pub fn new() -> CsvRowWriterBuilder {
        CsvRowWriterBuilder {
            delimiter: b',',
            byte_order_mark: true,
            headers: EXPORT_HEADERS.iter().map(|h| h.to_string()).collect(),
        }
    }

    pub fn delimiter(mut self, delimiter: u8) -> CsvRowWriterBuilder {
        self.delimiter = delimiter;
        self
    }

    pub fn byte_order_mark(mut self, yes: bool) -> CsvRowWriterBuilder {
        self.byte_order_mark = yes;
        self
    }

    pub fn headers(mut self, headers: Vec<String>) -> CsvRowWriterBuilder {
        self.headers = headers;
        self
    }

    pub fn from_path<P: AsRef<Path>>(self, path: P) -> Result<CsvRowWriter<File>, TransferError> {
        let file = File::create(path)?;
        Ok(self.from_writer(file))
    }

    /// Builds a writer over any destination.
    ///
    /// # Example
    ///
    /// ```
    /// # use std::error::Error;
    /// # use submission_transfer::{item::csv::csv_writer::CsvRowWriterBuilder, core::item::ItemWriter};
    /// # use submission_transfer::item::csv::CsvRow;
    /// # fn main() { example().unwrap(); }
    /// fn example() -> Result<(), Box<dyn Error>> {
    ///     let wtr = CsvRowWriterBuilder::new()
    ///         .byte_order_mark(false)
    ///         .headers(vec!["form_id".to_string(), "status".to_string()])
    ///         .from_writer(vec![]);
    ///
    ///     let mut row = CsvRow::new();
    ///     row.insert("form_id".to_string(), "3".to_string());
    ///     row.insert("status".to_string(), "line1\nline2".to_string());
    ///
    ///     wtr.open()?;
    ///     wtr.write(&row)?;
    ///
    ///     let data = String::from_utf8(wtr.into_inner()?)?;
    ///     assert_eq!(data, "form_id,status\n3,\"line1\nline2\"\n");
    ///     Ok(())
    /// }
    /// ```
    pub fn from_writer<W: io::Write>(self, wtr: W) -> CsvRowWriter<W> {
        let wtr = WriterBuilder::new()
            .flexible(false)
            .has_headers(false)
            .delimiter(self.delimiter)
            .quote_style(QuoteStyle::Necessary)
            .from_writer(wtr);

        CsvRowWriter {
            wrapper: RefCell::new(wtr),
            headers: self.headers,
            byte_order_mark: self.byte_order_mark,
        }
    }
}
