use thiserror::Error;

#[derive(Error, Debug)]
/// Transfer error
pub enum TransferError {
    /// The source or destination stream could not be read or written.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The CSV transport rejected the input or output.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Required headers are absent from the import source.
    #[error("Invalid CSV format. Missing headers: {}", .0.join(", "))]
    MissingHeaders(Vec<String>),

    /// An export matched no parent records.
    #[error("No records found for the selected forms")]
    NoRecords,

    /// A parent column outside the logical record schema was handed to a store.
    #[error("Unknown record column: {0}")]
    InvalidColumn(String),

    /// The storage collaborator failed.
    #[error("Storage error: {0}")]
    Storage(String),
}

#[cfg(feature = "rdbc-sqlite")]
impl From<sqlx::Error> for TransferError {
    fn from(error: sqlx::Error) -> Self {
        TransferError::Storage(error.to_string())
    }
}
