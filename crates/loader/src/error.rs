use thiserror::Error;

/// Result type for loader operations
pub type Result<T> = std::result::Result<T, LoaderError>;

/// Errors that abort a load. Problems confined to a single row never surface
/// here; they are counted in the diagnostics instead.
#[derive(Error, Debug)]
pub enum LoaderError {
    /// One or more mapped columns are absent from the header row
    #[error("Missing required column(s): {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    /// The input has no header row at all
    #[error("Input has no header row")]
    MissingHeader,

    /// Invalid schema mapping
    #[error("Invalid schema mapping: {0}")]
    InvalidSchema(String),

    /// IO error occurred
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// CSV reader error that is not attributable to a single record
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
}

impl LoaderError {
    /// Create an invalid schema error
    pub fn invalid_schema(msg: impl Into<String>) -> Self {
        Self::InvalidSchema(msg.into())
    }
}
