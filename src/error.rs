use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "google")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unrecognized format in {file}: {reason}")]
    Format { file: String, reason: String },

    #[error("Fetching existing transactions failed: {0}")]
    RemoteFetch(String),

    #[error("Appending rows to the sheet failed: {0}")]
    RemoteAppend(String),

    #[error("Invalid rule '{pattern}': {reason}")]
    Rules { pattern: String, reason: String },

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, SyncError>;

/// A single data row that could not be turned into a transaction.
/// Recorded as a warning; the rest of the file is still processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowParseError {
    /// 1-based line number within the CSV file.
    pub line: u64,
    pub reason: String,
}

impl std::fmt::Display for RowParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line, self.reason)
    }
}

impl std::error::Error for RowParseError {}
