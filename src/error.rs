use std::path::PathBuf;

use thiserror::Error;

/// Convenience result type for loading operations.
pub type LoadResult<T> = Result<T, LoadError>;

/// Error type returned by detection, loading and dispatch.
///
/// File-level variants (`NoValidEncoding`, `StorageWriteFailure`, `Io`, `Csv`, `Unexpected`) are
/// caught by the dispatcher, written to the error log and never abort a run.
/// [`crate::execution::run`] only returns `Setup` and `InvalidOptions`, both before any file is
/// touched.
#[derive(Debug, Error)]
pub enum LoadError {
    /// No candidate encoding could decode the file's header line.
    #[error("no valid encoding found for file {}", path.display())]
    NoValidEncoding { path: PathBuf },

    /// The destination store rejected a statement (table creation or batch append).
    #[error("storage write failure: {0}")]
    StorageWriteFailure(String),

    /// Input directory missing/unreadable, output directory or error log not writable.
    #[error("setup failure: {message}")]
    Setup { message: String },

    /// Underlying I/O error while reading a source file.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Non-recoverable CSV reader error (malformed rows never surface here).
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// Options failed validation before any work started.
    #[error("invalid options: {message}")]
    InvalidOptions { message: String },

    /// A worker panicked while loading a file.
    #[error("unexpected fault: {0}")]
    Unexpected(String),
}

impl From<rusqlite::Error> for LoadError {
    fn from(err: rusqlite::Error) -> Self {
        LoadError::StorageWriteFailure(err.to_string())
    }
}

impl LoadError {
    pub(crate) fn setup(message: impl Into<String>) -> Self {
        LoadError::Setup {
            message: message.into(),
        }
    }
}
