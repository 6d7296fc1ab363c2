use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{error, info, warn};

use crate::error::{LoadError, LoadResult};
use crate::types::ErrorRecord;

use super::loader::LoadStats;

/// Severity classification used for observer callbacks and alerting thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LoadSeverity {
    /// Informational event.
    Info,
    /// Warning-level event (non-fatal).
    Warning,
    /// Error-level event (file failed).
    Error,
    /// Critical error (typically I/O or other infrastructure failures).
    Critical,
}

/// Classify a file-level failure.
pub fn severity_for_error(e: &LoadError) -> LoadSeverity {
    match e {
        LoadError::Io(_) => LoadSeverity::Critical,
        LoadError::Csv(err) => match err.kind() {
            ::csv::ErrorKind::Io(_) => LoadSeverity::Critical,
            _ => LoadSeverity::Error,
        },
        LoadError::StorageWriteFailure(_) => LoadSeverity::Error,
        LoadError::NoValidEncoding { .. } => LoadSeverity::Error,
        LoadError::InvalidOptions { .. } => LoadSeverity::Error,
        LoadError::Setup { .. } => LoadSeverity::Critical,
        LoadError::Unexpected(_) => LoadSeverity::Critical,
    }
}

/// The file a callback refers to.
#[derive(Debug, Clone)]
pub struct LoadContext {
    /// Source file.
    pub source_path: PathBuf,
    /// Destination database file.
    pub destination: PathBuf,
}

/// Observer interface for per-file outcomes.
///
/// Implementors can record metrics, logs, or trigger alerts. Callbacks run on worker threads
/// and should return quickly.
pub trait LoadObserver: Send + Sync {
    /// Called when a file loads successfully.
    fn on_success(&self, _ctx: &LoadContext, _stats: &LoadStats) {}

    /// Called when a file fails.
    fn on_failure(&self, _ctx: &LoadContext, _severity: LoadSeverity, _error: &LoadError) {}

    /// Called when a failure meets the alert threshold.
    ///
    /// Default behavior forwards to [`Self::on_failure`].
    fn on_alert(&self, ctx: &LoadContext, severity: LoadSeverity, error: &LoadError) {
        self.on_failure(ctx, severity, error)
    }
}

/// An observer that fans out callbacks to a list of observers.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn LoadObserver>>,
}

impl CompositeObserver {
    /// Create a new composite observer from a list of observers.
    pub fn new(observers: Vec<Arc<dyn LoadObserver>>) -> Self {
        Self { observers }
    }
}

impl fmt::Debug for CompositeObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeObserver")
            .field("observers_len", &self.observers.len())
            .finish()
    }
}

impl LoadObserver for CompositeObserver {
    fn on_success(&self, ctx: &LoadContext, stats: &LoadStats) {
        for o in &self.observers {
            o.on_success(ctx, stats);
        }
    }

    fn on_failure(&self, ctx: &LoadContext, severity: LoadSeverity, error: &LoadError) {
        for o in &self.observers {
            o.on_failure(ctx, severity, error);
        }
    }

    fn on_alert(&self, ctx: &LoadContext, severity: LoadSeverity, error: &LoadError) {
        for o in &self.observers {
            o.on_alert(ctx, severity, error);
        }
    }
}

/// Forwards per-file outcomes to `tracing`.
#[derive(Debug, Default)]
pub struct LogObserver;

impl LoadObserver for LogObserver {
    fn on_success(&self, ctx: &LoadContext, stats: &LoadStats) {
        info!(
            path = %ctx.source_path.display(),
            table = %stats.table,
            rows = stats.rows,
            encoding = %stats.format.encoding,
            "file loaded"
        );
    }

    fn on_failure(&self, ctx: &LoadContext, severity: LoadSeverity, error: &LoadError) {
        warn!(
            path = %ctx.source_path.display(),
            ?severity,
            %error,
            "file failed"
        );
    }

    fn on_alert(&self, ctx: &LoadContext, severity: LoadSeverity, error: &LoadError) {
        error!(
            path = %ctx.source_path.display(),
            ?severity,
            %error,
            "file failed (alert)"
        );
    }
}

/// Append-only error log shared by all workers.
///
/// Each record is two lines: the source path, then the error message. Writes are serialized
/// through a mutex so records from different workers never interleave.
#[derive(Debug)]
pub struct ErrorLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl ErrorLog {
    /// Open `path` for appending, creating it if needed.
    ///
    /// Fails with [`LoadError::Setup`] if the file cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> LoadResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| LoadError::setup(format!("cannot open error log {}: {e}", path.display())))?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record. Newlines inside the message are flattened so the line-pair format
    /// holds.
    pub fn append(&self, record: &ErrorRecord) -> io::Result<()> {
        let message = record.message.replace(['\r', '\n'], " ");
        let entry = format!("{}\n{message}\n", record.source_path.display());
        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        file.write_all(entry.as_bytes())?;
        file.flush()
    }
}

/// Parse an error log back into records. A trailing unpaired line is ignored.
pub fn read_error_log(path: impl AsRef<Path>) -> io::Result<Vec<ErrorRecord>> {
    let lines = BufReader::new(File::open(path)?)
        .lines()
        .collect::<io::Result<Vec<_>>>()?;
    Ok(lines
        .chunks_exact(2)
        .map(|pair| ErrorRecord {
            source_path: PathBuf::from(&pair[0]),
            message: pair[1].clone(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ranks_io_above_data_errors() {
        let io_err = LoadError::Io(io::Error::new(io::ErrorKind::NotFound, "gone"));
        let enc = LoadError::NoValidEncoding {
            path: PathBuf::from("c.csv"),
        };
        assert_eq!(severity_for_error(&io_err), LoadSeverity::Critical);
        assert_eq!(severity_for_error(&enc), LoadSeverity::Error);
    }

    #[test]
    fn error_log_writes_line_pairs_and_reads_them_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("errors.txt");
        let log = ErrorLog::open(&path).unwrap();
        log.append(&ErrorRecord {
            source_path: PathBuf::from("in/c.csv"),
            message: "no valid encoding\nsecond line".to_string(),
        })
        .unwrap();
        log.append(&ErrorRecord {
            source_path: PathBuf::from("in/d.csv"),
            message: "storage write failure".to_string(),
        })
        .unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            "in/c.csv\nno valid encoding second line\nin/d.csv\nstorage write failure\n"
        );
        let records = read_error_log(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].source_path, PathBuf::from("in/d.csv"));
    }

    #[test]
    fn unwritable_error_log_is_a_setup_failure() {
        let dir = tempfile::tempdir().unwrap();
        let err = ErrorLog::open(dir.path().join("missing").join("errors.txt")).unwrap_err();
        assert!(matches!(err, LoadError::Setup { .. }));
    }
}
