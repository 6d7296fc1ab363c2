//! Job dispatcher: one work item per source file, run across a fixed worker pool.
//!
//! This module sits "above" [`crate::ingestion`] and provides:
//!
//! - Enumeration of source files into [`WorkItem`]s
//! - A fixed-size worker pool where a failing file never stops the batch
//! - The shared error log, progress counter and observer hooks

mod observer;

use std::fmt;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::error::{LoadError, LoadResult};
use crate::ingestion::loader::{load, table_name_for, LoadOptions};
use crate::ingestion::observability::{
    severity_for_error, ErrorLog, LoadContext, LoadObserver, LoadSeverity,
};
use crate::types::{ErrorRecord, WorkItem};

pub use observer::{
    LogRunObserver, ProgressChannel, ProgressUpdate, RunEvent, RunMetrics, RunObserver, RunSummary,
};

/// Worker threads used when none are configured.
pub const DEFAULT_WORKERS: usize = 4;

/// Source files picked up when no pattern is configured.
pub const DEFAULT_FILE_PATTERN: &str = "*.csv";

/// Extension of destination database files.
pub const DESTINATION_EXTENSION: &str = "db";

/// Configuration for the [`Dispatcher`].
#[derive(Clone)]
pub struct RunOptions {
    /// Number of worker threads. Bounds open files and destination connections.
    pub workers: usize,
    /// Glob matched against file names in the input directory (non-recursive).
    pub file_pattern: String,
    /// Per-file loading options.
    pub load: LoadOptions,
    /// Optional per-file outcome observer.
    pub observer: Option<Arc<dyn LoadObserver>>,
    /// Optional run event observer (progress reporting).
    pub run_observer: Option<Arc<dyn RunObserver>>,
    /// Severity threshold at which `on_alert` is invoked.
    pub alert_at_or_above: LoadSeverity,
}

impl fmt::Debug for RunOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunOptions")
            .field("workers", &self.workers)
            .field("file_pattern", &self.file_pattern)
            .field("load", &self.load)
            .field("observer_set", &self.observer.is_some())
            .field("run_observer_set", &self.run_observer.is_some())
            .field("alert_at_or_above", &self.alert_at_or_above)
            .finish()
    }
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            file_pattern: DEFAULT_FILE_PATTERN.to_string(),
            load: LoadOptions::default(),
            observer: None,
            run_observer: None,
            alert_at_or_above: LoadSeverity::Critical,
        }
    }
}

/// Runs work items on a dedicated thread pool.
pub struct Dispatcher {
    pool: ThreadPool,
    opts: RunOptions,
    metrics: Arc<RunMetrics>,
}

impl Dispatcher {
    /// Create a dispatcher with `opts.workers` threads.
    pub fn new(opts: RunOptions) -> LoadResult<Self> {
        if opts.workers == 0 {
            return Err(LoadError::InvalidOptions {
                message: "workers must be > 0".to_string(),
            });
        }
        opts.load.validate()?;

        let pool = ThreadPoolBuilder::new()
            .num_threads(opts.workers)
            .thread_name(|i| format!("csv2db-worker-{i}"))
            .build()
            .map_err(|e| LoadError::setup(format!("failed to build worker pool: {e}")))?;

        Ok(Self {
            pool,
            opts,
            metrics: Arc::new(RunMetrics::new()),
        })
    }

    /// Handle to live run metrics (the progress counter included).
    pub fn metrics(&self) -> Arc<RunMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Convert every matching file in `input_dir` into a database in `output_dir`.
    ///
    /// Returns `Err` only for setup failures: missing input directory, unwritable error log,
    /// uncreatable output directory. Per-file failures are appended to the error log and
    /// counted in the summary.
    ///
    /// The error log is opened before the output directory is created, so it cannot live
    /// inside an output directory that does not exist yet.
    pub fn run(
        &self,
        input_dir: impl AsRef<Path>,
        output_dir: impl AsRef<Path>,
        error_log_path: impl AsRef<Path>,
    ) -> LoadResult<RunSummary> {
        let output_dir = output_dir.as_ref();
        let items = enumerate_work_items(input_dir.as_ref(), output_dir, &self.opts.file_pattern)?;
        let error_log = ErrorLog::open(error_log_path)?;
        fs::create_dir_all(output_dir).map_err(|e| {
            LoadError::setup(format!(
                "cannot create output directory {}: {e}",
                output_dir.display()
            ))
        })?;

        info!(
            files = items.len(),
            workers = self.opts.workers,
            input = %input_dir.as_ref().display(),
            output = %output_dir.display(),
            "starting run"
        );
        Ok(self.run_items(&items, &error_log))
    }

    /// Process pre-built work items. Each item is handled by exactly one worker.
    pub fn run_items(&self, items: &[WorkItem], error_log: &ErrorLog) -> RunSummary {
        let start = Instant::now();
        self.metrics.begin_run(items.len() as u64);
        self.emit(RunEvent::RunStarted {
            total: items.len() as u64,
        });

        self.pool.install(|| {
            items
                .par_iter()
                .with_max_len(1)
                .for_each(|item| self.process(item, error_log));
        });

        self.metrics.end_run(start.elapsed());
        let summary = self.metrics.snapshot();
        self.emit(RunEvent::RunFinished {
            summary: summary.clone(),
        });
        info!(%summary, "run finished");
        summary
    }

    fn process(&self, item: &WorkItem, error_log: &ErrorLog) {
        self.metrics.on_item_start();
        self.emit(RunEvent::ItemStarted {
            source_path: item.source_path.clone(),
        });

        let ctx = LoadContext {
            source_path: item.source_path.clone(),
            destination: item.destination.clone(),
        };

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            load(&item.source_path, &item.destination, &self.opts.load)
        }))
        .unwrap_or_else(|payload| Err(LoadError::Unexpected(panic_message(payload.as_ref()))));

        let (succeeded, rows, completed) = match result {
            Ok(stats) => {
                if let Some(obs) = &self.opts.observer {
                    obs.on_success(&ctx, &stats);
                }
                let completed = self.metrics.on_item_success(stats.rows, stats.table_created);
                (true, stats.rows, completed)
            }
            Err(err) => {
                let record = ErrorRecord {
                    source_path: item.source_path.clone(),
                    message: err.to_string(),
                };
                if let Err(io_err) = error_log.append(&record) {
                    warn!(
                        log = %error_log.path().display(),
                        path = %item.source_path.display(),
                        error = %io_err,
                        "failed to append to error log"
                    );
                }
                if let Some(obs) = &self.opts.observer {
                    let sev = severity_for_error(&err);
                    obs.on_failure(&ctx, sev, &err);
                    if sev >= self.opts.alert_at_or_above {
                        obs.on_alert(&ctx, sev, &err);
                    }
                }
                (false, 0, self.metrics.on_item_failure())
            }
        };

        self.emit(RunEvent::ItemFinished {
            source_path: item.source_path.clone(),
            succeeded,
            rows,
            completed,
            total: self.metrics.total(),
        });
    }

    fn emit(&self, event: RunEvent) {
        if let Some(obs) = &self.opts.run_observer {
            obs.on_event(&event);
        }
    }
}

/// Build one work item per file in `input_dir` whose name matches `pattern`.
///
/// Non-recursive. Items are sorted by file name. The destination of `in/a.csv` is
/// `<output_dir>/a.db`.
pub fn enumerate_work_items(input_dir: &Path, output_dir: &Path, pattern: &str) -> LoadResult<Vec<WorkItem>> {
    if !input_dir.is_dir() {
        return Err(LoadError::setup(format!(
            "input directory {} does not exist or is not a directory",
            input_dir.display()
        )));
    }
    let pattern = glob::Pattern::new(pattern).map_err(|e| LoadError::InvalidOptions {
        message: format!("invalid file pattern '{pattern}': {e}"),
    })?;

    let mut items = Vec::new();
    for entry in WalkDir::new(input_dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| {
            LoadError::setup(format!("cannot read input directory {}: {e}", input_dir.display()))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        if !pattern.matches(&entry.file_name().to_string_lossy()) {
            continue;
        }
        let Some(stem) = table_name_for(entry.path()) else {
            continue;
        };
        items.push(WorkItem {
            source_path: entry.path().to_path_buf(),
            destination: output_dir.join(format!("{stem}.{DESTINATION_EXTENSION}")),
        });
    }
    Ok(items)
}

/// Run with default options and `workers` threads.
///
/// See [`Dispatcher::run`].
pub fn run(
    input_dir: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    error_log_path: impl AsRef<Path>,
    workers: usize,
) -> LoadResult<RunSummary> {
    let dispatcher = Dispatcher::new(RunOptions {
        workers,
        ..Default::default()
    })?;
    dispatcher.run(input_dir, output_dir, error_log_path)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}
