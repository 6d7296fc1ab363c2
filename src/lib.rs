//! `csv-db-loader` converts a directory of delimited text files into per-file SQLite tables.
//!
//! For every `*.csv` file in an input directory it:
//!
//! - sniffs the field delimiter (`,` `;` tab `|`) and text encoding (UTF-8, Latin-1,
//!   ISO-8859-1) from the header line
//! - streams the file in bounded row batches, silently skipping malformed rows
//! - infers a column schema ([`types::DataType`]: `Int64`, `Float64`, `Bool`, `Utf8`) from the
//!   first usable batch and creates the table once
//! - appends each batch to `<output>/<name>.db`, table `<name>`
//!
//! Files are processed in parallel on a fixed worker pool. A file that fails (undecodable
//! header, storage error, ...) is recorded in an append-only error log and the run carries on.
//!
//! ## Quick example
//!
//! ```no_run
//! # fn main() -> Result<(), csv_db_loader::LoadError> {
//! let summary = csv_db_loader::execution::run("input", "output", "errors.txt", 4)?;
//! println!("{summary}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Loading a single file
//!
//! ```no_run
//! use csv_db_loader::ingestion::{load, LoadOptions};
//!
//! # fn main() -> Result<(), csv_db_loader::LoadError> {
//! let stats = load("sales.csv", "sales.db", &LoadOptions::default())?;
//! println!("table={} rows={}", stats.table, stats.rows);
//! # Ok(())
//! # }
//! ```
//!
//! ## Progress reporting
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use csv_db_loader::execution::{Dispatcher, ProgressChannel, RunOptions};
//!
//! # fn main() -> Result<(), csv_db_loader::LoadError> {
//! let (progress, updates) = ProgressChannel::bounded(64);
//! let dispatcher = Dispatcher::new(RunOptions {
//!     run_observer: Some(Arc::new(progress)),
//!     ..Default::default()
//! })?;
//! std::thread::spawn(move || {
//!     for u in updates {
//!         eprintln!("{}/{} {}", u.completed, u.total, u.source_path.display());
//!     }
//! });
//! dispatcher.run("input", "output", "errors.txt")?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`ingestion`]: sniffing, batched reading, schema inference, per-file loading
//! - [`storage`]: SQLite table materialization and batch appends
//! - [`execution`]: work item enumeration, worker pool, progress and error log
//! - [`types`]: schema, value and work item types
//! - [`error`]: error types

pub mod error;
pub mod execution;
pub mod ingestion;
pub mod storage;
pub mod types;

pub use error::{LoadError, LoadResult};
