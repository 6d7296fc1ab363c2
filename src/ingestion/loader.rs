//! Per-file loading: detect, stream, create the table once, append batch by batch.
//!
//! Most callers go through [`crate::execution::run`], which calls [`load`] once per work item
//! and records failures. [`load`] itself never logs a failure; it returns it.

use std::path::Path;

use tracing::{debug, info};

use crate::error::{LoadError, LoadResult};
use crate::storage::SqliteDestination;
use crate::types::{DataType, Field, Schema};

use super::csv::{RowBatch, RowBatches};
use super::encoding::{TextEncoding, DEFAULT_ENCODINGS};
use super::infer::infer_schema;
use super::sniff::{self, DetectedFormat};

/// Source rows per batch.
pub const DEFAULT_BATCH_SIZE: usize = 10_000;

/// Options controlling per-file loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOptions {
    /// Source rows read per batch (bounds memory per in-flight file).
    pub batch_size: usize,
    /// Encodings tried, in order, when sniffing the header.
    pub encodings: Vec<TextEncoding>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            encodings: DEFAULT_ENCODINGS.to_vec(),
        }
    }
}

impl LoadOptions {
    /// Reject options that cannot run.
    pub fn validate(&self) -> LoadResult<()> {
        if self.batch_size == 0 {
            return Err(LoadError::InvalidOptions {
                message: "batch_size must be > 0".to_string(),
            });
        }
        if self.encodings.is_empty() {
            return Err(LoadError::InvalidOptions {
                message: "at least one candidate encoding is required".to_string(),
            });
        }
        Ok(())
    }
}

/// Outcome of a successful [`load`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadStats {
    /// Destination table name.
    pub table: String,
    /// Detected delimiter and encoding.
    pub format: DetectedFormat,
    /// Rows appended in this run.
    pub rows: u64,
    /// Non-empty batches appended.
    pub batches: usize,
    /// Whether this run created the table (false if it already existed or no rows were usable).
    pub table_created: bool,
}

/// Destination table name for a source file: its base name without extension.
pub fn table_name_for(path: &Path) -> Option<String> {
    path.file_stem().map(|s| s.to_string_lossy().into_owned())
}

/// Load one delimited file into the SQLite database at `destination`.
///
/// Steps:
///
/// 1. Detect delimiter and encoding (failure is terminal for this file).
/// 2. Open the source and the destination.
/// 3. Skip batches with no usable rows. On the first non-empty batch, reuse the table if it
///    exists, otherwise infer a schema from that batch and create the table.
/// 4. Append every non-empty batch, in source order.
/// 5. Close the destination.
///
/// A file with no usable data rows never gets a table. Re-running over the same file appends
/// its rows again.
pub fn load(
    source: impl AsRef<Path>,
    destination: impl AsRef<Path>,
    options: &LoadOptions,
) -> LoadResult<LoadStats> {
    let source = source.as_ref();
    options.validate()?;

    let table = table_name_for(source).ok_or_else(|| LoadError::InvalidOptions {
        message: format!("cannot derive a table name from {}", source.display()),
    })?;

    let format = sniff::detect(source, &options.encodings)?;
    let mut batches = RowBatches::open(source, format, options.batch_size)?;
    let headers = batches.headers().to_vec();
    let mut dest = SqliteDestination::open(destination)?;

    let mut stats = LoadStats {
        table,
        format,
        rows: 0,
        batches: 0,
        table_created: false,
    };

    let Some(first) = next_non_empty(&mut batches)? else {
        debug!(path = %source.display(), "no usable rows; table not created");
        dest.close()?;
        return Ok(stats);
    };

    let schema = if dest.table_exists(&stats.table)? {
        let existing = dest
            .existing_schema(&stats.table)?
            .unwrap_or_else(|| text_schema(&headers));
        align_to_headers(&headers, &existing)
    } else {
        // `first` is non-empty, so inference always yields a schema.
        let schema = infer_schema(&headers, &first).unwrap_or_else(|| text_schema(&headers));
        dest.ensure_table(&stats.table, &schema)?;
        stats.table_created = true;
        schema
    };

    let mut next = Some(first);
    while let Some(batch) = next {
        stats.rows += dest.append_batch(&stats.table, &schema, &batch)? as u64;
        stats.batches += 1;
        next = next_non_empty(&mut batches)?;
    }

    dest.close()?;
    info!(
        path = %source.display(),
        table = %stats.table,
        rows = stats.rows,
        created = stats.table_created,
        "loaded file"
    );
    Ok(stats)
}

fn next_non_empty<R: std::io::Read>(batches: &mut RowBatches<R>) -> LoadResult<Option<RowBatch>> {
    while let Some(batch) = batches.next_batch()? {
        if !batch.is_empty() {
            return Ok(Some(batch));
        }
    }
    Ok(None)
}

/// Bind this file's columns using the types the existing table declares. Header columns the
/// table lacks are bound as text; SQLite rejects the insert for them.
fn align_to_headers(headers: &[String], existing: &Schema) -> Schema {
    let fields = headers
        .iter()
        .map(|name| {
            let data_type = existing
                .fields
                .iter()
                .find(|f| f.name.eq_ignore_ascii_case(name))
                .map(|f| f.data_type)
                .unwrap_or(DataType::Utf8);
            Field::new(name.clone(), data_type)
        })
        .collect();
    Schema::new(fields)
}

fn text_schema(headers: &[String]) -> Schema {
    Schema::new(
        headers
            .iter()
            .map(|h| Field::new(h.clone(), DataType::Utf8))
            .collect(),
    )
}
