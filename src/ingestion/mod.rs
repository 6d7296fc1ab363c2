//! Per-file ingestion: format sniffing, batched reading, schema inference and loading.
//!
//! Most callers should use [`load`] (from [`loader`]), which:
//!
//! - detects the delimiter and encoding from the header line ([`sniff`])
//! - streams the file in bounded row batches, skipping malformed rows ([`csv`])
//! - infers a schema from the first usable batch ([`infer`]) and creates the table once
//! - appends every batch to the destination ([`crate::storage`])
//!
//! Outcome reporting lives in [`observability`].

pub mod csv;
pub mod encoding;
pub mod infer;
pub mod loader;
pub mod observability;
pub mod sniff;

pub use encoding::{TextEncoding, DEFAULT_ENCODINGS};
pub use loader::{load, table_name_for, LoadOptions, LoadStats, DEFAULT_BATCH_SIZE};
pub use observability::{
    read_error_log, CompositeObserver, ErrorLog, LoadContext, LoadObserver, LoadSeverity, LogObserver,
};
pub use sniff::{detect, DetectedFormat};
