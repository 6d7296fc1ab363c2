//! Core data model types shared by detection, inference, storage and dispatch.
//!
//! A [`Schema`] is an ordered list of typed [`Field`]s inferred from the first usable row batch of
//! a source file. Cells are bound to the destination as [`Value`]s.

use std::path::PathBuf;

use serde::Serialize;

/// Logical column type inferred from text content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DataType {
    /// Whole numbers (64-bit signed).
    Int64,
    /// Floating point numbers.
    Float64,
    /// `true`/`false` tokens.
    Bool,
    /// Fallback for anything else.
    Utf8,
}

impl DataType {
    /// Native SQLite column type used when materializing a table.
    pub fn sql_type(self) -> &'static str {
        match self {
            DataType::Int64 => "INTEGER",
            DataType::Float64 => "REAL",
            DataType::Bool => "BOOLEAN",
            DataType::Utf8 => "TEXT",
        }
    }

    /// Map a declared SQLite column type back to a logical type.
    ///
    /// Follows SQLite's affinity rules closely enough for tables this crate creates; anything
    /// unrecognized is treated as text.
    pub fn from_sql_type(declared: &str) -> Self {
        let upper = declared.to_ascii_uppercase();
        if upper.contains("INT") {
            DataType::Int64
        } else if upper.contains("BOOL") {
            DataType::Bool
        } else if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
            DataType::Float64
        } else {
            DataType::Utf8
        }
    }
}

/// A single named, typed column in a [`Schema`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Column name, as read from the header row (after normalization).
    pub name: String,
    /// Inferred logical type.
    pub data_type: DataType,
}

impl Field {
    /// Create a new field.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// Ordered column list of a destination table. Names are unique.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    /// Ordered list of fields.
    pub fields: Vec<Field>,
}

impl Schema {
    /// Create a new schema from fields.
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// Iterate field names in order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Returns the index of a field by name, if present.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True if the schema has no columns.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A single cell value bound into the destination.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Empty cell.
    Null,
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit float.
    Float64(f64),
    /// Boolean.
    Bool(bool),
    /// Text, also used for cells that do not fit their column's type.
    Utf8(String),
}

impl Value {
    /// Convert a raw cell into a value for a column of type `data_type`.
    ///
    /// Cells that do not parse under the column type are kept as text; the store's column
    /// affinity decides what happens to them.
    pub fn from_cell(raw: &str, data_type: DataType) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Value::Null;
        }

        let typed = match data_type {
            DataType::Int64 => trimmed.parse::<i64>().ok().map(Value::Int64),
            DataType::Float64 => parse_real(trimmed).map(Value::Float64),
            DataType::Bool => parse_bool(trimmed).map(Value::Bool),
            DataType::Utf8 => None,
        };
        typed.unwrap_or_else(|| Value::Utf8(raw.to_owned()))
    }
}

/// Parse a finite float written with numeric characters only.
///
/// Rejects the `inf`/`nan` spellings `f64::from_str` accepts, so text columns containing
/// words like "Infinity" stay text.
pub(crate) fn parse_real(s: &str) -> Option<f64> {
    if !s
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'-' | b'+' | b'e' | b'E'))
    {
        return None;
    }
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Canonical boolean tokens (case-insensitive).
pub(crate) fn parse_bool(s: &str) -> Option<bool> {
    if s.eq_ignore_ascii_case("true") {
        Some(true)
    } else if s.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// One source-file-to-destination conversion task. Immutable once enqueued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// Delimited text file to read.
    pub source_path: PathBuf,
    /// SQLite database file to append into.
    pub destination: PathBuf,
}

/// A file-level failure recorded in the error log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorRecord {
    /// Source file that failed.
    pub source_path: PathBuf,
    /// Display form of the error.
    pub message: String,
}
