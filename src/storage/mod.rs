//! SQLite destination: table materialization and batched appends.
//!
//! One [`SqliteDestination`] wraps one connection and is owned by a single worker for the
//! duration of one work item. Nothing here is shared across threads.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use rusqlite::types::{ToSqlOutput, Value as SqlValue, ValueRef};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, ToSql};
use tracing::debug;

use crate::error::{LoadError, LoadResult};
use crate::types::{DataType, Field, Schema, Value};

/// Column names that must be quoted to be used as identifiers (compared case-insensitively).
pub const RESERVED_WORDS: &[&str] = &[
    "ADD", "ALTER", "AND", "AS", "ASC", "BETWEEN", "BY", "CASE", "CHECK", "COLUMN", "CONSTRAINT",
    "CREATE", "CROSS", "CURRENT_DATE", "CURRENT_TIME", "CURRENT_TIMESTAMP", "DEFAULT", "DELETE",
    "DESC", "DISTINCT", "DROP", "ELSE", "EXCEPT", "EXISTS", "FOREIGN", "FROM", "FULL", "GROUP",
    "HAVING", "IN", "INNER", "INSERT", "INTERSECT", "INTO", "IS", "JOIN", "LEFT", "LIKE", "LIMIT",
    "NOT", "NULL", "ON", "OR", "ORDER", "OUTER", "PRIMARY", "REFERENCES", "RIGHT", "SELECT", "SET",
    "TABLE", "THEN", "TO", "UNION", "UNIQUE", "UPDATE", "USING", "VALUES", "WHEN", "WHERE",
];

/// True if `name` collides case-insensitively with [`RESERVED_WORDS`].
pub fn is_reserved(name: &str) -> bool {
    RESERVED_WORDS.iter().any(|w| w.eq_ignore_ascii_case(name))
}

/// Render `name` as an SQL identifier.
///
/// Reserved words are double-quoted. Plain identifiers (`[A-Za-z_][A-Za-z0-9_]*`) are returned
/// unchanged. Anything else is quoted too, since it would not parse bare.
pub fn quote_identifier(name: &str) -> Cow<'_, str> {
    if is_plain_identifier(name) && !is_reserved(name) {
        Cow::Borrowed(name)
    } else {
        Cow::Owned(format!("\"{}\"", name.replace('"', "\"\"")))
    }
}

fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// `CREATE TABLE IF NOT EXISTS` statement for `schema`.
pub fn create_table_sql(table: &str, schema: &Schema) -> String {
    let columns = schema
        .fields
        .iter()
        .map(|f| format!("{} {}", quote_identifier(&f.name), f.data_type.sql_type()))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({columns})",
        quote_identifier(table)
    )
}

/// Parameterized `INSERT` statement for `schema`, columns in schema order.
pub fn insert_sql(table: &str, schema: &Schema) -> String {
    let columns = schema
        .field_names()
        .map(quote_identifier)
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = vec!["?"; schema.len()].join(", ");
    format!(
        "INSERT INTO {} ({columns}) VALUES ({placeholders})",
        quote_identifier(table)
    )
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(SqlValue::Null),
            Value::Int64(v) => ToSqlOutput::Owned(SqlValue::Integer(*v)),
            Value::Float64(v) => ToSqlOutput::Owned(SqlValue::Real(*v)),
            Value::Bool(v) => ToSqlOutput::Owned(SqlValue::Integer(i64::from(*v))),
            Value::Utf8(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

/// A SQLite database file holding one destination table.
pub struct SqliteDestination {
    db_path: Option<PathBuf>,
    conn: Connection,
}

impl SqliteDestination {
    /// Open (creating if needed) the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> LoadResult<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path)?;
        Ok(Self {
            db_path: Some(path),
            conn,
        })
    }

    /// In-memory database, for tests and benchmarks.
    pub fn in_memory() -> LoadResult<Self> {
        Ok(Self {
            db_path: None,
            conn: Connection::open_in_memory()?,
        })
    }

    /// Database file path (`None` for in-memory).
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Whether a table named `table` exists.
    pub fn table_exists(&self, table: &str) -> LoadResult<bool> {
        let found: Option<String> = self
            .conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![table],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Create `table` with `schema` unless it already exists.
    pub fn ensure_table(&self, table: &str, schema: &Schema) -> LoadResult<()> {
        let sql = create_table_sql(table, schema);
        debug!(table, %sql, "creating table");
        self.conn.execute(&sql, [])?;
        Ok(())
    }

    /// Read back the declared schema of an existing table. `None` if the table is absent.
    pub fn existing_schema(&self, table: &str) -> LoadResult<Option<Schema>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, type FROM pragma_table_info(?1) ORDER BY cid")?;
        let fields = stmt
            .query_map(params![table], |row| {
                let name: String = row.get(0)?;
                let declared: String = row.get(1)?;
                Ok(Field::new(name, DataType::from_sql_type(&declared)))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        if fields.is_empty() {
            Ok(None)
        } else {
            Ok(Some(Schema::new(fields)))
        }
    }

    /// Append `rows` to `table` inside one transaction, binding cells by `schema` order.
    ///
    /// Cells are converted with [`Value::from_cell`]; nothing is re-validated here, so a cell
    /// that does not match its column type is handed to SQLite as text.
    pub fn append_batch(&mut self, table: &str, schema: &Schema, rows: &[Vec<String>]) -> LoadResult<usize> {
        let sql = insert_sql(table, schema);
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(&sql)?;
            let mut values: Vec<Value> = Vec::with_capacity(schema.len());
            for row in rows {
                if row.len() != schema.len() {
                    return Err(LoadError::StorageWriteFailure(format!(
                        "row has {} values, table {table} expects {}",
                        row.len(),
                        schema.len()
                    )));
                }
                values.clear();
                values.extend(
                    row.iter()
                        .zip(&schema.fields)
                        .map(|(cell, field)| Value::from_cell(cell, field.data_type)),
                );
                stmt.execute(params_from_iter(values.iter()))?;
            }
        }
        tx.commit()?;
        debug!(table, rows = rows.len(), "appended batch");
        Ok(rows.len())
    }

    /// Number of rows in `table`.
    pub fn row_count(&self, table: &str) -> LoadResult<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_identifier(table));
        let n: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(u64::try_from(n).unwrap_or_default())
    }

    /// Close the connection, surfacing any error SQLite reports on close.
    pub fn close(self) -> LoadResult<()> {
        self.conn.close().map_err(|(_, err)| err.into())
    }
}
