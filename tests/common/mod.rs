#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};

pub fn write_file(dir: &Path, name: &str, contents: impl AsRef<[u8]>) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

/// `id,name,score,active` file with `n` well-formed rows.
pub fn people_csv(n: usize) -> String {
    let mut out = String::from("id,name,score,active\n");
    for i in 1..=n {
        out.push_str(&format!("{i},person{i},{}.5,{}\n", i * 10, i % 2 == 0));
    }
    out
}

pub fn table_exists(db: &Path, table: &str) -> bool {
    let conn = Connection::open(db).unwrap();
    conn.query_row(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
        params![table],
        |row| row.get::<_, String>(0),
    )
    .optional()
    .unwrap()
    .is_some()
}

pub fn table_count(db: &Path) -> i64 {
    let conn = Connection::open(db).unwrap();
    conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'",
        [],
        |row| row.get(0),
    )
    .unwrap()
}

pub fn row_count(db: &Path, table: &str) -> i64 {
    let conn = Connection::open(db).unwrap();
    conn.query_row(&format!("SELECT COUNT(*) FROM \"{table}\""), [], |row| row.get(0))
        .unwrap()
}

pub fn create_sql(db: &Path, table: &str) -> String {
    let conn = Connection::open(db).unwrap();
    conn.query_row(
        "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?1",
        params![table],
        |row| row.get(0),
    )
    .unwrap()
}
