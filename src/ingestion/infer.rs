//! Schema inference from a batch of decoded rows.

use std::collections::HashSet;

use crate::types::{parse_bool, parse_real, DataType, Field, Schema};

/// Make header names usable as unique column names.
///
/// - Surrounding whitespace is trimmed.
/// - Empty names become `Unnamed: <index>`.
/// - Repeated names get a `.<n>` suffix (`a`, `a.1`, `a.2`), skipping suffixes already taken.
///   Names are compared ASCII case-insensitively, as SQLite compares column names.
pub fn normalize_headers(raw: &[String]) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::with_capacity(raw.len());
    let mut out = Vec::with_capacity(raw.len());
    for (idx, name) in raw.iter().enumerate() {
        let base = match name.trim() {
            "" => format!("Unnamed: {idx}"),
            trimmed => trimmed.to_owned(),
        };

        let mut candidate = base.clone();
        let mut n = 1usize;
        while seen.contains(&candidate.to_ascii_lowercase()) {
            candidate = format!("{base}.{n}");
            n += 1;
        }
        seen.insert(candidate.to_ascii_lowercase());
        out.push(candidate);
    }
    out
}

/// Infer a schema for `headers` from `rows`.
///
/// Returns `None` for a batch with no rows: there is nothing to classify, and the caller is
/// expected to try again with the next batch.
pub fn infer_schema(headers: &[String], rows: &[Vec<String>]) -> Option<Schema> {
    if rows.is_empty() {
        return None;
    }

    let fields = headers
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let cells = rows.iter().filter_map(|row| row.get(idx).map(String::as_str));
            Field::new(name.clone(), classify_column(cells))
        })
        .collect();
    Some(Schema::new(fields))
}

/// Classify one column.
///
/// Empty cells are nulls and do not constrain the type. Precedence is Integer, then Real, then
/// Boolean; a single cell fitting none of them makes the column Text. A column with no
/// non-empty cell is Text.
pub fn classify_column<'a>(cells: impl IntoIterator<Item = &'a str>) -> DataType {
    let mut all_int = true;
    let mut all_real = true;
    let mut all_bool = true;
    let mut non_empty = 0usize;

    for cell in cells {
        let v = cell.trim();
        if v.is_empty() {
            continue;
        }
        non_empty += 1;

        if all_int && v.parse::<i64>().is_err() {
            all_int = false;
        }
        if all_real && parse_real(v).is_none() {
            all_real = false;
        }
        if all_bool && parse_bool(v).is_none() {
            all_bool = false;
        }
        if !all_int && !all_real && !all_bool {
            return DataType::Utf8;
        }
    }

    match (non_empty, all_int, all_real, all_bool) {
        (0, ..) => DataType::Utf8,
        (_, true, _, _) => DataType::Int64,
        (_, _, true, _) => DataType::Float64,
        (_, _, _, true) => DataType::Bool,
        _ => DataType::Utf8,
    }
}
