//! Streaming CSV reader that yields bounded row batches.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::ByteRecord;

use crate::error::LoadResult;

use super::encoding::TextEncoding;
use super::infer::normalize_headers;
use super::sniff::DetectedFormat;

/// One bounded group of decoded rows, in source order.
pub type RowBatch = Vec<Vec<String>>;

/// Why a data row was dropped. Rows are skipped silently and never counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MalformedRow {
    FieldCount,
    Undecodable,
}

/// Reads a delimited file as a header plus a sequence of row batches.
///
/// Rules:
///
/// - The first line is the header; its names are normalized (trimmed, empty names filled,
///   duplicates suffixed).
/// - A row whose field count differs from the header's, or that does not decode under the
///   detected encoding, is skipped.
/// - I/O errors are terminal.
pub struct RowBatches<R> {
    reader: csv::Reader<R>,
    encoding: TextEncoding,
    headers: Vec<String>,
    batch_size: usize,
    record: ByteRecord,
    exhausted: bool,
}

impl RowBatches<File> {
    /// Open `path` with the detected delimiter and encoding.
    pub fn open(path: impl AsRef<Path>, format: DetectedFormat, batch_size: usize) -> LoadResult<Self> {
        Self::from_reader(File::open(path)?, format, batch_size)
    }
}

impl<R: Read> RowBatches<R> {
    /// Wrap an existing reader.
    ///
    /// # Panics
    ///
    /// Panics if `batch_size == 0`.
    pub fn from_reader(rdr: R, format: DetectedFormat, batch_size: usize) -> LoadResult<Self> {
        assert!(batch_size > 0, "batch_size must be > 0");

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .delimiter(format.delimiter)
            .from_reader(rdr);

        let raw_headers: Vec<String> = reader
            .byte_headers()?
            .iter()
            .map(|field| {
                format
                    .encoding
                    .decode(field)
                    .map(|s| s.into_owned())
                    .unwrap_or_else(|| String::from_utf8_lossy(field).into_owned())
            })
            .collect();

        let headers = normalize_headers(&raw_headers);
        Ok(Self {
            reader,
            encoding: format.encoding,
            exhausted: headers.is_empty(),
            headers,
            batch_size,
            record: ByteRecord::new(),
        })
    }

    /// Normalized header names.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Read the next batch: the well-formed rows among the next `batch_size` source rows.
    ///
    /// Returns `Ok(None)` once the source is exhausted. A returned batch is empty when every
    /// row read for it was malformed.
    pub fn next_batch(&mut self) -> LoadResult<Option<RowBatch>> {
        if self.exhausted {
            return Ok(None);
        }

        let mut batch = Vec::with_capacity(self.batch_size.min(1_024));
        let mut read = 0usize;
        while read < self.batch_size {
            match self.reader.read_byte_record(&mut self.record) {
                Ok(true) => {
                    read += 1;
                    if let Ok(row) = self.decode_row() {
                        batch.push(row);
                    }
                }
                Ok(false) => {
                    self.exhausted = true;
                    break;
                }
                Err(err) if err.is_io_error() => return Err(err.into()),
                // Parse errors drop the row like any other malformed row.
                Err(_) => read += 1,
            }
        }

        if read == 0 {
            return Ok(None);
        }
        Ok(Some(batch))
    }

    fn decode_row(&self) -> Result<Vec<String>, MalformedRow> {
        if self.record.len() != self.headers.len() {
            return Err(MalformedRow::FieldCount);
        }
        self.record
            .iter()
            .map(|field| {
                self.encoding
                    .decode(field)
                    .map(|s| s.into_owned())
                    .ok_or(MalformedRow::Undecodable)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comma_utf8() -> DetectedFormat {
        DetectedFormat {
            delimiter: b',',
            encoding: TextEncoding::Utf8,
        }
    }

    #[test]
    fn yields_bounded_batches_in_source_order() {
        let input = "id,name\n1,a\n2,b\n3,c\n4,d\n5,e\n";
        let mut rdr = RowBatches::from_reader(input.as_bytes(), comma_utf8(), 2).unwrap();
        assert_eq!(rdr.headers(), ["id", "name"]);

        let mut sizes = Vec::new();
        let mut ids = Vec::new();
        while let Some(batch) = rdr.next_batch().unwrap() {
            sizes.push(batch.len());
            ids.extend(batch.into_iter().map(|row| row[0].clone()));
        }
        assert_eq!(sizes, vec![2, 2, 1]);
        assert_eq!(ids, vec!["1", "2", "3", "4", "5"]);
    }

    #[test]
    fn skips_rows_with_wrong_field_count() {
        let input = "a,b,c\n1,2,3\n1,2\n1,2,3,4\n4,5,6\n";
        let mut rdr = RowBatches::from_reader(input.as_bytes(), comma_utf8(), 100).unwrap();
        let batch = rdr.next_batch().unwrap().unwrap();
        assert_eq!(batch, vec![vec!["1", "2", "3"], vec!["4", "5", "6"]]);
        assert!(rdr.next_batch().unwrap().is_none());
    }

    #[test]
    fn skips_rows_that_do_not_decode() {
        let input: &[u8] = b"a,b\n1,caf\xE9\n2,ok\n";
        let mut rdr = RowBatches::from_reader(input, comma_utf8(), 100).unwrap();
        let batch = rdr.next_batch().unwrap().unwrap();
        assert_eq!(batch, vec![vec!["2", "ok"]]);
    }

    #[test]
    fn all_malformed_batch_is_empty_then_next_batch_continues() {
        let input = "a,b\nx\ny\n1,2\n";
        let mut rdr = RowBatches::from_reader(input.as_bytes(), comma_utf8(), 2).unwrap();
        assert_eq!(rdr.next_batch().unwrap(), Some(Vec::new()));
        assert_eq!(rdr.next_batch().unwrap(), Some(vec![vec!["1".to_string(), "2".to_string()]]));
        assert_eq!(rdr.next_batch().unwrap(), None);
    }

    #[test]
    fn header_only_and_empty_inputs_have_no_batches() {
        let mut rdr = RowBatches::from_reader("a,b\n".as_bytes(), comma_utf8(), 10).unwrap();
        assert_eq!(rdr.next_batch().unwrap(), None);

        let mut rdr = RowBatches::from_reader("".as_bytes(), comma_utf8(), 10).unwrap();
        assert!(rdr.headers().is_empty());
        assert_eq!(rdr.next_batch().unwrap(), None);
    }

    #[test]
    fn decodes_latin1_fields() {
        let input: &[u8] = b"nome;cidade\nJos\xE9;S\xE3o Paulo\n";
        let format = DetectedFormat {
            delimiter: b';',
            encoding: TextEncoding::Latin1,
        };
        let mut rdr = RowBatches::from_reader(input, format, 10).unwrap();
        let batch = rdr.next_batch().unwrap().unwrap();
        assert_eq!(batch, vec![vec!["José", "São Paulo"]]);
    }
}
