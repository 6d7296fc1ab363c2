//! Delimiter and encoding detection.
//!
//! The header line is decoded under each candidate encoding in turn; the first candidate that
//! decodes cleanly is used to pick a delimiter by counting candidate characters outside quoted
//! regions.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use tracing::debug;

use crate::error::{LoadError, LoadResult};

use super::encoding::TextEncoding;

/// Upper bound on bytes read while looking for the end of the header line.
pub const MAX_SNIFF_BYTES: u64 = 64 * 1024;

/// Delimiters considered, in tie-break order.
pub const DELIMITER_CANDIDATES: [u8; 4] = [b',', b';', b'\t', b'|'];

/// Delimiter and encoding detected for one source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectedFormat {
    /// Field separator byte.
    pub delimiter: u8,
    /// Encoding under which the header decoded.
    pub encoding: TextEncoding,
}

/// Detect the delimiter and encoding of `path`, trying `encodings` in order.
pub fn detect(path: impl AsRef<Path>, encodings: &[TextEncoding]) -> LoadResult<DetectedFormat> {
    let path = path.as_ref();
    let header = read_first_line(File::open(path)?, MAX_SNIFF_BYTES)?;

    match sniff_line(&header.bytes, header.truncated, encodings) {
        Some(format) => {
            debug!(
                path = %path.display(),
                delimiter = %char::from(format.delimiter).escape_default(),
                encoding = %format.encoding,
                "detected format"
            );
            Ok(format)
        }
        None => Err(LoadError::NoValidEncoding {
            path: path.to_path_buf(),
        }),
    }
}

/// Detect a format from a complete header line (terminator excluded). `None` when every
/// candidate encoding faults.
pub fn detect_from_header(header: &[u8], encodings: &[TextEncoding]) -> Option<DetectedFormat> {
    sniff_line(header, false, encodings)
}

fn sniff_line(header: &[u8], truncated: bool, encodings: &[TextEncoding]) -> Option<DetectedFormat> {
    encodings.iter().find_map(|&encoding| {
        let line = if truncated {
            encoding.decode_truncated_header(header)?
        } else {
            encoding.decode_header(header)?
        };
        Some(DetectedFormat {
            delimiter: infer_delimiter(&line),
            encoding,
        })
    })
}

/// Pick the most frequent unquoted candidate delimiter. A line with none of them is a
/// single-column header and gets a comma.
pub fn infer_delimiter(line: &str) -> u8 {
    let mut counts = [0usize; DELIMITER_CANDIDATES.len()];
    let mut in_quotes = false;
    for b in line.bytes() {
        if b == b'"' {
            in_quotes = !in_quotes;
            continue;
        }
        if in_quotes {
            continue;
        }
        if let Some(idx) = DELIMITER_CANDIDATES.iter().position(|&d| d == b) {
            counts[idx] += 1;
        }
    }

    // `max_by_key` keeps the last maximum; iterate in reverse so ties go to the earlier candidate.
    DELIMITER_CANDIDATES
        .iter()
        .zip(counts)
        .rev()
        .filter(|(_, n)| *n > 0)
        .max_by_key(|(_, n)| *n)
        .map(|(&d, _)| d)
        .unwrap_or(b',')
}

struct HeaderLine {
    bytes: Vec<u8>,
    /// The read limit was reached before any line terminator.
    truncated: bool,
}

/// Read the first line, ended by `\n`, `\r\n` or a lone `\r`, without its terminator.
fn read_first_line(reader: impl Read, limit: u64) -> std::io::Result<HeaderLine> {
    let mut bytes = Vec::new();
    BufReader::new(reader.take(limit)).read_until(b'\n', &mut bytes)?;
    match bytes.iter().position(|&b| b == b'\r' || b == b'\n') {
        Some(end) => {
            bytes.truncate(end);
            Ok(HeaderLine {
                bytes,
                truncated: false,
            })
        }
        None => {
            let truncated = bytes.len() as u64 >= limit;
            Ok(HeaderLine { bytes, truncated })
        }
    }
}
