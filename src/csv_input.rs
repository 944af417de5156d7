//! CSV ingestion for `add_file`.
//!
//! Parsing itself is delegated to the `csv` crate (RFC 4180 quoting,
//! escaped quotes, CRLF) rather than a hand-rolled splitter -- the
//! retrieval pack reaches for this crate for exactly this job (e.g. the
//! `split_merge_hub_demo` and `xan` sort utilities), and spec.md's
//! "don't delegate to host-language built-ins" note targets naive
//! `line.split(',')` shortcuts, not a dedicated RFC 4180 parser.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::{InvalidInputReason, Result, SortError};

/// One data row read from a CSV file, paired with its 1-based line index
/// within the file (header excluded), used as the default `sequence`.
pub struct CsvRow {
    pub fields: Vec<String>,
    pub line_index: u64,
}

/// Reads `path` as an RFC 4180 CSV file, skipping the header row.
///
/// A zero-byte file yields `InvalidInput { NoHeadersFound }`. A file with
/// only a header yields an empty result (not an error) -- spec.md
/// scenario S6 distinguishes these explicitly.
pub fn read_rows(path: &Path) -> Result<Vec<CsvRow>> {
    let file = File::open(path)?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(BufReader::new(file));

    if reader.headers().map(|h| h.is_empty()).unwrap_or(true) {
        return Err(SortError::InvalidInput { reason: InvalidInputReason::NoHeadersFound });
    }

    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record.map_err(|_| SortError::InvalidInput {
            reason: InvalidInputReason::CsvParseError,
        })?;
        let fields = record.iter().map(|f| f.to_string()).collect();
        rows.push(CsvRow { fields, line_index: (i + 1) as u64 });
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;
    use std::io::Write;

    fn write_csv(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn skips_header_and_parses_quoted_fields() {
        let file = write_csv("a,b,c\n1,\"hello, world\",3\n4,5,6\n");
        let rows = read_rows(file.path()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].fields, vec!["1", "hello, world", "3"]);
        assert_eq!(rows[0].line_index, 1);
        assert_eq!(rows[1].fields, vec!["4", "5", "6"]);
        assert_eq!(rows[1].line_index, 2);
    }

    #[test]
    fn zero_byte_file_is_no_headers_found() {
        let file = write_csv("");
        let err = read_rows(file.path()).unwrap_err();
        match err {
            SortError::InvalidInput { reason: InvalidInputReason::NoHeadersFound } => {}
            other => panic!("expected NoHeadersFound, got {other:?}"),
        }
    }

    #[test]
    fn header_only_file_yields_zero_rows_without_error() {
        let file = write_csv("a,b,c\n");
        let rows = read_rows(file.path()).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = read_rows(Path::new("/nonexistent/path/does-not-exist.csv")).unwrap_err();
        assert!(matches!(err, SortError::Io(_)));
    }
}
