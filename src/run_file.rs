//! On-disk run file format.
//!
//! A run is a sequence of length-framed records, read back strictly in the
//! order they were written:
//!
//! ```text
//! record := digest(40 bytes ASCII) seq(u64 LE) field_count(u32 LE) field*
//! field   := len(u32 LE) bytes(len)
//! ```

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::digest::DIGEST_LEN;
use crate::error::{Result, SortError};

/// A single row keyed by its digest and carrying the caller's recency tiebreak.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    pub digest: String,
    pub row: Vec<String>,
    pub sequence: u64,
}

impl Record {
    pub fn new(digest: String, row: Vec<String>, sequence: u64) -> Record {
        Record { digest, row, sequence }
    }
}

/// Appends length-framed records to a single run file.
pub struct RunWriter {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl RunWriter {
    pub fn create(path: PathBuf) -> Result<RunWriter> {
        let file = File::create(&path)?;
        Ok(RunWriter { path, writer: BufWriter::new(file) })
    }

    pub fn write(&mut self, record: &Record) -> Result<()> {
        if record.digest.len() != DIGEST_LEN || !record.digest.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(SortError::CorruptRun(format!(
                "attempted to write malformed digest: {}",
                record.digest
            )));
        }
        self.writer.write_all(record.digest.as_bytes())?;
        self.writer.write_all(&record.sequence.to_le_bytes())?;
        self.writer.write_all(&(record.row.len() as u32).to_le_bytes())?;
        for field in &record.row {
            let bytes = field.as_bytes();
            self.writer.write_all(&(bytes.len() as u32).to_le_bytes())?;
            self.writer.write_all(bytes)?;
        }
        Ok(())
    }

    pub fn finish(mut self) -> Result<PathBuf> {
        self.writer.flush()?;
        Ok(self.path)
    }
}

/// Reads length-framed records back from a run file, sequentially.
pub struct RunReader {
    reader: BufReader<File>,
}

impl RunReader {
    pub fn open(path: &Path) -> Result<RunReader> {
        let file = File::open(path)?;
        Ok(RunReader { reader: BufReader::new(file) })
    }

    /// Read the next record, or `None` at end of file.
    pub fn read_next(&mut self) -> Result<Option<Record>> {
        let mut digest_buf = [0u8; DIGEST_LEN];
        match read_exact_or_eof(&mut self.reader, &mut digest_buf)? {
            false => return Ok(None),
            true => {}
        }
        let digest = String::from_utf8(digest_buf.to_vec())
            .map_err(|e| SortError::CorruptRun(format!("non-utf8 digest: {e}")))?;
        if !digest.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(SortError::CorruptRun(format!("non-hex digest: {digest}")));
        }

        let mut seq_buf = [0u8; 8];
        self.reader.read_exact(&mut seq_buf)
            .map_err(|e| SortError::CorruptRun(format!("truncated sequence: {e}")))?;
        let sequence = u64::from_le_bytes(seq_buf);

        let mut count_buf = [0u8; 4];
        self.reader.read_exact(&mut count_buf)
            .map_err(|e| SortError::CorruptRun(format!("truncated field count: {e}")))?;
        let field_count = u32::from_le_bytes(count_buf) as usize;

        let mut row = Vec::with_capacity(field_count);
        for _ in 0..field_count {
            let mut len_buf = [0u8; 4];
            self.reader.read_exact(&mut len_buf)
                .map_err(|e| SortError::CorruptRun(format!("truncated field length: {e}")))?;
            let len = u32::from_le_bytes(len_buf) as usize;
            let mut field_buf = vec![0u8; len];
            self.reader.read_exact(&mut field_buf)
                .map_err(|e| SortError::CorruptRun(format!("truncated field bytes: {e}")))?;
            let field = String::from_utf8(field_buf)
                .map_err(|e| SortError::CorruptRun(format!("non-utf8 field: {e}")))?;
            row.push(field);
        }

        Ok(Some(Record::new(digest, row, sequence)))
    }
}

/// Like `Read::read_exact`, but reports a clean EOF (no bytes consumed yet)
/// as `Ok(false)` instead of an error, while still treating a partial read
/// as corruption.
fn read_exact_or_eof(reader: &mut impl Read, buf: &mut [u8]) -> Result<bool> {
    let mut total = 0;
    while total < buf.len() {
        let n = reader.read(&mut buf[total..])?;
        if n == 0 {
            if total == 0 {
                return Ok(false);
            }
            return Err(SortError::CorruptRun("truncated record header".to_string()));
        }
        total += n;
    }
    Ok(true)
}
