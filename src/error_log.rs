//! Optional append-only CSV error log written during validation.
//!
//! Layout fixed by spec §6:
//!
//! ```text
//! Error Message,Row,Column
//! <message>,<row_index_1based>,<column_identifier>
//! ```

use std::path::Path;

use crate::error::Result;
use crate::validation::ColumnId;

/// An append-only CSV writer for validation failures, held open for the
/// sorter's lifetime and flushed at `sort!`/teardown.
pub struct ErrorLog {
    writer: csv::Writer<std::fs::File>,
}

impl ErrorLog {
    pub fn create(path: &Path) -> Result<ErrorLog> {
        let file = std::fs::File::create(path)?;
        let mut writer = csv::WriterBuilder::new().from_writer(file);
        writer.write_record(["Error Message", "Row", "Column"])?;
        Ok(ErrorLog { writer })
    }

    pub fn record(&mut self, message: &str, row_index_1based: u64, column: &ColumnId) -> Result<()> {
        self.writer.write_record([message, &row_index_1based.to_string(), &column.to_string()])?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

impl From<csv::Error> for crate::error::SortError {
    fn from(e: csv::Error) -> Self {
        crate::error::SortError::Io(std::io::Error::new(std::io::ErrorKind::Other, e))
    }
}
