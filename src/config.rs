//! Sorter configuration: the knobs named in spec §6.

use std::path::PathBuf;

use crate::validation::ColumnRule;

pub(crate) const DEFAULT_BUFFER_MB: u64 = 100;
pub(crate) const DEFAULT_MAX_RECORDS_PER_KEY: usize = 200;

/// Configuration captured at `Sorter::new` time, plus the validation
/// schema and temp/error-log paths, which may be installed afterward.
#[derive(Clone)]
pub(crate) struct Config {
    pub(crate) source_id: String,
    pub(crate) source_key: String,
    pub(crate) key_columns: Vec<usize>,
    pub(crate) geo_columns: Option<[usize; 2]>,
    pub(crate) buffer_bytes: usize,
    pub(crate) max_records_per_key: usize,
    pub(crate) tmp_dir: Option<PathBuf>,
    pub(crate) validation_schema: Vec<ColumnRule>,
    pub(crate) error_log_path: Option<PathBuf>,
}

impl Config {
    pub(crate) fn new(
        source_id: String,
        source_key: String,
        key_columns: Vec<usize>,
        geo_columns: Option<[usize; 2]>,
        buffer_mb: u64,
    ) -> Config {
        Config {
            source_id,
            source_key,
            key_columns,
            geo_columns,
            buffer_bytes: (buffer_mb * 1_000_000) as usize,
            max_records_per_key: DEFAULT_MAX_RECORDS_PER_KEY,
            tmp_dir: None,
            validation_schema: Vec::new(),
            error_log_path: None,
        }
    }
}
