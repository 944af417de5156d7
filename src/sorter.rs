//! The sort façade: the stateful controller described in spec §4.5.
//!
//! State machine: `Configuring -> Accumulating -> Sorted`. Once `Sorted`,
//! `each_batch` and `write_binary_postgres_file` may each be called any
//! number of times (both just read the already-sorted output); what spec
//! calls `Iterating`/`EncodedCopy` are not distinct from `Sorted` in this
//! implementation since nothing in the contract forbids re-reading. Any
//! accumulate operation (`add_row`/`add_file`) after `Sorted` fails with
//! `StateError`, as does any operation on a Sorter that previously failed.

use std::cmp::max;
use std::path::PathBuf;

use chrono::Utc;
use rlimit::{getrlimit, setrlimit, Resource};
use tempfile::TempDir;

use crate::buffer::RecordBuffer;
use crate::config::{Config, DEFAULT_BUFFER_MB};
use crate::copy_binary;
use crate::csv_input;
use crate::digest::digest;
use crate::error::{Result, SortError};
use crate::error_log::ErrorLog;
use crate::merge::{DedupMerge, KWayMerge, MemorySource, RecordSource, RunSource};
use crate::run_file::{Record, RunWriter};
use crate::validation::{check, failure_message, ColumnId, ColumnRule, Rule};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum State {
    Configuring,
    Accumulating,
    Sorted,
    Failed,
}

/// The outcome of a single `add_row` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Admitted,
    Rejected,
}

/// Stats returned by `sort!`, per spec §4.5.
#[derive(Debug, Clone, Copy, Default)]
pub struct Stats {
    pub total_rows: u64,
    pub total_rows_processed: u64,
    pub failed_url_error_count: u64,
    pub failed_protocol_error_count: u64,
}

/// Where the final sorted-and-deduped output lives once `sort!` has run.
enum SortedOutput {
    /// Buffer never spilled: the whole run fit in memory and was deduped
    /// there, per spec's "otherwise sort in memory and stay in memory".
    Memory(Vec<Record>),
    /// One or more runs were spilled; the final k-way merge was streamed
    /// into a single consolidated run file so repeated `each_batch` /
    /// `write_binary_postgres_file` calls stay bounded-memory.
    File(PathBuf),
}

/// One batch yielded by `each_batch`: `[digest, row]` pairs.
pub type Batch = Vec<(String, Vec<String>)>;

/// Iterates the sorted output in batches of at most `n` records. A fresh
/// `BatchIter` is created on every `each_batch` call, so iteration always
/// restarts from the beginning.
pub struct BatchIter {
    source: BatchSource,
    batch_size: usize,
}

enum BatchSource {
    Memory(std::vec::IntoIter<Record>),
    File(Box<dyn RecordSource>),
}

impl Iterator for BatchIter {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Result<Batch>> {
        let mut batch = Vec::with_capacity(self.batch_size);
        loop {
            let next_record = match &mut self.source {
                BatchSource::Memory(iter) => Ok(iter.next()),
                BatchSource::File(source) => source.next_record(),
            };
            match next_record {
                Ok(Some(record)) => {
                    batch.push((record.digest, record.row));
                    if batch.len() >= self.batch_size {
                        return Some(Ok(batch));
                    }
                }
                Ok(None) => {
                    return if batch.is_empty() { None } else { Some(Ok(batch)) };
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

/// The sort façade.
pub struct Sorter {
    config: Config,
    state: State,
    buffer: RecordBuffer,
    tmp_dir: Option<TempDir>,
    run_paths: Vec<PathBuf>,
    sequence_counter: u64,
    stats: Stats,
    error_log: Option<ErrorLog>,
    sorted_output: Option<SortedOutput>,
}

impl Sorter {
    /// Construct a new Sorter in the `Configuring` state.
    pub fn new(
        source_id: impl Into<String>,
        source_key: impl Into<String>,
        key_columns: Vec<usize>,
        geo_columns: Option<[usize; 2]>,
    ) -> Sorter {
        Self::with_buffer_mb(source_id, source_key, key_columns, geo_columns, DEFAULT_BUFFER_MB)
    }

    pub fn with_buffer_mb(
        source_id: impl Into<String>,
        source_key: impl Into<String>,
        key_columns: Vec<usize>,
        geo_columns: Option<[usize; 2]>,
        buffer_mb: u64,
    ) -> Sorter {
        let config = Config::new(source_id.into(), source_key.into(), key_columns, geo_columns, buffer_mb);
        Sorter {
            buffer: RecordBuffer::new(config.buffer_bytes),
            config,
            state: State::Configuring,
            tmp_dir: None,
            run_paths: Vec::new(),
            sequence_counter: 0,
            stats: Stats::default(),
            error_log: None,
            sorted_output: None,
        }
    }

    /// Per-digest retention cap in dedupe mode. Defaults to 200.
    pub fn with_max_records_per_key(&mut self, max_records_per_key: usize) -> &mut Self {
        self.config.max_records_per_key = max_records_per_key;
        self
    }

    /// Install the full validation schema, replacing any previous one.
    pub fn set_validation_schema(&mut self, rules: Vec<ColumnRule>) -> Result<()> {
        self.require_state_at_most(State::Accumulating, "set_validation_schema")?;
        self.config.validation_schema = rules;
        Ok(())
    }

    /// Install or replace the rule for a single column, padding shorter
    /// schemas with `Rule::None` as needed.
    pub fn enable_validation(&mut self, column: usize, rule: Rule) -> Result<()> {
        self.require_state_at_most(State::Accumulating, "enable_validation")?;
        while self.config.validation_schema.len() <= column {
            self.config.validation_schema.push(ColumnRule::new(Rule::None));
        }
        self.config.validation_schema[column].rule = rule;
        Ok(())
    }

    /// Enable an append-only CSV error log at `path`. Created immediately.
    pub fn with_error_log(&mut self, path: PathBuf) -> Result<&mut Self> {
        self.require_state_at_most(State::Accumulating, "with_error_log")?;
        self.error_log = Some(ErrorLog::create(&path)?);
        self.config.error_log_path = Some(path);
        Ok(self)
    }

    /// Validate and admit a single row. `sequence` defaults to a monotone
    /// counter local to this Sorter.
    pub fn add_row(&mut self, row: Vec<String>, sequence: Option<u64>) -> Result<AddOutcome> {
        self.require_state_at_most(State::Accumulating, "add_row")?;

        // Every row seen by add_row/add_file counts toward total_rows_processed,
        // admitted or not (spec §4.5, scenario S3).
        let row_ordinal = self.stats.total_rows_processed + 1;
        self.stats.total_rows_processed += 1;

        if let Some(rejection) = self.validate_row(&row, row_ordinal)? {
            return Ok(rejection);
        }

        let seq = sequence.unwrap_or_else(|| self.next_sequence());
        let result = self.admit(row, seq);
        if result.is_err() {
            self.state = State::Failed;
        }
        result?;
        Ok(AddOutcome::Admitted)
    }

    /// Parse a CSV file and call `add_row` for each data row, using the
    /// row's 1-based line index (header excluded) as its sequence.
    pub fn add_file(&mut self, path: &std::path::Path) -> Result<()> {
        self.require_state_at_most(State::Accumulating, "add_file")?;
        let rows = csv_input::read_rows(path).map_err(|e| {
            self.state = State::Failed;
            e
        })?;
        for row in rows {
            self.add_row(row.fields, Some(row.line_index))?;
        }
        Ok(())
    }

    fn validate_row(&mut self, row: &[String], row_ordinal: u64) -> Result<Option<AddOutcome>> {
        for i in 0..self.config.validation_schema.len() {
            let Some(value) = row.get(i) else { continue };
            let failure = check(&self.config.validation_schema[i].rule, value).err();
            if let Some(kind) = failure {
                match kind {
                    crate::validation::RuleKind::Url => self.stats.failed_url_error_count += 1,
                    crate::validation::RuleKind::Protocol => self.stats.failed_protocol_error_count += 1,
                }
                let column = match &self.config.validation_schema[i].name {
                    Some(name) => ColumnId::Named(name.clone()),
                    None => ColumnId::Index(i + 1),
                };
                let message = failure_message(kind, value, &column);
                if let Some(log) = &mut self.error_log {
                    log.record(&message, row_ordinal, &column)?;
                }
                return Ok(Some(AddOutcome::Rejected));
            }
        }
        Ok(None)
    }

    fn admit(&mut self, row: Vec<String>, sequence: u64) -> Result<()> {
        let row_digest = digest(&row, &self.config.key_columns)?;
        let record = Record::new(row_digest, row, sequence);
        let should_flush = self.buffer.append(record);
        self.state = State::Accumulating;
        if should_flush {
            self.flush_buffer()?;
        }
        Ok(())
    }

    fn next_sequence(&mut self) -> u64 {
        self.sequence_counter += 1;
        self.sequence_counter
    }

    fn ensure_tmp_dir(&mut self) -> Result<&std::path::Path> {
        if self.tmp_dir.is_none() {
            self.tmp_dir = Some(tempfile::Builder::new().prefix("row-sort-").tempdir()?);
        }
        Ok(self.tmp_dir.as_ref().unwrap().path())
    }

    fn flush_buffer(&mut self) -> Result<()> {
        let run_index = self.run_paths.len();
        let dir = self.ensure_tmp_dir()?.to_path_buf();
        let path = dir.join(format!("run-{run_index}"));
        let written = self.buffer.flush_to(path)?;
        log::info!("spilled run {run_index} to {}", written.display());
        self.run_paths.push(written);
        Ok(())
    }

    /// Finalize the sort: flush, merge, dedup, and compute stats.
    /// Transitions to `Sorted`.
    pub fn sort(&mut self) -> Result<Stats> {
        self.require_state_at_most(State::Accumulating, "sort")?;

        let result = self.finalize();
        if result.is_err() {
            self.state = State::Failed;
        } else {
            self.state = State::Sorted;
            if let Some(log) = &mut self.error_log {
                log.flush()?;
            }
        }
        result
    }

    fn finalize(&mut self) -> Result<Stats> {
        if self.run_paths.is_empty() {
            let mut records = self.buffer.take_sorted();
            let deduped = dedupe_in_memory(&mut records, self.config.max_records_per_key);
            self.stats.total_rows = deduped.len() as u64;
            self.sorted_output = Some(SortedOutput::Memory(deduped));
        } else {
            if !self.buffer.is_empty() {
                self.flush_buffer()?;
            }
            let _fd_headroom = FdHeadroomGuard::raise(self.run_paths.len())?;

            let mut sources: Vec<Box<dyn RecordSource>> = Vec::with_capacity(self.run_paths.len());
            for path in &self.run_paths {
                sources.push(Box::new(RunSource::open(path)?));
            }
            let merge = KWayMerge::new(sources)?;
            let mut dedup = DedupMerge::new(merge, self.config.max_records_per_key);

            let dir = self.ensure_tmp_dir()?.to_path_buf();
            let final_path = dir.join("final-merged");
            let mut writer = RunWriter::create(final_path.clone())?;
            let mut count = 0u64;
            while let Some(record) = dedup.next()? {
                writer.write(&record)?;
                count += 1;
            }
            writer.finish()?;
            self.stats.total_rows = count;
            self.sorted_output = Some(SortedOutput::File(final_path));
            // _fd_headroom drops here (or on any `?` above), restoring the limit either way.
        }
        Ok(self.stats)
    }

    /// Stats as of the last `sort()` call.
    pub fn stats(&self) -> Stats {
        self.stats
    }

    /// Iterate the sorted output in successive batches of at most `n`
    /// records. Restarts from the beginning every call.
    pub fn each_batch(&self, n: usize) -> Result<BatchIter> {
        self.require_sorted("each_batch")?;
        let source = match self.sorted_output.as_ref().unwrap() {
            SortedOutput::Memory(records) => BatchSource::Memory(records.clone().into_iter()),
            SortedOutput::File(path) => BatchSource::File(Box::new(RunSource::open(path)?)),
        };
        Ok(BatchIter { source, batch_size: n.max(1) })
    }

    /// Encode the sorted output as a PostgreSQL COPY BINARY stream to `path`.
    pub fn write_binary_postgres_file(&self, path: &std::path::Path) -> Result<()> {
        self.require_sorted("write_binary_postgres_file")?;
        let file = std::fs::File::create(path)?;
        let mut writer = std::io::BufWriter::new(file);
        copy_binary::write_header(&mut writer)?;

        let now = Utc::now();
        let mut emit = |record: &Record| -> Result<()> {
            copy_binary::write_tuple(
                &mut writer,
                &self.config.source_key,
                &record.digest,
                &record.row,
                self.config.geo_columns,
                now,
            )
        };

        match self.sorted_output.as_ref().unwrap() {
            SortedOutput::Memory(records) => {
                for record in records {
                    emit(record)?;
                }
            }
            SortedOutput::File(path) => {
                let mut source = RunSource::open(path)?;
                while let Some(record) = source.next_record()? {
                    emit(&record)?;
                }
            }
        }

        copy_binary::write_trailer(&mut writer)?;
        use std::io::Write;
        writer.flush()?;
        Ok(())
    }

    fn require_state_at_most(&self, _max: State, operation: &'static str) -> Result<()> {
        match self.state {
            State::Configuring | State::Accumulating => Ok(()),
            State::Sorted | State::Failed => {
                Err(SortError::State { state: state_name(self.state), operation })
            }
        }
    }

    fn require_sorted(&self, operation: &'static str) -> Result<()> {
        if self.state == State::Sorted {
            Ok(())
        } else {
            Err(SortError::State { state: state_name(self.state), operation })
        }
    }
}

/// Raises the process's NOFILE soft limit to cover one handle per run file
/// plus headroom for the lifetime of the merge, mirroring the teacher's
/// `Sort::sort` rlimit dance for its own fan-in merge. Restores the
/// original (soft, hard) pair on drop -- including on an early return from
/// a failed merge -- so a mid-merge error can never leak a raised limit.
struct FdHeadroomGuard {
    original: (u64, u64),
}

impl FdHeadroomGuard {
    fn raise(n_run_files: usize) -> Result<FdHeadroomGuard> {
        let (current_soft, current_hard) = getrlimit(Resource::NOFILE)?;
        let new_soft = max((n_run_files + 256) as u64, current_soft);
        if new_soft > current_soft {
            log::info!("raising rlimit NOFILE soft limit from {current_soft} to {new_soft} for {n_run_files} run files");
            setrlimit(Resource::NOFILE, new_soft, current_hard)?;
        }
        Ok(FdHeadroomGuard { original: (current_soft, current_hard) })
    }
}

impl Drop for FdHeadroomGuard {
    fn drop(&mut self) {
        let (soft, hard) = self.original;
        if let Err(e) = setrlimit(Resource::NOFILE, soft, hard) {
            log::warn!("failed to restore rlimit NOFILE soft limit to {soft}: {e}");
        }
    }
}

fn state_name(state: State) -> &'static str {
    match state {
        State::Configuring => "Configuring",
        State::Accumulating => "Accumulating",
        State::Sorted => "Sorted",
        State::Failed => "Failed",
    }
}

/// Sorts and caps an in-memory record set the same way the run-file merge
/// path does, for the no-spill case.
fn dedupe_in_memory(records: &mut Vec<Record>, max_records_per_key: usize) -> Vec<Record> {
    crate::buffer::sort_records(records);
    if max_records_per_key == 0 {
        return std::mem::take(records);
    }
    let mut out = Vec::with_capacity(records.len());
    let mut current_digest: Option<String> = None;
    let mut count = 0usize;
    for record in records.drain(..) {
        if current_digest.as_deref() != Some(record.digest.as_str()) {
            current_digest = Some(record.digest.clone());
            count = 0;
        }
        if count < max_records_per_key {
            count += 1;
            out.push(record);
        }
    }
    out
}
