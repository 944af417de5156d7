//! K-way streaming merge of sorted run sources, with optional per-digest
//! retention cap.
//!
//! Grounded on the teacher's `UnmergedChunkFile` / `BinaryHeap<Reverse<_>>`
//! merge in `sort.rs`: pop the minimum head, yield it, refill from its
//! origin stream, repeat. Here the ordering key is `(digest, sequence)`
//! instead of a `LineRecord`, and a stream is either a run file on disk or
//! the sorter's still-in-memory tail.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::path::PathBuf;

use crate::error::Result;
use crate::run_file::{Record, RunReader};

/// Anything that can hand back its records in ascending-digest,
/// descending-sequence order, one at a time.
pub trait RecordSource {
    fn next_record(&mut self) -> Result<Option<Record>>;
}

/// A run file opened for sequential reads.
pub struct RunSource {
    reader: RunReader,
}

impl RunSource {
    pub fn open(path: &PathBuf) -> Result<RunSource> {
        Ok(RunSource { reader: RunReader::open(path)? })
    }
}

impl RecordSource for RunSource {
    fn next_record(&mut self) -> Result<Option<Record>> {
        self.reader.read_next()
    }
}

/// A pre-sorted in-memory vector consumed front-to-back, for the buffer's
/// unflushed tail when no runs were ever spilled.
pub struct MemorySource {
    records: std::vec::IntoIter<Record>,
}

impl MemorySource {
    pub fn new(mut records: Vec<Record>) -> MemorySource {
        crate::buffer::sort_records(&mut records);
        MemorySource { records: records.into_iter() }
    }
}

impl RecordSource for MemorySource {
    fn next_record(&mut self) -> Result<Option<Record>> {
        Ok(self.records.next())
    }
}

struct HeapEntry {
    digest: String,
    sequence: u64,
    stream_id: usize,
    record: Record,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp_key() == other.cmp_key()
    }
}
impl Eq for HeapEntry {}

impl HeapEntry {
    fn cmp_key(&self) -> (&str, Reverse<u64>, usize) {
        (self.digest.as_str(), Reverse(self.sequence), self.stream_id)
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cmp_key().cmp(&other.cmp_key())
    }
}

/// Lazily merges multiple `RecordSource`s into final sort order using a
/// min-heap, with `BinaryHeap<Reverse<HeapEntry>>` standing in for a true
/// min-heap the same way the teacher's code flips comparisons to make its
/// max-heap behave as a min-heap.
pub struct KWayMerge {
    heap: BinaryHeap<Reverse<HeapEntry>>,
    sources: Vec<Box<dyn RecordSource>>,
}

impl KWayMerge {
    pub fn new(mut sources: Vec<Box<dyn RecordSource>>) -> Result<KWayMerge> {
        let mut heap = BinaryHeap::new();
        for (stream_id, source) in sources.iter_mut().enumerate() {
            if let Some(record) = source.next_record()? {
                heap.push(Reverse(HeapEntry {
                    digest: record.digest.clone(),
                    sequence: record.sequence,
                    stream_id,
                    record,
                }));
            }
        }
        Ok(KWayMerge { heap, sources })
    }

    /// Pop and return the next record in final order, refilling from its
    /// origin stream.
    pub fn next(&mut self) -> Result<Option<Record>> {
        let Reverse(entry) = match self.heap.pop() {
            Some(e) => e,
            None => return Ok(None),
        };
        let stream_id = entry.stream_id;
        if let Some(next_record) = self.sources[stream_id].next_record()? {
            self.heap.push(Reverse(HeapEntry {
                digest: next_record.digest.clone(),
                sequence: next_record.sequence,
                stream_id,
                record: next_record,
            }));
        }
        Ok(Some(entry.record))
    }
}

/// Wraps a `KWayMerge` and applies the dedup cap: at most
/// `max_records_per_key` records are yielded per digest, the highest
/// sequences first (guaranteed by the heap's `Reverse(sequence)` secondary
/// key).
pub struct DedupMerge {
    merge: KWayMerge,
    max_records_per_key: usize,
    current_digest: Option<String>,
    current_count: usize,
}

impl DedupMerge {
    pub fn new(merge: KWayMerge, max_records_per_key: usize) -> DedupMerge {
        DedupMerge { merge, max_records_per_key, current_digest: None, current_count: 0 }
    }

    pub fn next(&mut self) -> Result<Option<Record>> {
        loop {
            let record = match self.merge.next()? {
                Some(r) => r,
                None => return Ok(None),
            };
            if self.current_digest.as_deref() != Some(record.digest.as_str()) {
                self.current_digest = Some(record.digest.clone());
                self.current_count = 0;
            }
            if self.max_records_per_key == 0 || self.current_count < self.max_records_per_key {
                self.current_count += 1;
                return Ok(Some(record));
            }
            // over cap for this digest: discard and continue to the next record
        }
    }
}
