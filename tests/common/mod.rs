use row_sort::run_file::Record;
use row_sort::sorter::Batch;

/// Collect every `[digest, row]` pair from an `each_batch` iterator into a
/// flat vector, in the order yielded.
#[allow(dead_code)]
pub fn collect_batches(iter: impl Iterator<Item = row_sort::error::Result<Batch>>) -> Vec<(String, Vec<String>)> {
    let mut out = Vec::new();
    for batch in iter {
        out.extend(batch.unwrap());
    }
    out
}

#[allow(dead_code)]
pub fn row(fields: &[&str]) -> Vec<String> {
    fields.iter().map(|s| s.to_string()).collect()
}

#[allow(dead_code)]
pub fn is_non_decreasing_by_digest(records: &[(String, Vec<String>)]) -> bool {
    records.windows(2).all(|w| w[0].0 <= w[1].0)
}

#[allow(dead_code)]
pub fn dummy_record(digest: &str, seq: u64) -> Record {
    Record::new(digest.to_string(), vec![digest.to_string()], seq)
}
