use row_sort::sorter::Sorter;

mod common;
use common::{collect_batches, row};

/// Scenario S4: 300 rows sharing one key, default cap of 200, newest
/// (highest sequence) survive.
#[test]
fn s4_dedup_caps_at_two_hundred_keeping_newest() {
    let mut sorter = Sorter::new("src", "key", vec![0], None);
    for seq in 0..300u64 {
        sorter.add_row(row(&["shared-key", &seq.to_string()]), Some(seq)).unwrap();
    }
    let stats = sorter.sort().unwrap();
    assert_eq!(stats.total_rows, 200);
    assert_eq!(stats.total_rows_processed, 300);

    let out = collect_batches(sorter.each_batch(50).unwrap());
    assert_eq!(out.len(), 200);
    let surviving: Vec<u64> = out.iter().map(|(_, r)| r[1].parse().unwrap()).collect();
    assert_eq!(*surviving.iter().min().unwrap(), 100);
    assert_eq!(*surviving.iter().max().unwrap(), 299);
}

/// A custom cap is honored instead of the default 200.
#[test]
fn custom_max_records_per_key_is_honored() {
    let mut sorter = Sorter::new("src", "key", vec![0], None);
    sorter.with_max_records_per_key(3);
    for seq in 0..10u64 {
        sorter.add_row(row(&["k", &seq.to_string()]), Some(seq)).unwrap();
    }
    let stats = sorter.sort().unwrap();
    assert_eq!(stats.total_rows, 3);
    let out = collect_batches(sorter.each_batch(10).unwrap());
    let surviving: Vec<u64> = out.iter().map(|(_, r)| r[1].parse().unwrap()).collect();
    assert_eq!(surviving, vec![9, 8, 7]);
}

/// A cap of zero disables dedup entirely: every row survives.
#[test]
fn zero_cap_disables_dedup() {
    let mut sorter = Sorter::new("src", "key", vec![0], None);
    sorter.with_max_records_per_key(0);
    for seq in 0..10u64 {
        sorter.add_row(row(&["k", &seq.to_string()]), Some(seq)).unwrap();
    }
    let stats = sorter.sort().unwrap();
    assert_eq!(stats.total_rows, 10);
}

/// Distinct keys each get their own independent cap budget.
#[test]
fn dedup_cap_is_independent_per_key() {
    let mut sorter = Sorter::new("src", "key", vec![0], None);
    sorter.with_max_records_per_key(2);
    for seq in 0..5u64 {
        sorter.add_row(row(&["a", &seq.to_string()]), Some(seq)).unwrap();
    }
    for seq in 0..5u64 {
        sorter.add_row(row(&["b", &seq.to_string()]), Some(seq)).unwrap();
    }
    let stats = sorter.sort().unwrap();
    assert_eq!(stats.total_rows, 4);
}

/// Dedup cap applies identically when the run spills to disk.
#[test]
fn dedup_cap_applies_across_spilled_runs() {
    let mut sorter = Sorter::with_buffer_mb("src", "key", vec![0], None, 0);
    sorter.with_max_records_per_key(5);
    for seq in 0..50u64 {
        sorter.add_row(row(&["shared", &seq.to_string()]), Some(seq)).unwrap();
    }
    let stats = sorter.sort().unwrap();
    assert_eq!(stats.total_rows, 5);
    let out = collect_batches(sorter.each_batch(10).unwrap());
    let surviving: Vec<u64> = out.iter().map(|(_, r)| r[1].parse().unwrap()).collect();
    assert_eq!(surviving, vec![49, 48, 47, 46, 45]);
}
