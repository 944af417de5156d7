use row_sort::sorter::{AddOutcome, Sorter};
use row_sort::validation::{ColumnRule, Rule};
use tempfile::tempdir;

mod common;
use common::row;

/// Scenario S3, reproduced literally: `["https://example.com"]` admitted,
/// `["test.com"]` rejected. `total_rows_processed` counts every row
/// `add_row` saw -- admitted and rejected alike -- so it comes out as 2,
/// not the admitted-only count of 1.
#[test]
fn s3_url_rule_rejects_and_counts_without_aborting() {
    let mut sorter = Sorter::new("src", "key", vec![0], None);
    sorter.set_validation_schema(vec![ColumnRule::new(Rule::Url)]).unwrap();

    let good = sorter.add_row(row(&["https://example.com"]), None).unwrap();
    let bad = sorter.add_row(row(&["test.com"]), None).unwrap();

    assert_eq!(good, AddOutcome::Admitted);
    assert_eq!(bad, AddOutcome::Rejected);

    let stats = sorter.sort().unwrap();
    assert_eq!(stats.total_rows, 1);
    assert_eq!(stats.total_rows_processed, 2);
    assert_eq!(stats.failed_url_error_count, 1);
    assert_eq!(stats.failed_protocol_error_count, 0);
}

/// An empty field passes any rule, including `url`, and is admitted.
#[test]
fn empty_field_passes_url_rule_and_is_admitted() {
    let mut sorter = Sorter::new("src", "key", vec![0], None);
    sorter.set_validation_schema(vec![ColumnRule::new(Rule::None), ColumnRule::new(Rule::Url)]).unwrap();

    let outcome = sorter.add_row(row(&["1", ""]), None).unwrap();
    assert_eq!(outcome, AddOutcome::Admitted);

    let stats = sorter.sort().unwrap();
    assert_eq!(stats.total_rows, 1);
    assert_eq!(stats.total_rows_processed, 1);
    assert_eq!(stats.failed_url_error_count, 0);
}

#[test]
fn protocol_rule_rejects_schemeless_values() {
    let mut sorter = Sorter::new("src", "key", vec![0], None);
    sorter.set_validation_schema(vec![ColumnRule::new(Rule::Protocol)]).unwrap();

    sorter.add_row(row(&["s3://bucket/key"]), None).unwrap();
    let rejected = sorter.add_row(row(&["bucket/key"]), None).unwrap();
    assert_eq!(rejected, AddOutcome::Rejected);

    let stats = sorter.sort().unwrap();
    assert_eq!(stats.total_rows, 1);
    assert_eq!(stats.failed_protocol_error_count, 1);
}

/// Rejected rows are appended to the error log with a 1-based row ordinal
/// and the column identifier, per spec's fixed error-log layout.
#[test]
fn rejected_rows_are_written_to_error_log() {
    let dir = tempdir().unwrap();
    let log_path = dir.path().join("errors.csv");

    let mut sorter = Sorter::new("src", "key", vec![0], None);
    sorter.with_error_log(log_path.clone()).unwrap();
    sorter.enable_validation(1, Rule::Url).unwrap();

    sorter.add_row(row(&["1", "https://good.example"]), None).unwrap();
    sorter.add_row(row(&["2", "bad-value"]), None).unwrap();
    sorter.sort().unwrap();

    let contents = std::fs::read_to_string(&log_path).unwrap();
    let mut lines = contents.lines();
    assert_eq!(lines.next().unwrap(), "Error Message,Row,Column");
    let data_line = lines.next().unwrap();
    assert!(data_line.contains("does not include a valid domain"));
}

/// `enable_validation` on a single column pads shorter schemas with
/// `Rule::None` rather than failing.
#[test]
fn enable_validation_pads_schema_with_none() {
    let mut sorter = Sorter::new("src", "key", vec![0], None);
    sorter.enable_validation(2, Rule::Protocol).unwrap();
    // Columns 0 and 1 should remain unvalidated (Rule::None).
    let outcome = sorter.add_row(row(&["anything", "anything else", "https://ok.example"]), None).unwrap();
    assert_eq!(outcome, AddOutcome::Admitted);
}

/// Validation schema changes are rejected once the sort has started.
#[test]
fn validation_schema_cannot_change_after_sort() {
    let mut sorter = Sorter::new("src", "key", vec![0], None);
    sorter.add_row(row(&["1"]), None).unwrap();
    sorter.sort().unwrap();
    assert!(sorter.set_validation_schema(vec![ColumnRule::new(Rule::Url)]).is_err());
}
