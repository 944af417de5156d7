use row_sort::error::SortError;
use row_sort::sorter::Sorter;

mod common;
use common::row;

/// A key column index past the end of a row surfaces as `BadKey` and
/// poisons the Sorter: later operations fail with a `State` error instead
/// of silently continuing.
#[test]
fn out_of_range_key_column_is_bad_key_and_poisons_sorter() {
    let mut sorter = Sorter::new("src", "key", vec![5], None);
    let err = sorter.add_row(row(&["only-one-field"]), None).unwrap_err();
    match err {
        SortError::BadKey { index, len } => {
            assert_eq!(index, 5);
            assert_eq!(len, 1);
        }
        other => panic!("expected BadKey, got {other:?}"),
    }

    // The Sorter is now in a terminal failed state.
    let sort_err = sorter.sort().unwrap_err();
    assert!(matches!(sort_err, SortError::State { .. }));
    let add_err = sorter.add_row(row(&["x"]), None).unwrap_err();
    assert!(matches!(add_err, SortError::State { .. }));
}

/// `BadKey` is only raised for rows that are admitted past validation;
/// a row rejected by a validator never reaches digesting, so a short row
/// with no key column at all still surfaces `BadKey` once it *would* be
/// admitted.
#[test]
fn bad_key_surfaces_even_with_validation_schema_installed() {
    use row_sort::validation::{ColumnRule, Rule};

    let mut sorter = Sorter::new("src", "key", vec![2], None);
    sorter.set_validation_schema(vec![ColumnRule::new(Rule::None)]).unwrap();
    let err = sorter.add_row(row(&["a"]), None).unwrap_err();
    assert!(matches!(err, SortError::BadKey { index: 2, len: 1 }));
}
