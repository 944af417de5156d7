//! Bounded-memory external merge-sort for tabular row data, with
//! content-addressed deduplication and a PostgreSQL COPY BINARY encoder.
//!
//! Rows (conceptually CSV) are accumulated, sorted by a caller-specified
//! compound key, and spilled to disk once an in-memory budget is
//! exceeded. A k-way streaming merge produces the final order -- ascending
//! by a SHA-1 digest of the key columns, not by the key's own natural
//! order -- optionally capping how many of the newest records survive per
//! key. The sorted output can be iterated in batches or encoded directly
//! into PostgreSQL's binary `COPY ... FROM STDIN (FORMAT binary)` wire
//! format.
//!
//! The motivation mirrors the line-oriented external sort this crate grew
//! from: sorting very large row sets (the compound-key equivalent of
//! sorting a pg_dump table by primary key) without holding the whole
//! dataset in memory.
//!
//! # Examples
//! ```
//! use row_sort::sorter::Sorter;
//!
//! let mut sorter = Sorter::new("orders-ingest", "orders", vec![0], None);
//! sorter.add_row(vec!["1".to_string(), "a".to_string()], None).unwrap();
//! sorter.add_row(vec!["2".to_string(), "b".to_string()], None).unwrap();
//! let stats = sorter.sort().unwrap();
//! assert_eq!(stats.total_rows, 2);
//!
//! for batch in sorter.each_batch(100).unwrap() {
//!     for (_digest, _row) in batch.unwrap() {
//!         // consume sorted rows
//!     }
//! }
//! ```

pub mod buffer;
pub mod config;
pub mod copy_binary;
pub mod csv_input;
pub mod digest;
pub mod error;
pub mod error_log;
pub mod merge;
pub mod run_file;
pub mod sorter;
pub mod validation;
