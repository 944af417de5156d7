//! Content-addressed row identity.
//!
//! The digest of a row is the SHA-1 of its key columns joined with a NUL
//! separator, rendered as 40 lowercase hex characters. It drives both the
//! sort order (ascending by digest, not by the key's natural order) and
//! dedup (records sharing a digest are the same logical entity).

use data_encoding::HEXLOWER;
use sha1::{Digest, Sha1};

use crate::error::{SortError, Result};

/// Separator byte placed between joined key column values.
///
/// Significant: without it `["ab", "c"]` and `["a", "bc"]` would digest
/// identically.
const KEY_SEPARATOR: u8 = 0x00;

/// Length in hex characters of a rendered digest.
pub const DIGEST_LEN: usize = 40;

/// Compute the digest of `row` over `key_columns`, in order.
///
/// `key_columns` may repeat an index; order affects the digest.
pub fn digest<S: AsRef<str>>(row: &[S], key_columns: &[usize]) -> Result<String> {
    let mut hasher = Sha1::new();
    for (i, &col) in key_columns.iter().enumerate() {
        let value = row.get(col).ok_or(SortError::BadKey { index: col, len: row.len() })?;
        if i > 0 {
            hasher.update([KEY_SEPARATOR]);
        }
        hasher.update(value.as_ref().as_bytes());
    }
    let bytes = hasher.finalize();
    Ok(HEXLOWER.encode(&bytes))
}
