//! PostgreSQL COPY BINARY stream encoder.
//!
//! Emits the fixed 6-column schema: `source_key text, digest text,
//! geometry bytea, row_data text[], created_at timestamp, updated_at
//! timestamp`. Framing is grounded directly on the `PostgresCopyHandler`
//! pattern seen in the retrieval pack's blockchain-cache COPY writer
//! (signature, zeroed header fields, i16 field count, i32-length-prefixed
//! fields) -- this module reimplements that as a pure byte-stream encoder
//! with no live connection, since the sort engine only needs to produce
//! bytes a `COPY ... FROM STDIN (FORMAT binary)` consumer can read.

use std::io::Write;

use chrono::{DateTime, Utc};

use crate::error::{Result, SortError};

const SIGNATURE: &[u8; 11] = b"PGCOPY\n\xff\r\n\0";
const FIELD_COUNT: i16 = 6;
const NULL_LEN: i32 = -1;
const TRAILER: i16 = -1;

/// WKB type code for a 2D point with the SRID flag set (0x20000000 | 1).
const EWKB_POINT_WITH_SRID: u32 = 0x2000_0001;
const EWKB_SRID_4326: u32 = 4326;

/// PostgreSQL's epoch, used as the zero point for binary `timestamp` values.
fn pg_epoch() -> DateTime<Utc> {
    "2000-01-01T00:00:00Z".parse().expect("valid constant timestamp")
}

/// Writes the 19-byte COPY BINARY header: signature, flags, extension length.
pub fn write_header<W: Write>(w: &mut W) -> Result<()> {
    w.write_all(SIGNATURE)?;
    w.write_all(&0u32.to_be_bytes())?;
    w.write_all(&0u32.to_be_bytes())?;
    Ok(())
}

/// Writes the 2-byte end-of-data trailer (`-1` as i16).
pub fn write_trailer<W: Write>(w: &mut W) -> Result<()> {
    w.write_all(&TRAILER.to_be_bytes())?;
    Ok(())
}

fn write_field_bytes<W: Write>(w: &mut W, bytes: &[u8]) -> Result<()> {
    w.write_all(&(bytes.len() as i32).to_be_bytes())?;
    w.write_all(bytes)?;
    Ok(())
}

fn write_null<W: Write>(w: &mut W) -> Result<()> {
    w.write_all(&NULL_LEN.to_be_bytes())?;
    Ok(())
}

fn write_text<W: Write>(w: &mut W, value: &str) -> Result<()> {
    write_field_bytes(w, value.as_bytes())
}

/// Encodes `lon`/`lat` as an EWKB POINT with SRID 4326, little-endian as
/// required by the `0x01` byte-order marker.
fn ewkb_point(lon: f64, lat: f64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(21);
    buf.push(0x01); // little-endian
    buf.extend_from_slice(&EWKB_POINT_WITH_SRID.to_le_bytes());
    buf.extend_from_slice(&EWKB_SRID_4326.to_le_bytes());
    buf.extend_from_slice(&lon.to_le_bytes());
    buf.extend_from_slice(&lat.to_le_bytes());
    buf
}

/// Resolves the optional geometry column for a row.
///
/// `None` (no geo columns configured at all) and a numeric parse failure on
/// an in-range pair both resolve to NULL, per spec §4.7. An out-of-range
/// index on a *configured* geo pair is the `EncodeError` case named in §7
/// ("geo column index out of range") -- it means the caller misconfigured
/// `geo_columns` against the row shape, not that geo data is simply absent.
fn geometry_bytes(row: &[String], geo_columns: Option<[usize; 2]>) -> Result<Option<Vec<u8>>> {
    let Some([lon_idx, lat_idx]) = geo_columns else { return Ok(None) };
    let lon_field = row.get(lon_idx).ok_or_else(|| {
        SortError::Encode(format!("geo column index {lon_idx} out of range for a row with {} fields", row.len()))
    })?;
    let lat_field = row.get(lat_idx).ok_or_else(|| {
        SortError::Encode(format!("geo column index {lat_idx} out of range for a row with {} fields", row.len()))
    })?;
    let point = match (lon_field.parse::<f64>(), lat_field.parse::<f64>()) {
        (Ok(lon), Ok(lat)) => Some(ewkb_point(lon, lat)),
        _ => None,
    };
    Ok(point)
}

fn write_bytea_or_null<W: Write>(w: &mut W, bytes: Option<&[u8]>) -> Result<()> {
    match bytes {
        Some(b) => write_field_bytes(w, b),
        None => write_null(w),
    }
}

/// Encodes a non-null, one-dimensional `text[]` per PostgreSQL's array
/// binary wire format: `ndim, hasnull, elemtype, dim, lbound` followed by
/// each element as a length-prefixed text field.
fn text_array_bytes(values: &[String]) -> Vec<u8> {
    const PG_TEXT_OID: i32 = 25;
    let mut buf = Vec::new();
    buf.extend_from_slice(&1i32.to_be_bytes()); // ndim
    buf.extend_from_slice(&0i32.to_be_bytes()); // hasnull
    buf.extend_from_slice(&PG_TEXT_OID.to_be_bytes()); // elemtype
    buf.extend_from_slice(&(values.len() as i32).to_be_bytes()); // dim
    buf.extend_from_slice(&1i32.to_be_bytes()); // lbound
    for value in values {
        let bytes = value.as_bytes();
        buf.extend_from_slice(&(bytes.len() as i32).to_be_bytes());
        buf.extend_from_slice(bytes);
    }
    buf
}

/// Microseconds since the PostgreSQL epoch (2000-01-01 00:00:00 UTC).
fn timestamp_micros(at: DateTime<Utc>) -> Result<i64> {
    let delta = at.signed_duration_since(pg_epoch());
    delta.num_microseconds().ok_or_else(|| {
        SortError::Encode("timestamp out of representable microsecond range".to_string())
    })
}

/// Timestamp columns are framed like any other field: an i32 length
/// prefix (always 8) followed by the microsecond count, big-endian.
fn write_timestamp<W: Write>(w: &mut W, at: DateTime<Utc>) -> Result<()> {
    let micros = timestamp_micros(at)?;
    write_field_bytes(w, &micros.to_be_bytes())
}

/// Writes one output tuple for `digest`/`row` under the fixed 6-column
/// schema described in the module docs. `created_at` and `updated_at` are
/// always equal, per spec.
pub fn write_tuple<W: Write>(
    w: &mut W,
    source_key: &str,
    digest: &str,
    row: &[String],
    geo_columns: Option<[usize; 2]>,
    created_at: DateTime<Utc>,
) -> Result<()> {
    w.write_all(&FIELD_COUNT.to_be_bytes())?;
    write_text(w, source_key)?;
    write_text(w, digest)?;
    write_bytea_or_null(w, geometry_bytes(row, geo_columns)?.as_deref())?;
    write_field_bytes(w, &text_array_bytes(row))?;
    write_timestamp(w, created_at)?;
    write_timestamp(w, created_at)?;
    Ok(())
}
