use thiserror::Error;

/// Errors surfaced by the sort engine.
///
/// Per-row validation failures are not represented here: they are recovered
/// locally by the validation layer (counted, optionally logged) and never
/// reach this type.
#[derive(Error, Debug)]
pub enum SortError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("key column {index} is out of range for a row with {len} fields")]
    BadKey { index: usize, len: usize },

    #[error("corrupt run file: {0}")]
    CorruptRun(String),

    #[error("illegal operation in state {state}: {operation}")]
    State { state: &'static str, operation: &'static str },

    #[error("invalid input: {reason}")]
    InvalidInput { reason: InvalidInputReason },

    #[error("encode error: {0}")]
    Encode(String),
}

/// Distinguishes the specific flavors of `InvalidInput` named in scenario S6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidInputReason {
    /// Zero-byte input: no header row could be read.
    NoHeadersFound,
    /// Input had a header but zero data rows where a non-empty result was expected.
    NoRecordsFound,
    /// The CSV body failed to parse (unbalanced quotes, ragged rows, etc).
    CsvParseError,
}

impl std::fmt::Display for InvalidInputReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            InvalidInputReason::NoHeadersFound => "no headers found",
            InvalidInputReason::NoRecordsFound => "no records found",
            InvalidInputReason::CsvParseError => "csv parse error",
        };
        write!(f, "{s}")
    }
}

pub type Result<T> = std::result::Result<T, SortError>;
