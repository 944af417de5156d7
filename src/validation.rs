//! Per-column validation rules, invoked at `add_row` time.
//!
//! Validation failures are recovered locally: the row is rejected and a
//! counter incremented, but the sort itself never aborts because of them.

use std::sync::OnceLock;

use regex::Regex;
use url::Url;

/// A validation rule attached to a column.
#[derive(Clone, Debug)]
pub enum Rule {
    /// Always passes.
    None,
    /// The field must parse as an absolute URL with a host containing a dot.
    Url,
    /// The field must match `^[a-zA-Z][a-zA-Z0-9+.-]*://`.
    Protocol,
}

/// The two kinds of validation failure tracked by the sort façade's stats.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RuleKind {
    Url,
    Protocol,
}

/// Run `rule` against `value`. An empty field always passes.
///
/// Returns `Ok(())` on success, or `Err(RuleKind)` naming which rule failed
/// (the caller uses this to pick the right failure counter and message).
pub fn check(rule: &Rule, value: &str) -> Result<(), RuleKind> {
    if value.is_empty() {
        return Ok(());
    }
    match rule {
        Rule::None => Ok(()),
        Rule::Url => {
            let valid = Url::parse(value)
                .map(|u| u.host_str().map(|h| h.contains('.')).unwrap_or(false))
                .unwrap_or(false);
            if valid {
                Ok(())
            } else {
                Err(RuleKind::Url)
            }
        }
        Rule::Protocol => {
            if protocol_regex().is_match(value) {
                Ok(())
            } else {
                Err(RuleKind::Protocol)
            }
        }
    }
}

static PROTOCOL_RE: OnceLock<Regex> = OnceLock::new();

fn protocol_regex() -> &'static Regex {
    PROTOCOL_RE.get_or_init(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.-]*://").unwrap())
}

/// Named column identifier used in error-log rows: either the schema's
/// name for the column, or its 1-based index.
pub enum ColumnId {
    Named(String),
    Index(usize),
}

impl std::fmt::Display for ColumnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnId::Named(name) => write!(f, "{name}"),
            ColumnId::Index(i) => write!(f, "{i}"),
        }
    }
}

/// A named validation rule, as installed via `set_validation_schema`.
#[derive(Clone, Debug)]
pub struct ColumnRule {
    pub rule: Rule,
    pub name: Option<String>,
}

impl ColumnRule {
    pub fn new(rule: Rule) -> ColumnRule {
        ColumnRule { rule, name: None }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> ColumnRule {
        self.name = Some(name.into());
        self
    }
}

/// Build the error-log message for a failed rule, per spec §6.
pub fn failure_message(kind: RuleKind, value: &str, column: &ColumnId) -> String {
    match (kind, column) {
        (RuleKind::Url, ColumnId::Named(name)) => {
            format!("{name} does not include a valid domain")
        }
        (RuleKind::Url, ColumnId::Index(_)) => {
            format!("{value} does not include a valid domain")
        }
        (RuleKind::Protocol, ColumnId::Named(name)) => {
            format!("{name} does not include a valid link protocol")
        }
        (RuleKind::Protocol, ColumnId::Index(_)) => {
            format!("{value} does not include a valid link protocol")
        }
    }
}
