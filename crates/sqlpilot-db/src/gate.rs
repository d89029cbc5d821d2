use std::sync::LazyLock;

use regex::Regex;
use sqlpilot_common::{Error, Result};

static LIMIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\blimit\b").expect("limit regex is valid"));

/// Validate a raw statement for execution: trim whitespace and trailing
/// terminators, then accept only a single bare SELECT.
///
/// Rejections are terminal for the attempt; there is no fallback
/// execution. This gate is the enforcement point behind the generation
/// pipeline; anything that reaches the engine has passed it.
pub fn sanitize(raw: &str) -> Result<String> {
    let cleaned = raw.trim().trim_end_matches(';').trim_end();
    if cleaned.is_empty() {
        return Err(Error::SafetyRejected("empty statement".into()));
    }
    if !cleaned.to_lowercase().starts_with("select") {
        return Err(Error::SafetyRejected(
            "only SELECT statements may be executed".into(),
        ));
    }
    if cleaned.contains(';') {
        return Err(Error::SafetyRejected(
            "statement chaining is not allowed".into(),
        ));
    }
    Ok(cleaned.to_string())
}

/// Append `LIMIT max_rows` unless the statement already carries a LIMIT
/// clause (word-boundary match, any case). An explicit limit, even a
/// larger one, is never overridden.
pub fn ensure_limit(sql: &str, max_rows: usize) -> String {
    if LIMIT_RE.is_match(sql) {
        return sql.to_string();
    }
    format!("{sql} LIMIT {max_rows}")
}
