//! Error types and constructors for the SQL audit engine.
//!
//! This module provides error construction functions that create properly
//! formatted [`AppError`] instances with context-specific messages, grouped
//! by the error taxonomy of the checker/orchestrator/stream/persistence
//! pipeline.
//!
//! # Error Categories
//!
//! - **Parse/normalize errors**: never fatal on their own; callers fall back
//!   to [`crate::fingerprint::CommandType::Unknown`].
//! - **Checker errors**: captured inside a [`crate::checkers::CheckerResult`],
//!   never propagated as an [`AppError`].
//! - **Rewriter errors**: abort the in-flight orchestration for one event.
//! - **Stream errors**: deserialize failures and persistence failures that
//!   drive the retry ladder.
//! - **Config errors**: fatal at startup.

pub use masterror::{AppError, AppResult};

/// Create file read error with path context.
pub fn file_read_error(path: &str, source: std::io::Error) -> AppError {
    AppError::internal(format!("Failed to read file '{}': {}", path, source))
}

/// Create SQL parse error with optional position info.
pub fn query_parse_error(message: impl Into<String>) -> AppError {
    let msg = message.into();
    AppError::bad_request(format_sql_error("Query parse error", &msg))
}

/// Create a rewriter failure. Aborts orchestration for one event.
pub fn rewriter_error(rewriter_id: &str, message: impl Into<String>) -> AppError {
    AppError::internal(format!("rewriter '{}' failed: {}", rewriter_id, message.into()))
}

/// Create a config error (fatal at startup).
pub fn config_error(message: impl Into<String>) -> AppError {
    AppError::bad_request(message.into())
}

/// Create a stream event decode error, routed to the dead-letter topic.
pub fn stream_decode_error(message: impl Into<String>) -> AppError {
    AppError::bad_request(format!("failed to decode audit event: {}", message.into()))
}

/// Create a transient persistence error, driving the retry ladder.
pub fn persistence_transient_error(message: impl Into<String>) -> AppError {
    AppError::service(message.into())
}

/// Create a permanent persistence error, routed to dead-letter without retry.
pub fn persistence_permanent_error(message: impl Into<String>) -> AppError {
    AppError::bad_request(message.into())
}

/// Format SQL error with position highlighting.
///
/// # Notes
///
/// - Attempts to extract line and column information from sqlparser errors
/// - Uses "Line: X, Column Y" pattern matching
fn format_sql_error(prefix: &str, message: &str) -> String {
    if let Some(pos) = extract_position(message) {
        format!(
            "{prefix} at line {line}, column {column}:\n  {message}",
            prefix = prefix,
            line = pos.line,
            column = pos.column,
            message = message
        )
    } else {
        format!("{}:\n  {}", prefix, message)
    }
}

struct SqlPosition {
    line:   usize,
    column: usize
}

/// Extract position from sqlparser error message.
///
/// # Notes
///
/// - Looks for "Line: X, Column Y" pattern in error messages
fn extract_position(message: &str) -> Option<SqlPosition> {
    let line_marker = "Line: ";
    let col_marker = ", Column ";
    let line_start = message.find(line_marker)?;
    let line_num_start = line_start + line_marker.len();
    let rest = message.get(line_num_start..)?;
    let col_start = rest.find(col_marker)?;
    let line_str = message.get(line_num_start..line_num_start + col_start)?;
    let col_num_start = line_num_start + col_start + col_marker.len();
    let col_rest = message.get(col_num_start..)?;
    let col_end = col_rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(col_rest.len());
    let col_str = message.get(col_num_start..col_num_start + col_end)?;
    let line = line_str.parse().ok()?;
    let column = col_str.parse().ok()?;
    Some(SqlPosition {
        line,
        column
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_parse_error_includes_position_when_present() {
        let err = query_parse_error("sql parser error: Expected ..., Line: 2, Column 5");
        assert!(err.to_string().contains("line 2, column 5"));
    }

    #[test]
    fn query_parse_error_falls_back_without_position() {
        let err = query_parse_error("unexpected end of input");
        assert!(err.to_string().contains("unexpected end of input"));
    }
}
