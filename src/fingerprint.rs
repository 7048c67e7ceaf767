//! SQL fingerprinting and command-type classification (spec.md §4.2).
//!
//! Given raw SQL text, [`normalize`] tokenizes it, replaces literals and
//! parameter placeholders with a sentinel, folds whitespace, and derives a
//! stable 128-bit [`SqlFingerprint`] plus a [`CommandType`]. Two
//! syntactically equivalent queries that differ only in literal values or
//! incidental whitespace share a fingerprint. Normalization never fails: if
//! the tokenizer itself rejects the input, the raw text is hashed directly
//! and the command type falls back to [`CommandType::Unknown`].

use std::hash::{DefaultHasher, Hash, Hasher};

use serde::Serialize;
use sqlparser::{dialect::GenericDialect, tokenizer::{Token, Tokenizer}};

/// Tagged enumeration of the leading SQL command, derived from the first
/// significant keyword of the normalized text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[non_exhaustive]
pub enum CommandType {
    Select,
    Update,
    Delete,
    Insert,
    Ddl,
    Unknown
}

impl CommandType {
    fn from_keyword(keyword: &str) -> Self {
        match keyword {
            "SELECT" | "WITH" => Self::Select,
            "UPDATE" => Self::Update,
            "DELETE" => Self::Delete,
            "INSERT" => Self::Insert,
            "CREATE" | "ALTER" | "DROP" | "TRUNCATE" | "COMMENT" | "GRANT" | "REVOKE" => Self::Ddl,
            _ => Self::Unknown
        }
    }
}

impl std::fmt::Display for CommandType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Select => write!(f, "SELECT"),
            Self::Update => write!(f, "UPDATE"),
            Self::Delete => write!(f, "DELETE"),
            Self::Insert => write!(f, "INSERT"),
            Self::Ddl => write!(f, "DDL"),
            Self::Unknown => write!(f, "UNKNOWN")
        }
    }
}

/// Stable 128-bit identifier for a SQL statement shape, independent of
/// parameter values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SqlFingerprint(pub u128);

impl SqlFingerprint {
    /// Fold two independent 64-bit hash passes into one 128-bit value. Pure
    /// and total: every input string produces exactly one fingerprint.
    pub fn compute(s: &str) -> Self {
        let mut high_hasher = DefaultHasher::new();
        s.hash(&mut high_hasher);
        let high = high_hasher.finish();

        // A distinct salt on the second pass keeps it from being a
        // mechanical repeat of the first, without reaching for a second
        // hash algorithm.
        let mut low_hasher = DefaultHasher::new();
        0xD1B5_4A32_D192_ED03u64.hash(&mut low_hasher);
        s.hash(&mut low_hasher);
        let low = low_hasher.finish();

        Self(((high as u128) << 64) | low as u128)
    }
}

impl std::fmt::Display for SqlFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

/// How a parameter placeholder is used on the SQL side of a statement.
///
/// AST-bound placeholders (`?`, `$1`, `:name`) are always [`ParamUsage::Literal`]
/// — the parser only recognizes them in value positions. [`ParamUsage::Identifier`]
/// is reserved for the mapper-template analyzer (`crate::template`), where a
/// raw splice can land in an identifier position (table/column/ORDER BY).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ParamUsage {
    Literal,
    Identifier
}

/// One occurrence of a bound parameter.
#[derive(Debug, Clone, Serialize)]
pub struct ParamBinding {
    pub name:  String,
    pub usage: ParamUsage
}

/// Result of normalizing one SQL string.
#[derive(Debug, Clone)]
pub struct NormalizedSql {
    pub normalized:   String,
    pub fingerprint:  SqlFingerprint,
    pub command_type: CommandType,
    pub params:       Vec<ParamBinding>
}

/// Normalize raw SQL text. Never fails.
pub fn normalize(raw: &str) -> NormalizedSql {
    let dialect = GenericDialect {};
    match Tokenizer::new(&dialect, raw).tokenize() {
        Ok(tokens) => normalize_tokens(&tokens),
        Err(_) => normalize_fallback(raw)
    }
}

fn normalize_tokens(tokens: &[Token]) -> NormalizedSql {
    let mut normalized = String::new();
    let mut params = Vec::new();
    let mut param_counter = 0usize;
    let mut first_keyword: Option<String> = None;
    let mut last_was_space = true;

    for tok in tokens {
        match tok {
            Token::Whitespace(_) => {
                if !last_was_space {
                    normalized.push(' ');
                    last_was_space = true;
                }
                continue;
            }
            Token::Number(_, _)
            | Token::SingleQuotedString(_)
            | Token::DoubleQuotedString(_)
            | Token::NationalStringLiteral(_)
            | Token::HexStringLiteral(_) => {
                normalized.push('?');
            }
            Token::Placeholder(name) => {
                param_counter += 1;
                let display_name = if name == "?" {
                    format!("param{}", param_counter)
                } else {
                    name.trim_start_matches(['$', ':', '@']).to_string()
                };
                params.push(ParamBinding {
                    name:  display_name,
                    usage: ParamUsage::Literal
                });
                normalized.push('?');
            }
            Token::Word(word) => {
                if first_keyword.is_none() {
                    first_keyword = Some(word.value.to_uppercase());
                }
                normalized.push_str(&word.value);
            }
            other => {
                normalized.push_str(&other.to_string());
            }
        }
        last_was_space = false;
    }

    let command_type = first_keyword
        .as_deref()
        .map(CommandType::from_keyword)
        .unwrap_or(CommandType::Unknown);
    let normalized = normalized.trim().to_string();
    let fingerprint = SqlFingerprint::compute(&normalized);

    NormalizedSql {
        normalized,
        fingerprint,
        command_type,
        params
    }
}

fn normalize_fallback(raw: &str) -> NormalizedSql {
    let folded = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    let command_type = folded
        .split_whitespace()
        .next()
        .map(|w| CommandType::from_keyword(&w.to_uppercase()))
        .unwrap_or(CommandType::Unknown);
    NormalizedSql {
        normalized: folded,
        fingerprint: SqlFingerprint::compute(raw),
        command_type,
        params: Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_shape_different_literals_share_fingerprint() {
        let a = normalize("SELECT * FROM users WHERE id = 1");
        let b = normalize("SELECT * FROM users WHERE id = 999");
        assert_eq!(a.fingerprint, b.fingerprint);
    }

    #[test]
    fn whitespace_does_not_affect_fingerprint() {
        let a = normalize("SELECT  *   FROM users");
        let b = normalize("SELECT * FROM users");
        assert_eq!(a.fingerprint, b.fingerprint);
    }

    #[test]
    fn different_shapes_have_different_fingerprints() {
        let a = normalize("SELECT * FROM users");
        let b = normalize("SELECT * FROM orders");
        assert_ne!(a.fingerprint, b.fingerprint);
    }

    #[test]
    fn command_type_detection() {
        assert_eq!(normalize("SELECT 1").command_type, CommandType::Select);
        assert_eq!(normalize("UPDATE t SET x=1").command_type, CommandType::Update);
        assert_eq!(normalize("DELETE FROM t").command_type, CommandType::Delete);
        assert_eq!(normalize("INSERT INTO t VALUES (1)").command_type, CommandType::Insert);
        assert_eq!(normalize("TRUNCATE TABLE t").command_type, CommandType::Ddl);
    }

    #[test]
    fn never_fails_on_garbage_input() {
        let result = normalize("this is not ; at all ' valid (( sql");
        assert!(matches!(result.command_type, CommandType::Unknown | CommandType::Select));
    }

    #[test]
    fn placeholder_gets_a_stable_name() {
        let result = normalize("SELECT * FROM users WHERE id = ?");
        assert_eq!(result.params.len(), 1);
        assert_eq!(result.params[0].name, "param1");
    }
}
