//! SQL dialect capability registry (spec.md §4.1).
//!
//! This is deliberately decoupled from [`crate::query::SqlDialect`] (the
//! five dialects `sqlparser` actually tokenizes for us). `DialectCaps`
//! describes pagination syntax, quoting, and placeholder conventions for
//! every dialect the orchestrator needs to *recognize* from connection
//! metadata, even the ones we fall back to generic AST parsing for.

use std::fmt;

/// Placeholder style used by a dialect's driver layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// `?` positional (MySQL, SQLite).
    QuestionMark,
    /// `$1`, `$2`, ... (PostgreSQL).
    DollarNumbered,
    /// `:name` (Oracle, many ORMs).
    ColonNamed,
    /// `@name` (SQL Server).
    AtNamed
}

/// How a dialect expresses row-limiting pagination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationSyntax {
    /// `LIMIT n OFFSET m`.
    LimitOffset,
    /// `OFFSET m ROWS FETCH NEXT n ROWS ONLY`.
    OffsetFetch,
    /// `TOP n` (no offset concept without `OFFSET .. FETCH`).
    Top,
    /// `ROWNUM <= n` pseudo-column filtering (legacy Oracle).
    RowNum
}

/// Identifying name for one of the eleven dialects the detector recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum DialectId {
    Generic,
    MySql,
    PostgreSql,
    Sqlite,
    ClickHouse,
    SqlServer,
    Oracle,
    Db2,
    MariaDb,
    Snowflake,
    BigQuery
}

impl fmt::Display for DialectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Generic => "generic",
            Self::MySql => "mysql",
            Self::PostgreSql => "postgresql",
            Self::Sqlite => "sqlite",
            Self::ClickHouse => "clickhouse",
            Self::SqlServer => "sqlserver",
            Self::Oracle => "oracle",
            Self::Db2 => "db2",
            Self::MariaDb => "mariadb",
            Self::Snowflake => "snowflake",
            Self::BigQuery => "bigquery"
        };
        write!(f, "{name}")
    }
}

/// Capability profile for one dialect.
#[derive(Debug, Clone, Copy)]
pub struct DialectCaps {
    pub id:                 DialectId,
    pub quote_char:         char,
    pub pagination:         PaginationSyntax,
    pub placeholder:        PlaceholderStyle,
    /// Whether this dialect is parsed by `sqlparser` with a dedicated
    /// dialect implementation, versus falling back to generic parsing
    /// for AST-level checks (`crate::query::SqlDialect::Generic`).
    pub has_native_ast_support: bool
}

const REGISTRY: &[DialectCaps] = &[
    DialectCaps {
        id: DialectId::Generic,
        quote_char: '"',
        pagination: PaginationSyntax::LimitOffset,
        placeholder: PlaceholderStyle::QuestionMark,
        has_native_ast_support: true
    },
    DialectCaps {
        id: DialectId::MySql,
        quote_char: '`',
        pagination: PaginationSyntax::LimitOffset,
        placeholder: PlaceholderStyle::QuestionMark,
        has_native_ast_support: true
    },
    DialectCaps {
        id: DialectId::PostgreSql,
        quote_char: '"',
        pagination: PaginationSyntax::LimitOffset,
        placeholder: PlaceholderStyle::DollarNumbered,
        has_native_ast_support: true
    },
    DialectCaps {
        id: DialectId::Sqlite,
        quote_char: '"',
        pagination: PaginationSyntax::LimitOffset,
        placeholder: PlaceholderStyle::QuestionMark,
        has_native_ast_support: true
    },
    DialectCaps {
        id: DialectId::ClickHouse,
        quote_char: '`',
        pagination: PaginationSyntax::LimitOffset,
        placeholder: PlaceholderStyle::QuestionMark,
        has_native_ast_support: true
    },
    DialectCaps {
        id: DialectId::SqlServer,
        quote_char: '[',
        pagination: PaginationSyntax::OffsetFetch,
        placeholder: PlaceholderStyle::AtNamed,
        has_native_ast_support: false
    },
    DialectCaps {
        id: DialectId::Oracle,
        quote_char: '"',
        pagination: PaginationSyntax::RowNum,
        placeholder: PlaceholderStyle::ColonNamed,
        has_native_ast_support: false
    },
    DialectCaps {
        id: DialectId::Db2,
        quote_char: '"',
        pagination: PaginationSyntax::OffsetFetch,
        placeholder: PlaceholderStyle::QuestionMark,
        has_native_ast_support: false
    },
    DialectCaps {
        id: DialectId::MariaDb,
        quote_char: '`',
        pagination: PaginationSyntax::LimitOffset,
        placeholder: PlaceholderStyle::QuestionMark,
        has_native_ast_support: false
    },
    DialectCaps {
        id: DialectId::Snowflake,
        quote_char: '"',
        pagination: PaginationSyntax::LimitOffset,
        placeholder: PlaceholderStyle::QuestionMark,
        has_native_ast_support: false
    },
    DialectCaps {
        id: DialectId::BigQuery,
        quote_char: '`',
        pagination: PaginationSyntax::LimitOffset,
        placeholder: PlaceholderStyle::AtNamed,
        has_native_ast_support: false
    }
];

/// Look up capabilities by id. Every [`DialectId`] variant has a registry
/// entry, so this never returns `None` for a value actually constructed by
/// [`detect`].
pub fn caps(id: DialectId) -> DialectCaps {
    REGISTRY
        .iter()
        .find(|c| c.id == id)
        .copied()
        .unwrap_or(REGISTRY[0])
}

/// Detect a dialect from a driver/connection-string product name
/// (e.g. `"postgresql"`, `"Microsoft SQL Server"`, `"MariaDB"`).
/// Falls back to [`DialectId::Generic`] for anything unrecognized.
pub fn detect(product_name: &str) -> DialectId {
    let lower = product_name.to_lowercase();
    if lower.contains("postgres") {
        DialectId::PostgreSql
    } else if lower.contains("mariadb") {
        DialectId::MariaDb
    } else if lower.contains("mysql") {
        DialectId::MySql
    } else if lower.contains("sqlite") {
        DialectId::Sqlite
    } else if lower.contains("clickhouse") {
        DialectId::ClickHouse
    } else if lower.contains("sql server") || lower.contains("sqlserver") || lower.contains("mssql") {
        DialectId::SqlServer
    } else if lower.contains("oracle") {
        DialectId::Oracle
    } else if lower.contains("db2") {
        DialectId::Db2
    } else if lower.contains("snowflake") {
        DialectId::Snowflake
    } else if lower.contains("bigquery") {
        DialectId::BigQuery
    } else {
        DialectId::Generic
    }
}

/// Map a capability-level dialect to the narrower set `sqlparser` natively
/// tokenizes for us. Dialects without dedicated AST support parse as
/// generic SQL; checkers that need dialect-specific syntax (e.g. `TOP n`)
/// read [`DialectCaps::pagination`] directly instead of relying on the AST.
pub fn to_parser_dialect(id: DialectId) -> crate::query::SqlDialect {
    use crate::query::SqlDialect;
    match id {
        DialectId::MySql | DialectId::MariaDb => SqlDialect::MySQL,
        DialectId::PostgreSql | DialectId::Snowflake => SqlDialect::PostgreSQL,
        DialectId::Sqlite => SqlDialect::SQLite,
        DialectId::ClickHouse => SqlDialect::ClickHouse,
        DialectId::Generic
        | DialectId::SqlServer
        | DialectId::Oracle
        | DialectId::Db2
        | DialectId::BigQuery => SqlDialect::Generic
    }
}
