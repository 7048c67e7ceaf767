//! Static scanner driver (component J: `scan` + the thin `sql-audit`
//! binary).
//!
//! Walks a source tree and runs the static audit path over two kinds of
//! file: XML mapper templates (`template::analyze_mapper`) and plain `.sql`
//! files, where every statement is parsed into its own [`SqlContext`] and
//! run through the full checker roster. Both paths stay off the async
//! orchestrator: `CheckerRegistry::run_all`'s `rayon` fan-out has no
//! wall-clock deadline, which is the right shape for a batch of
//! independent, I/O-free inputs rather than one event on a budget
//! (SPEC_FULL.md §4.5).

use std::{collections::HashMap, path::Path};

use walkdir::WalkDir;

use crate::{
    checkers::{CheckerRegistry, RiskLevel},
    config::RuntimeConfig,
    context::SqlContext,
    dialect::{self, DialectId},
    error::{AppResult, file_read_error},
    query::{self, Query},
    template
};

/// One user-visible finding: file, best-effort line, and the rule that
/// fired. Mirrors the CLI surface contract (spec.md §6): "file, line,
/// checkerId, level, message, recommendation".
#[derive(Debug, Clone, serde::Serialize)]
pub struct Finding {
    pub file:           String,
    pub line:           Option<usize>,
    pub checker_id:      String,
    pub level:          RiskLevel,
    pub message:        String,
    pub recommendation: Option<String>
}

/// Aggregate result of one directory walk.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ScanReport {
    pub files_scanned: usize,
    pub findings:      Vec<Finding>
}

impl ScanReport {
    pub fn highest_level(&self) -> RiskLevel {
        self.findings.iter().map(|f| f.level).max().unwrap_or(RiskLevel::None)
    }

    pub fn has_critical(&self) -> bool {
        self.findings.iter().any(|f| f.level == RiskLevel::Critical)
    }

    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }
}

/// Walk `project_path`, auditing every `.xml` mapper and `.sql` file found.
/// Any other extension is skipped; a single unreadable or unparseable file
/// degrades to zero findings for that file rather than aborting the walk,
/// matching the parse-failure invariant in spec.md §7 category 1.
pub fn scan_project(project_path: &Path, dialect: DialectId, config: &RuntimeConfig) -> AppResult<ScanReport> {
    if !project_path.exists() {
        return Err(file_read_error(
            &project_path.display().to_string(),
            std::io::Error::new(std::io::ErrorKind::NotFound, "project path does not exist")
        ));
    }

    let registry = CheckerRegistry::standard();
    let mut report = ScanReport::default();
    // Scoped to one walk: a source tree can repeat the same literal SQL
    // fragment across many files (a shared constant, a duplicated
    // statement), and this lets the scanner parse each distinct string
    // once without reaching for module-level shared state.
    let mut parse_cache: HashMap<String, Vec<Query>> = HashMap::new();

    for entry in WalkDir::new(project_path)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
    {
        let path = entry.path();
        let findings = match path.extension().and_then(|e| e.to_str()) {
            Some("xml") => scan_mapper_file(path, config),
            Some("sql") => scan_sql_file(path, dialect, &registry, config, &mut parse_cache),
            _ => continue
        };
        report.files_scanned += 1;
        match findings {
            Ok(mut findings) => report.findings.append(&mut findings),
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "skipping unreadable or unparseable file");
            }
        }
    }

    Ok(report)
}

/// Identifiers allow-listed for an ORDER BY/table-name placeholder position
/// in a mapper template, read from the `MapperTemplate` config section.
fn mapper_allow_list(config: &RuntimeConfig) -> std::collections::HashSet<String> {
    config
        .checker("MapperTemplate")
        .file
        .columns("identifiers")
        .into_iter()
        .map(|s| s.to_lowercase())
        .collect()
}

fn scan_mapper_file(path: &Path, config: &RuntimeConfig) -> AppResult<Vec<Finding>> {
    let content = std::fs::read_to_string(path).map_err(|e| file_read_error(&path.display().to_string(), e))?;
    let allow_list = mapper_allow_list(config);
    let findings = template::analyze_mapper(&content, &allow_list);
    let file = path.display().to_string();
    Ok(findings
        .into_iter()
        .map(|f| {
            let checker_id = if f.statement_id.is_empty() {
                f.checker_id.to_string()
            } else {
                format!("{}:{}", f.checker_id, f.statement_id)
            };
            let message = match &f.placeholder {
                Some(placeholder) => format!("{} (placeholder: {})", f.risk.message, placeholder),
                None => f.risk.message.clone()
            };
            Finding {
                file: file.clone(),
                // The pull parser does not retain byte offsets per node, so
                // mapper findings are reported at the statement, not the
                // line.
                line: None,
                checker_id,
                level: f.risk.level,
                message,
                recommendation: f.risk.recommendation
            }
        })
        .collect())
}

fn scan_sql_file(
    path: &Path,
    dialect: DialectId,
    registry: &CheckerRegistry,
    config: &RuntimeConfig,
    parse_cache: &mut HashMap<String, Vec<Query>>
) -> AppResult<Vec<Finding>> {
    let content = std::fs::read_to_string(path).map_err(|e| file_read_error(&path.display().to_string(), e))?;
    let statements = parse_cached(&content, dialect, parse_cache)?;
    let file = path.display().to_string();

    let mut findings = Vec::new();
    for statement in statements {
        let line = line_of(&content, &statement.raw);
        let ctx = SqlContext::parse(&statement.raw, dialect);
        let results = registry.run_all(&ctx, config);
        let audit = crate::aggregator::aggregate(&ctx, results);
        for result in audit.results {
            let Some(risk) = result.risk.filter(|r| r.level > RiskLevel::None) else {
                continue;
            };
            findings.push(Finding {
                file: file.clone(),
                line,
                checker_id: result.checker_id.to_string(),
                level: risk.level,
                message: risk.message,
                recommendation: risk.recommendation
            });
        }
    }
    Ok(findings)
}

/// Parse every statement in `content`, memoizing by the full file text in
/// `parse_cache` so a source tree that repeats the same SQL fragment across
/// files only pays the parse cost once per walk.
fn parse_cached(content: &str, dialect: DialectId, parse_cache: &mut HashMap<String, Vec<Query>>) -> AppResult<Vec<Query>> {
    if let Some(cached) = parse_cache.get(content) {
        return Ok(cached.clone());
    }
    let parser_dialect = dialect::to_parser_dialect(dialect);
    let parsed = query::parse_queries(content, parser_dialect)?;
    parse_cache.insert(content.to_string(), parsed.clone());
    Ok(parsed)
}

/// Best-effort 1-indexed line number of `needle`'s first occurrence in
/// `haystack`. `None` when the statement's rendered text doesn't appear
/// verbatim (e.g. the parser normalized whitespace away).
fn line_of(haystack: &str, needle: &str) -> Option<usize> {
    let needle = needle.trim();
    if needle.is_empty() {
        return None;
    }
    let offset = haystack.find(needle)?;
    Some(haystack[..offset].matches('\n').count() + 1)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn scans_sql_file_and_flags_missing_where() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("purge.sql");
        writeln!(std::fs::File::create(&path).unwrap(), "DELETE FROM orders;").unwrap();

        let report = scan_project(dir.path(), DialectId::Generic, &RuntimeConfig::default()).unwrap();
        assert_eq!(report.files_scanned, 1);
        assert!(report.has_critical());
        assert!(report.findings.iter().any(|f| f.checker_id == "NoWhereClause"));
    }

    #[test]
    fn scans_mapper_xml_and_flags_unsafe_placeholder() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("OrderMapper.xml");
        let xml = r#"<select id="findByStatus">SELECT * FROM orders WHERE status = ${status}</select>"#;
        std::fs::write(&path, xml).unwrap();

        let report = scan_project(dir.path(), DialectId::Generic, &RuntimeConfig::default()).unwrap();
        assert_eq!(report.files_scanned, 1);
        assert!(report.findings.iter().any(|f| f.checker_id.contains("MYBATIS_SQL_INJECTION")));
    }

    #[test]
    fn clean_sql_produces_no_findings() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ok.sql");
        std::fs::write(&path, "SELECT id FROM orders WHERE id = 1 ORDER BY id LIMIT 10;").unwrap();

        let report = scan_project(dir.path(), DialectId::Generic, &RuntimeConfig::default()).unwrap();
        assert!(report.is_clean());
    }

    #[test]
    fn ignores_files_with_other_extensions() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "DELETE FROM orders;").unwrap();

        let report = scan_project(dir.path(), DialectId::Generic, &RuntimeConfig::default()).unwrap();
        assert_eq!(report.files_scanned, 0);
    }

    #[test]
    fn missing_project_path_errors() {
        let err = scan_project(Path::new("/nonexistent/path/xyz"), DialectId::Generic, &RuntimeConfig::default());
        assert!(err.is_err());
    }
}
