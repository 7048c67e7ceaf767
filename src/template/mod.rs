//! Mapper-template analyzer (spec.md §4.3, component C).
//!
//! Parses MyBatis/iBATIS-style XML mapper files into a [`TemplateNode`] tree
//! and runs two families of check against it: unsafe-placeholder detection
//! ([`checks`]) and structural checks on the template's shape ([`structural`]).
//! Both see every `<if>`/`<choose>`/`<foreach>` branch, including ones an
//! AST-level checker in [`crate::checkers`] never would, since those only
//! ever run against one fully-assembled SQL string.

mod checks;
mod node;
mod parse;
mod structural;

use std::collections::HashSet;

pub use checks::{Host, TemplateFinding, scan_mapper, scan_statement};
pub use node::{StatementKind, TemplateNode};
pub use parse::{ParseIssue, parse_mapper, resolve_includes};

use crate::checkers::{RiskLevel, RiskScore};

/// A `${name}` splice with no safe host classification, or one that isn't
/// allow-listed.
pub const MYBATIS_SQL_INJECTION: &str = "MYBATIS_SQL_INJECTION";
/// Non-fatal parse or `<include>`-resolution problem.
pub const MYBATIS_PARSE_ERROR: &str = "MYBATIS_PARSE_ERROR";
/// A DELETE/UPDATE template with a branch that reaches no WHERE clause.
pub const MYBATIS_MISSING_WHERE: &str = "MYBATIS_MISSING_WHERE";
/// A SELECT template with no LIMIT on any reachable path.
pub const MYBATIS_NO_PAGINATION: &str = "MYBATIS_NO_PAGINATION";
/// A paginated SELECT template with no ORDER BY on any reachable path.
pub const MYBATIS_MISSING_ORDER_BY: &str = "MYBATIS_MISSING_ORDER_BY";
/// A tautological condition (1=1/true) found in the statement's own text.
pub const MYBATIS_DUMMY_CONDITION: &str = "MYBATIS_DUMMY_CONDITION";
/// An unfiltered `SELECT *`.
pub const MYBATIS_SELECT_STAR: &str = "MYBATIS_SELECT_STAR";

/// Parse `xml`, resolve its `<include>` sites, and run both check families
/// over every statement. `allow_list` holds identifiers considered safe in
/// an `ORDER BY`/table-name placeholder position. Never fails: a malformed
/// document degrades to a [`MYBATIS_PARSE_ERROR`] finding plus whatever
/// partial tree the parser recovered, instead of aborting the whole file.
pub fn analyze_mapper(xml: &str, allow_list: &HashSet<String>) -> Vec<TemplateFinding> {
    let (roots, parse_issues) = parse_mapper(xml);
    let (roots, include_issues) = resolve_includes(roots);

    let mut findings: Vec<TemplateFinding> = parse_issues
        .into_iter()
        .chain(include_issues)
        .map(|issue| TemplateFinding {
            statement_id:   String::new(),
            checker_id:     MYBATIS_PARSE_ERROR,
            placeholder:    None,
            host:           None,
            branch_witness: Vec::new(),
            risk:           RiskScore::new(RiskLevel::Low, 10, issue.message)
        })
        .collect();

    findings.extend(scan_mapper(&roots, allow_list));

    for root in &roots {
        if let TemplateNode::Statement {
            kind,
            id,
            children
        } = root
        {
            findings.extend(structural::analyze_statement(*kind, id, children));
        }
    }

    findings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analyze_mapper_combines_injection_and_structural_findings() {
        let findings = analyze_mapper(
            r#"<delete id="purge">DELETE FROM orders WHERE status = ${status}</delete>"#,
            &HashSet::new()
        );
        assert!(findings.iter().any(|f| f.checker_id == MYBATIS_SQL_INJECTION));
    }

    #[test]
    fn analyze_mapper_surfaces_parse_errors_as_low_findings_not_a_panic() {
        let findings = analyze_mapper("<select id=\"s\">SELECT 1", &HashSet::new());
        assert!(findings.iter().any(|f| f.checker_id == MYBATIS_PARSE_ERROR));
    }
}
