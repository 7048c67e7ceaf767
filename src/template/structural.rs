//! Structural checks on a parsed mapper template (spec.md §4.3).
//!
//! These complement [`super::checks`]'s placeholder-level scan: they look at
//! the shape of a statement's template text and control flow rather than at
//! individual `${name}`/`#{name}` sites. The AST-level checkers in
//! [`crate::checkers`] can't see any of this, because they only ever run
//! against one fully-assembled SQL string — never the template that
//! produced it.

use std::sync::LazyLock;

use regex::Regex;

use super::{
    MYBATIS_DUMMY_CONDITION, MYBATIS_MISSING_ORDER_BY, MYBATIS_MISSING_WHERE, MYBATIS_NO_PAGINATION, MYBATIS_SELECT_STAR,
    checks::TemplateFinding,
    node::{StatementKind, TemplateNode, visit_all}
};
use crate::checkers::{RiskLevel, RiskScore};

static DUMMY_CONDITION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b1\s*=\s*1\b|\btrue\b").expect("static dummy-condition regex is valid"));
static SELECT_STAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)select\s+\*").expect("static select-star regex is valid"));

/// Run every structural check against one statement.
pub fn analyze_statement(kind: StatementKind, statement_id: &str, children: &[TemplateNode]) -> Vec<TemplateFinding> {
    let mut findings = Vec::new();
    let text = collect_text(children);

    if let Some(f) = check_missing_where(kind, statement_id, children) {
        findings.push(f);
    }
    if kind == StatementKind::Select {
        if let Some(f) = check_pagination(statement_id, &text) {
            findings.push(f);
        }
        if let Some(f) = check_select_star(statement_id, &text) {
            findings.push(f);
        }
    }
    if let Some(f) = check_dummy_condition(kind, statement_id, &text) {
        findings.push(f);
    }
    findings
}

fn collect_text(children: &[TemplateNode]) -> String {
    let mut buf = String::new();
    visit_all(children, &mut |node| {
        if let TemplateNode::Text(text) = node {
            buf.push_str(text);
            buf.push(' ');
        }
    });
    buf
}

fn finding(statement_id: &str, checker_id: &'static str, risk: RiskScore) -> TemplateFinding {
    TemplateFinding {
        statement_id: statement_id.to_string(),
        checker_id,
        placeholder: None,
        host: None,
        branch_witness: Vec::new(),
        risk
    }
}

/// A `DELETE`/`UPDATE` whose template has no *unconditional* `WHERE` has a
/// branch (every `<if>`/`<when>` condition false) that reaches the
/// statement's native no-WHERE behavior — the AST checkers can't see this
/// because they only ever see one rendering of the template.
fn check_missing_where(kind: StatementKind, statement_id: &str, children: &[TemplateNode]) -> Option<TemplateFinding> {
    if !matches!(kind, StatementKind::Update | StatementKind::Delete) {
        return None;
    }
    if guarantees_where(children) {
        return None;
    }
    Some(finding(
        statement_id,
        MYBATIS_MISSING_WHERE,
        RiskScore::new(
            RiskLevel::Critical,
            100,
            "no branch of this statement guarantees a WHERE clause; one path renders it unconditionally"
        )
        .with_recommendation("wrap the filter in an unconditional WHERE, or require at least one <if> to hold")
    ))
}

/// Best-effort: a literal, unconditional `WHERE` keyword anywhere in the
/// statement's own text guarantees one. A `<where>` tag or an `<if>`/
/// `<choose>`/`<foreach>` branch does not, since MyBatis's `<where>` strips
/// itself entirely when every inner condition is false.
fn guarantees_where(children: &[TemplateNode]) -> bool {
    children.iter().any(|node| match node {
        TemplateNode::Text(text) => text.to_uppercase().contains("WHERE"),
        TemplateNode::Where(_) | TemplateNode::If {
            ..
        }
        | TemplateNode::Choose {
            ..
        }
        | TemplateNode::Foreach {
            ..
        } => false,
        TemplateNode::Set(children)
        | TemplateNode::Trim {
            children, ..
        }
        | TemplateNode::Fragment {
            children, ..
        }
        | TemplateNode::Unknown {
            children, ..
        } => guarantees_where(children),
        TemplateNode::Statement {
            ..
        }
        | TemplateNode::Otherwise(_)
        | TemplateNode::Placeholder {
            ..
        }
        | TemplateNode::Include {
            ..
        } => false
    })
}

fn check_pagination(statement_id: &str, text: &str) -> Option<TemplateFinding> {
    let lower = text.to_lowercase();
    if lower.contains("limit") {
        if !lower.contains("order by") {
            return Some(finding(
                statement_id,
                MYBATIS_MISSING_ORDER_BY,
                RiskScore::new(
                    RiskLevel::Medium,
                    50,
                    "paginated SELECT template has no ORDER BY on any reachable path"
                )
                .with_recommendation("add an ORDER BY on a column with a stable, unique ordering")
            ));
        }
        return None;
    }
    Some(finding(
        statement_id,
        MYBATIS_NO_PAGINATION,
        RiskScore::new(
            RiskLevel::Medium,
            50,
            "SELECT template has no LIMIT on any reachable path; the full result set is materialized"
        )
        .with_recommendation("add a LIMIT clause and paginate the result set")
    ))
}

fn check_select_star(statement_id: &str, text: &str) -> Option<TemplateFinding> {
    if !SELECT_STAR_RE.is_match(text) {
        return None;
    }
    Some(finding(
        statement_id,
        MYBATIS_SELECT_STAR,
        RiskScore::new(
            RiskLevel::Low,
            25,
            "SELECT * reads every column, including ones added later that the caller never asked for"
        )
        .with_recommendation("list the columns the caller actually needs")
    ))
}

fn check_dummy_condition(kind: StatementKind, statement_id: &str, text: &str) -> Option<TemplateFinding> {
    if !DUMMY_CONDITION_RE.is_match(text) {
        return None;
    }
    let level = match kind {
        StatementKind::Update | StatementKind::Delete => RiskLevel::Critical,
        _ => RiskLevel::High
    };
    Some(finding(
        statement_id,
        MYBATIS_DUMMY_CONDITION,
        RiskScore::new(
            level,
            if level == RiskLevel::Critical { 100 } else { 70 },
            "statement text contains a tautological condition (1=1 or true) that filters no rows"
        )
        .with_recommendation("replace the tautological condition with a real filter predicate")
    ))
}
