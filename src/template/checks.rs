//! Injection-sink detection over a parsed mapper template (spec.md §4.3).
//!
//! `#{name}` binds as a parameter; `${name}` splices its value directly into
//! the SQL text. The second form is the template analyzer's reason for
//! existing: a `${name}` anywhere in a statement — no matter how deeply
//! nested under `<if>`/`<choose>`/`<foreach>` — is a potential injection
//! sink, since the AST-level checkers in [`crate::checkers`] never see the
//! assembled SQL text at all.
//!
//! Not every `${name}` is equally dangerous: one spliced into `ORDER BY` or
//! a table name only ever selects *which* column/table is used, not
//! arbitrary predicate logic, so the spec treats those two syntactic
//! positions ("hosts") as downgradable via an allow-list of known-safe
//! identifiers, while every other host (`WHERE`, `LIMIT`/`OFFSET`, a column
//! list, an assignment's right-hand side) stays CRITICAL unconditionally.

use std::collections::HashSet;

use super::MYBATIS_SQL_INJECTION;
use crate::{
    checkers::{RiskLevel, RiskScore},
    fingerprint::ParamUsage,
    template::node::TemplateNode
};

/// The syntactic position a placeholder sits in, inferred from the literal
/// SQL text immediately preceding it within the same statement. This is a
/// keyword-proximity heuristic, not a real SQL parse (the surrounding text
/// is template source, not necessarily valid SQL on its own) — good enough
/// to separate "selects which column/table" from "injects predicate logic".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Host {
    Where,
    Limit,
    ColumnList,
    Assignment,
    OrderBy,
    Table,
    /// No recognized keyword precedes the placeholder; treated as unsafe by
    /// default rather than guessed into a downgradable host.
    Unknown
}

impl Host {
    fn is_downgradable(self) -> bool {
        matches!(self, Self::OrderBy | Self::Table)
    }
}

impl std::fmt::Display for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Where => write!(f, "WHERE"),
            Self::Limit => write!(f, "LIMIT/OFFSET"),
            Self::ColumnList => write!(f, "column list"),
            Self::Assignment => write!(f, "assignment"),
            Self::OrderBy => write!(f, "ORDER BY"),
            Self::Table => write!(f, "table/FROM"),
            Self::Unknown => write!(f, "unrecognized position")
        }
    }
}

/// One unsafe placeholder found inside a mapper statement.
#[derive(Debug, Clone)]
pub struct TemplateFinding {
    pub statement_id:  String,
    pub checker_id:    &'static str,
    pub placeholder:   Option<String>,
    pub host:          Option<Host>,
    /// The `<if test="...">`/`<when test="...">` conditions (outermost
    /// first) that must hold for this finding's branch to execute. Empty
    /// means the finding is reachable unconditionally.
    pub branch_witness: Vec<String>,
    pub risk:          RiskScore
}

/// Walk every node reachable from `roots` looking for `<select>`/`<insert>`/
/// `<update>`/`<delete>` statements, and scan each one for unsafe
/// placeholders. `allow_list` holds identifiers considered safe in an
/// `ORDER BY`/table-name position (spec.md §4.3).
pub fn scan_mapper(roots: &[TemplateNode], allow_list: &HashSet<String>) -> Vec<TemplateFinding> {
    let mut findings = Vec::new();
    for node in roots {
        if let TemplateNode::Statement {
            id,
            children,
            ..
        } = node
        {
            findings.extend(scan_statement(id, children, allow_list));
        }
    }
    findings
}

/// Scan one statement's children for `${name}` placeholders at any nesting
/// depth, tracking the preceding literal text (for host classification) and
/// the enclosing `<if>`/`<when>` conditions (for the branch witness).
pub fn scan_statement(statement_id: &str, nodes: &[TemplateNode], allow_list: &HashSet<String>) -> Vec<TemplateFinding> {
    let mut findings = Vec::new();
    let mut preceding = String::new();
    let mut witness = Vec::new();
    walk(statement_id, nodes, &mut preceding, &mut witness, allow_list, &mut findings);
    findings
}

fn walk(
    statement_id: &str,
    nodes: &[TemplateNode],
    preceding: &mut String,
    witness: &mut Vec<String>,
    allow_list: &HashSet<String>,
    findings: &mut Vec<TemplateFinding>
) {
    for node in nodes {
        match node {
            TemplateNode::Text(text) => preceding.push_str(text),
            TemplateNode::Placeholder {
                name,
                style: ParamUsage::Identifier
            } => {
                let host = classify_host(preceding);
                if let Some(finding) = evaluate(statement_id, name, host, witness, allow_list) {
                    findings.push(finding);
                }
                preceding.push_str(name);
            }
            TemplateNode::Placeholder {
                style: ParamUsage::Literal,
                ..
            } => preceding.push('?'),
            TemplateNode::If {
                test,
                children
            } => {
                witness.push(test.clone());
                walk(statement_id, children, preceding, witness, allow_list, findings);
                witness.pop();
            }
            TemplateNode::Choose {
                whens,
                otherwise
            } => {
                // Each branch is a mutually exclusive execution path: fork
                // the preceding-text accumulator so sibling branches don't
                // see each other's text, but leave `preceding` itself
                // untouched for whatever follows the `<choose>`.
                for (test, children) in whens {
                    let mut branch_text = preceding.clone();
                    witness.push(test.clone());
                    walk(statement_id, children, &mut branch_text, witness, allow_list, findings);
                    witness.pop();
                }
                let mut branch_text = preceding.clone();
                witness.push("otherwise".to_string());
                walk(statement_id, otherwise, &mut branch_text, witness, allow_list, findings);
                witness.pop();
            }
            TemplateNode::Otherwise(children) => walk(statement_id, children, preceding, witness, allow_list, findings),
            TemplateNode::Foreach {
                children, ..
            }
            | TemplateNode::Where(children)
            | TemplateNode::Set(children)
            | TemplateNode::Trim {
                children, ..
            }
            | TemplateNode::Fragment {
                children, ..
            }
            | TemplateNode::Unknown {
                children, ..
            }
            | TemplateNode::Statement {
                children, ..
            } => walk(statement_id, children, preceding, witness, allow_list, findings),
            TemplateNode::Include {
                ..
            } => {}
        }
    }
}

/// Classify the host of a placeholder from the SQL text immediately
/// preceding it, by finding the rightmost (most recent) recognized keyword.
fn classify_host(preceding: &str) -> Host {
    let lower = preceding.to_lowercase();
    let mut best: Option<(usize, Host)> = None;
    let mut consider = |needle: &str, host: Host| {
        if let Some(pos) = lower.rfind(needle)
            && best.is_none_or(|(best_pos, _)| pos > best_pos)
        {
            best = Some((pos, host));
        }
    };
    consider("order by", Host::OrderBy);
    consider("from", Host::Table);
    consider("join", Host::Table);
    consider("into", Host::Table);
    consider("limit", Host::Limit);
    consider("offset", Host::Limit);
    consider("set ", Host::Assignment);
    consider("where", Host::Where);
    consider(" and ", Host::Where);
    consider(" or ", Host::Where);
    consider(", ", Host::ColumnList);
    best.map(|(_, host)| host).unwrap_or(Host::Unknown)
}

fn evaluate(
    statement_id: &str,
    name: &str,
    host: Host,
    witness: &[String],
    allow_list: &HashSet<String>
) -> Option<TemplateFinding> {
    if host.is_downgradable() && allow_list.contains(&name.to_lowercase()) {
        return None;
    }

    let (level, numeric) = if host.is_downgradable() {
        (RiskLevel::Medium, 55)
    } else {
        (RiskLevel::Critical, 100)
    };

    let risk = RiskScore::new(
        level,
        numeric,
        format!("${{{name}}} splices its value into the SQL text instead of binding it ({host} position)")
    )
    .with_recommendation(if host.is_downgradable() {
        format!("allow-list {name} as a known {host} identifier, or bind it with #{{{name}}} instead")
    } else {
        format!("bind {name} with #{{{name}}} instead of ${{{name}}}")
    })
    .with_metadata("statementId", statement_id)
    .with_metadata("placeholder", name)
    .with_metadata("host", host.to_string());

    Some(TemplateFinding {
        statement_id: statement_id.to_string(),
        checker_id: MYBATIS_SQL_INJECTION,
        placeholder: Some(name.to_string()),
        host: Some(host),
        branch_witness: witness.to_vec(),
        risk
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::parse_mapper;

    fn scan(xml: &str) -> Vec<TemplateFinding> {
        scan_with_allow_list(xml, &HashSet::new())
    }

    fn scan_with_allow_list(xml: &str, allow_list: &HashSet<String>) -> Vec<TemplateFinding> {
        let (roots, _) = parse_mapper(xml);
        scan_mapper(&roots, allow_list)
    }

    #[test]
    fn flags_where_splice_as_critical() {
        let findings = scan(r#"<select id="findUser">SELECT * FROM users WHERE id = ${id}</select>"#);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].risk.level, RiskLevel::Critical);
        assert_eq!(findings[0].host, Some(Host::Where));
    }

    #[test]
    fn order_by_splice_is_medium_not_critical() {
        let findings = scan(r#"<select id="sortUsers">SELECT * FROM users ORDER BY ${sortColumn}</select>"#);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].placeholder.as_deref(), Some("sortColumn"));
        assert_eq!(findings[0].risk.level, RiskLevel::Medium);
        assert_eq!(findings[0].host, Some(Host::OrderBy));
    }

    #[test]
    fn order_by_splice_is_suppressed_by_allow_list() {
        let allow_list: HashSet<String> = ["sortcolumn".to_string()].into_iter().collect();
        let findings = scan_with_allow_list(
            r#"<select id="sortUsers">SELECT * FROM users ORDER BY ${sortColumn}</select>"#,
            &allow_list
        );
        assert!(findings.is_empty());
    }

    #[test]
    fn table_name_splice_is_medium_and_allow_listable() {
        let findings = scan(r#"<select id="s">SELECT * FROM ${tableName} WHERE id = #{id}</select>"#);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].host, Some(Host::Table));
        assert_eq!(findings[0].risk.level, RiskLevel::Medium);

        let allow_list: HashSet<String> = ["tablename".to_string()].into_iter().collect();
        assert!(scan_with_allow_list(r#"<select id="s">SELECT * FROM ${tableName} WHERE id = #{id}</select>"#, &allow_list).is_empty());
    }

    #[test]
    fn bound_placeholder_is_not_flagged() {
        let findings = scan(r#"<select id="findUser">SELECT * FROM users WHERE id = #{id}</select>"#);
        assert!(findings.is_empty());
    }

    #[test]
    fn finds_unsafe_placeholder_nested_under_choose_and_if_with_branch_witness() {
        let findings = scan(
            r#"<select id="s">SELECT * FROM t
                <choose>
                    <when test="sort != null">ORDER BY ${sort}</when>
                    <otherwise>ORDER BY id</otherwise>
                </choose>
            </select>"#
        );
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].statement_id, "s");
        assert_eq!(findings[0].branch_witness, vec!["sort != null".to_string()]);
    }

    #[test]
    fn finds_unsafe_placeholder_nested_under_foreach() {
        let findings = scan(
            r#"<update id="bulkMove">UPDATE t SET bucket = ${bucket}
                <foreach collection="ids" item="id">#{id}</foreach>
            </update>"#
        );
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].placeholder.as_deref(), Some("bucket"));
        assert_eq!(findings[0].host, Some(Host::Assignment));
    }
}
