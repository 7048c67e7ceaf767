//! Pull-parser for mapper-style XML templates (spec.md §4.3, component C).
//!
//! Mirrors the shape MyBatis/iBATIS-style mappers use: statement tags
//! wrapping literal SQL text interspersed with `<if>`/`<choose>`/`<foreach>`
//! control flow and `#{name}`/`${name}` placeholders. This parser builds the
//! full [`TemplateNode`] tree; it does not evaluate `test` expressions or
//! expand `<foreach>` — that belongs to a real template engine, out of scope
//! here (spec.md §2 Non-goals). The one thing this module exists to do is
//! see every placeholder regardless of which branch it sits in, so the
//! unsafe `${name}` splice can never hide behind a condition this analyzer
//! doesn't evaluate.
//!
//! Malformed XML never aborts the scan: a document whose open tag is never
//! closed surfaces as a [`ParseIssue`] and the parser returns whatever
//! partial tree it had built, so a typo in one mapper file doesn't hide
//! findings in every sibling statement (spec.md §4.3 "Failure").

use std::{collections::HashMap, sync::LazyLock};

use quick_xml::events::{BytesStart, Event};
use regex::Regex;

use super::node::TemplateNode;
use crate::fingerprint::ParamUsage;

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([#$])\{([^}]+)\}").expect("static placeholder regex is valid"));

/// A non-fatal problem encountered while parsing or resolving a mapper
/// document. Surfaced by [`super::analyze_mapper`] as a `MYBATIS_PARSE_ERROR`
/// finding rather than aborting analysis.
#[derive(Debug, Clone)]
pub struct ParseIssue {
    pub message: String
}

/// Parse a mapper XML document into its top-level nodes (usually one
/// `<select>`/`<insert>`/`<update>`/`<delete>` per statement, plus any
/// `<sql>` fragments referenced via `<include>`), plus any issues
/// encountered along the way. Always returns the best tree it could build,
/// even over malformed input.
pub fn parse_mapper(xml: &str) -> (Vec<TemplateNode>, Vec<ParseIssue>) {
    let mut reader = quick_xml::Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut roots = Vec::new();
    let mut issues = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Eof) => break,
            Ok(Event::Start(tag)) => {
                let owned = tag.into_owned();
                roots.push(parse_element(&mut reader, &owned, &mut issues));
            }
            Ok(Event::Empty(tag)) => {
                roots.push(build_node(&tag_name(&tag), attr_map(&tag), Vec::new()));
            }
            Ok(_) => {}
            Err(e) => {
                issues.push(ParseIssue {
                    message: e.to_string()
                });
                break;
            }
        }
        buf.clear();
    }

    (roots, issues)
}

fn parse_element(reader: &mut quick_xml::Reader<&[u8]>, tag: &BytesStart, issues: &mut Vec<ParseIssue>) -> TemplateNode {
    let name = tag_name(tag);
    let attrs = attr_map(tag);
    let children = read_children(reader, issues);
    build_node(&name, attrs, children)
}

fn read_children(reader: &mut quick_xml::Reader<&[u8]>, issues: &mut Vec<ParseIssue>) -> Vec<TemplateNode> {
    let mut buf = Vec::new();
    let mut children = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(tag)) => {
                let owned = tag.into_owned();
                children.push(parse_element(reader, &owned, issues));
            }
            Ok(Event::Empty(tag)) => {
                children.push(build_node(&tag_name(&tag), attr_map(&tag), Vec::new()));
            }
            Ok(Event::Text(text)) => match text.unescape() {
                Ok(decoded) => children.extend(split_text(&decoded)),
                Err(e) => issues.push(ParseIssue {
                    message: e.to_string()
                })
            },
            Ok(Event::CData(text)) => {
                let decoded = String::from_utf8_lossy(&text.into_inner()).into_owned();
                children.extend(split_text(&decoded));
            }
            Ok(Event::End(_)) => return children,
            Ok(Event::Eof) => {
                issues.push(ParseIssue {
                    message: "unexpected end of mapper XML; a closing tag is missing".to_string()
                });
                return children;
            }
            Ok(_) => {}
            Err(e) => {
                issues.push(ParseIssue {
                    message: e.to_string()
                });
                return children;
            }
        }
        buf.clear();
    }
}

fn tag_name(tag: &BytesStart) -> String {
    String::from_utf8_lossy(tag.name().as_ref()).into_owned()
}

/// Best-effort attribute map: an attribute whose value fails to unescape
/// falls back to its raw (lossy) bytes rather than dropping the whole
/// element.
fn attr_map(tag: &BytesStart) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for attr in tag.attributes().filter_map(Result::ok) {
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map(|v| v.into_owned())
            .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).into_owned());
        map.insert(key, value);
    }
    map
}

fn build_node(name: &str, attrs: HashMap<String, String>, children: Vec<TemplateNode>) -> TemplateNode {
    use super::node::StatementKind;

    match name {
        "select" | "insert" | "update" | "delete" => TemplateNode::Statement {
            kind: StatementKind::from_tag(name),
            id: attrs.get("id").cloned().unwrap_or_default(),
            children
        },
        "if" | "when" => TemplateNode::If {
            test: attrs.get("test").cloned().unwrap_or_default(),
            children
        },
        "choose" => {
            let mut whens = Vec::new();
            let mut otherwise = Vec::new();
            for child in children {
                match child {
                    TemplateNode::If {
                        test,
                        children
                    } => whens.push((test, children)),
                    TemplateNode::Otherwise(c) => otherwise = c,
                    _ => {}
                }
            }
            TemplateNode::Choose {
                whens,
                otherwise
            }
        }
        "otherwise" => TemplateNode::Otherwise(children),
        "foreach" => TemplateNode::Foreach {
            collection: attrs.get("collection").cloned().unwrap_or_default(),
            item: attrs.get("item").cloned().unwrap_or_else(|| "item".to_string()),
            separator: attrs.get("separator").cloned(),
            children
        },
        "where" => TemplateNode::Where(children),
        "set" => TemplateNode::Set(children),
        "trim" => TemplateNode::Trim {
            prefix: attrs.get("prefix").cloned(),
            suffix: attrs.get("suffixOverrides").or_else(|| attrs.get("suffix")).cloned(),
            children
        },
        "include" => TemplateNode::Include {
            refid: attrs.get("refid").cloned().unwrap_or_default()
        },
        "sql" => TemplateNode::Fragment {
            id: attrs.get("id").cloned().unwrap_or_default(),
            children
        },
        other => TemplateNode::Unknown {
            tag: other.to_string(),
            children
        }
    }
}

fn split_text(text: &str) -> Vec<TemplateNode> {
    let mut nodes = Vec::new();
    let mut last = 0;

    for cap in PLACEHOLDER_RE.captures_iter(text) {
        let whole = cap.get(0).expect("group 0 always matches");
        if whole.start() > last {
            push_literal(&mut nodes, &text[last..whole.start()]);
        }
        let style = if &cap[1] == "#" {
            ParamUsage::Literal
        } else {
            ParamUsage::Identifier
        };
        nodes.push(TemplateNode::Placeholder {
            name: cap[2].trim().to_string(),
            style
        });
        last = whole.end();
    }
    if last < text.len() {
        push_literal(&mut nodes, &text[last..]);
    }
    nodes
}

fn push_literal(nodes: &mut Vec<TemplateNode>, literal: &str) {
    if !literal.trim().is_empty() {
        nodes.push(TemplateNode::Text(literal.to_string()));
    }
}

/// Second pass: resolve `<include refid="...">` sites against `<sql id="...">`
/// fragments declared as siblings in the same document. Unresolved and
/// circular references are left in place and reported as [`ParseIssue`]s
/// rather than failing the whole document.
pub fn resolve_includes(roots: Vec<TemplateNode>) -> (Vec<TemplateNode>, Vec<ParseIssue>) {
    let fragments: HashMap<String, Vec<TemplateNode>> = roots
        .iter()
        .filter_map(|n| match n {
            TemplateNode::Fragment {
                id,
                children
            } => Some((id.clone(), children.clone())),
            _ => None
        })
        .collect();

    let mut issues = Vec::new();
    let mut stack = Vec::new();
    let resolved = roots
        .into_iter()
        .map(|n| resolve_node(n, &fragments, &mut stack, &mut issues))
        .collect();
    (resolved, issues)
}

fn resolve_node(
    node: TemplateNode,
    fragments: &HashMap<String, Vec<TemplateNode>>,
    stack: &mut Vec<String>,
    issues: &mut Vec<ParseIssue>
) -> TemplateNode {
    match node {
        TemplateNode::Statement {
            kind,
            id,
            children
        } => TemplateNode::Statement {
            kind,
            id,
            children: resolve_children(children, fragments, stack, issues)
        },
        TemplateNode::If {
            test,
            children
        } => TemplateNode::If {
            test,
            children: resolve_children(children, fragments, stack, issues)
        },
        TemplateNode::Choose {
            whens,
            otherwise
        } => TemplateNode::Choose {
            whens: whens
                .into_iter()
                .map(|(test, children)| (test, resolve_children(children, fragments, stack, issues)))
                .collect(),
            otherwise: resolve_children(otherwise, fragments, stack, issues)
        },
        TemplateNode::Otherwise(children) => TemplateNode::Otherwise(resolve_children(children, fragments, stack, issues)),
        TemplateNode::Foreach {
            collection,
            item,
            separator,
            children
        } => TemplateNode::Foreach {
            collection,
            item,
            separator,
            children: resolve_children(children, fragments, stack, issues)
        },
        TemplateNode::Where(children) => TemplateNode::Where(resolve_children(children, fragments, stack, issues)),
        TemplateNode::Set(children) => TemplateNode::Set(resolve_children(children, fragments, stack, issues)),
        TemplateNode::Trim {
            prefix,
            suffix,
            children
        } => TemplateNode::Trim {
            prefix,
            suffix,
            children: resolve_children(children, fragments, stack, issues)
        },
        TemplateNode::Fragment {
            id,
            children
        } => TemplateNode::Fragment {
            id,
            children: resolve_children(children, fragments, stack, issues)
        },
        TemplateNode::Unknown {
            tag,
            children
        } => TemplateNode::Unknown {
            tag,
            children: resolve_children(children, fragments, stack, issues)
        },
        leaf @ (TemplateNode::Text(_) | TemplateNode::Placeholder {
            ..
        }
        | TemplateNode::Include {
            ..
        }) => leaf
    }
}

fn resolve_children(
    nodes: Vec<TemplateNode>,
    fragments: &HashMap<String, Vec<TemplateNode>>,
    stack: &mut Vec<String>,
    issues: &mut Vec<ParseIssue>
) -> Vec<TemplateNode> {
    let mut out = Vec::with_capacity(nodes.len());
    for node in nodes {
        match node {
            TemplateNode::Include {
                refid
            } => {
                if stack.contains(&refid) {
                    issues.push(ParseIssue {
                        message: format!("circular <include refid=\"{refid}\"> detected")
                    });
                    continue;
                }
                match fragments.get(&refid) {
                    Some(fragment_children) => {
                        stack.push(refid.clone());
                        out.extend(resolve_children(fragment_children.clone(), fragments, stack, issues));
                        stack.pop();
                    }
                    None => issues.push(ParseIssue {
                        message: format!("unresolved <include refid=\"{refid}\">")
                    })
                }
            }
            other => out.push(resolve_node(other, fragments, stack, issues))
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::node::StatementKind;

    #[test]
    fn parses_select_statement_with_id() {
        let (roots, issues) = parse_mapper(r#"<select id="findUser">SELECT * FROM users WHERE id = #{id}</select>"#);
        assert!(issues.is_empty());
        assert_eq!(roots.len(), 1);
        match &roots[0] {
            TemplateNode::Statement {
                kind,
                id,
                ..
            } => {
                assert_eq!(*kind, StatementKind::Select);
                assert_eq!(id, "findUser");
            }
            other => panic!("expected Statement, got {other:?}")
        }
    }

    #[test]
    fn detects_safe_and_unsafe_placeholders() {
        let (roots, _) = parse_mapper(r#"<select id="s">SELECT * FROM ${tableName} WHERE id = #{id}</select>"#);
        let children = roots[0].children();
        let styles: Vec<_> = children
            .iter()
            .filter_map(|n| match n {
                TemplateNode::Placeholder {
                    style, ..
                } => Some(*style),
                _ => None
            })
            .collect();
        assert_eq!(styles, vec![ParamUsage::Identifier, ParamUsage::Literal]);
    }

    #[test]
    fn parses_choose_when_otherwise() {
        let (roots, _) = parse_mapper(
            r#"<select id="s">SELECT * FROM t
                <choose>
                    <when test="a != null">WHERE a = #{a}</when>
                    <otherwise>WHERE 1 = 1</otherwise>
                </choose>
            </select>"#
        );
        let choose = roots[0]
            .children()
            .iter()
            .find(|n| matches!(n, TemplateNode::Choose { .. }))
            .expect("choose node present");
        match choose {
            TemplateNode::Choose {
                whens,
                otherwise
            } => {
                assert_eq!(whens.len(), 1);
                assert!(!otherwise.is_empty());
            }
            _ => unreachable!()
        }
    }

    #[test]
    fn parses_foreach_attributes() {
        let (roots, _) =
            parse_mapper(r#"<select id="s">WHERE id IN <foreach collection="ids" item="id" separator=",">#{id}</foreach></select>"#);
        let foreach = roots[0]
            .children()
            .iter()
            .find(|n| matches!(n, TemplateNode::Foreach { .. }))
            .expect("foreach node present");
        match foreach {
            TemplateNode::Foreach {
                collection,
                item,
                separator,
                ..
            } => {
                assert_eq!(collection, "ids");
                assert_eq!(item, "id");
                assert_eq!(separator.as_deref(), Some(","));
            }
            _ => unreachable!()
        }
    }

    #[test]
    fn malformed_xml_surfaces_as_a_parse_issue_not_a_fatal_error() {
        let (roots, issues) = parse_mapper("<select id=\"s\">SELECT 1");
        assert!(!issues.is_empty());
        // the partial tree still has the statement with what text it saw.
        assert_eq!(roots.len(), 1);
    }

    #[test]
    fn resolves_include_against_a_sibling_sql_fragment() {
        let (roots, parse_issues) = parse_mapper(
            r#"<sql id="cols">id, name</sql>
            <select id="findUser">SELECT <include refid="cols"/> FROM users</select>"#
        );
        assert!(parse_issues.is_empty());
        let (resolved, issues) = resolve_includes(roots);
        assert!(issues.is_empty());
        let statement = resolved
            .iter()
            .find(|n| matches!(n, TemplateNode::Statement { .. }))
            .unwrap();
        let has_include = statement.children().iter().any(|n| matches!(n, TemplateNode::Include { .. }));
        assert!(!has_include, "include site should be spliced with fragment content");
    }

    #[test]
    fn unresolved_include_is_reported_not_fatal() {
        let (roots, _) = parse_mapper(r#"<select id="s">SELECT <include refid="missing"/> FROM t</select>"#);
        let (_, issues) = resolve_includes(roots);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("missing"));
    }
}
