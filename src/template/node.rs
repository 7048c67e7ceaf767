//! The mapper-template AST produced by [`super::parse_mapper`].

use serde::Serialize;

use crate::fingerprint::ParamUsage;

/// DML kind of a top-level `<select>`/`<insert>`/`<update>`/`<delete>` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete
}

impl StatementKind {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "insert" => Self::Insert,
            "update" => Self::Update,
            "delete" => Self::Delete,
            _ => Self::Select
        }
    }
}

/// One node of a parsed mapper template.
///
/// [`TemplateNode::Otherwise`] only ever appears as an intermediate value
/// during parsing — `build_node` folds it into the enclosing
/// [`TemplateNode::Choose`] and it never survives into a finished tree.
#[derive(Debug, Clone, Serialize)]
pub enum TemplateNode {
    Text(String),
    Placeholder {
        name:  String,
        style: ParamUsage
    },
    Statement {
        kind:     StatementKind,
        id:       String,
        children: Vec<TemplateNode>
    },
    If {
        test:     String,
        children: Vec<TemplateNode>
    },
    Choose {
        whens:     Vec<(String, Vec<TemplateNode>)>,
        otherwise: Vec<TemplateNode>
    },
    Otherwise(Vec<TemplateNode>),
    Foreach {
        collection: String,
        item:       String,
        separator:  Option<String>,
        children:   Vec<TemplateNode>
    },
    Where(Vec<TemplateNode>),
    Set(Vec<TemplateNode>),
    Trim {
        prefix:   Option<String>,
        suffix:   Option<String>,
        children: Vec<TemplateNode>
    },
    Include {
        refid: String
    },
    /// A reusable `<sql id="...">` fragment, resolved into its referencing
    /// `<include refid="...">` sites by [`super::parse::resolve_includes`].
    Fragment {
        id:       String,
        children: Vec<TemplateNode>
    },
    Unknown {
        tag:      String,
        children: Vec<TemplateNode>
    }
}

impl TemplateNode {
    pub fn children(&self) -> &[TemplateNode] {
        match self {
            Self::Statement {
                children, ..
            }
            | Self::If {
                children, ..
            }
            | Self::Foreach {
                children, ..
            }
            | Self::Where(children)
            | Self::Set(children)
            | Self::Trim {
                children, ..
            }
            | Self::Otherwise(children)
            | Self::Fragment {
                children, ..
            }
            | Self::Unknown {
                children, ..
            } => children,
            Self::Choose {
                ..
            }
            | Self::Text(_)
            | Self::Placeholder {
                ..
            }
            | Self::Include {
                ..
            } => &[]
        }
    }
}

/// Call `visitor` on every node reachable from `nodes`, including the
/// branches of a [`TemplateNode::Choose`] — `children()` alone does not
/// expose those, since each `<when>`/`<otherwise>` is a distinct
/// control-flow path rather than a flat child list.
pub fn visit_all<'a>(nodes: &'a [TemplateNode], visitor: &mut impl FnMut(&'a TemplateNode)) {
    for node in nodes {
        visitor(node);
        match node {
            TemplateNode::Choose {
                whens,
                otherwise
            } => {
                for (_, children) in whens {
                    visit_all(children, visitor);
                }
                visit_all(otherwise, visitor);
            }
            _ => visit_all(node.children(), visitor)
        }
    }
}
