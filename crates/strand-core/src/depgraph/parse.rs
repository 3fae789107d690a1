//! Parsing of depgraph files (a DOT subset).
//!
//! One graph per file:
//!
//! ```text
//! digraph depgraph {
//!   // url: https://example.com/page
//!   n1 [label="Var: out"];
//!   n2 [label="Op: htmlspecialchars"];
//!   n3 [label="Input: username"];
//!   n4 [label="Lit: ENT_QUOTES"];
//!   n1 -> n2;
//!   n2 -> n3;
//!   n2 -> n4;
//! }
//! ```
//!
//! `a -> b` declares `b` as an operand of `a`; the textual order of edge
//! lines fixes operand order. The root is the unique node nobody uses.
//! `// key: value` comments populate the graph metadata.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use regex::Regex;

use super::{DepGraph, NodeId, NodeKind, Place};

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },
    #[error("line {line}: edge references unknown node '{name}'")]
    UnknownNode { line: usize, name: String },
    #[error("graph has no root: every node is used by another")]
    NoRoot,
    #[error("graph has multiple roots: {names:?}")]
    MultipleRoots { names: Vec<String> },
}

/// Provenance attached to a depgraph file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    pub uuid: Option<String>,
    pub url: Option<String>,
    pub sink: Option<String>,
    pub source: Option<String>,
}

impl Metadata {
    /// Stores a known key; returns false for unrecognized ones.
    pub fn set_field(&mut self, key: &str, value: &str) -> bool {
        let value = Some(value.to_string());
        match key {
            "uuid" => self.uuid = value,
            "url" => self.url = value,
            "sink" => self.sink = value,
            "source" => self.source = value,
            _ => return false,
        }
        true
    }
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('0') => out.push('\0'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

fn node_kind(label: &str, line: usize) -> Result<NodeKind, ParseError> {
    let (kind, value) = label.split_once(':').ok_or_else(|| ParseError::Syntax {
        line,
        message: format!("node label '{label}' has no 'Kind: value' form"),
    })?;
    let value = value.strip_prefix(' ').unwrap_or(value);
    match kind {
        "Var" => Ok(NodeKind::Normal {
            place: Place::Var(value.trim().to_string()),
        }),
        "Lit" => Ok(NodeKind::Normal {
            place: Place::Literal(unescape(value)),
        }),
        "Op" => Ok(NodeKind::Op {
            name: value.trim().to_string(),
        }),
        "Input" => Ok(NodeKind::Uninit {
            name: value.trim().to_string(),
        }),
        other => Err(ParseError::Syntax {
            line,
            message: format!("unknown node kind '{other}'"),
        }),
    }
}

pub fn parse_str(text: &str) -> Result<DepGraph, ParseError> {
    // Unwraps on the literals are compile-time-constant patterns.
    let node_re = Regex::new(r#"^\s*(\w+)\s*\[\s*label="((?:[^"\\]|\\.)*)"\s*\]\s*;?\s*$"#)
        .expect("node regex");
    let edge_re = Regex::new(r"^\s*(\w+)\s*->\s*(\w+)\s*;?\s*$").expect("edge regex");
    let meta_re = Regex::new(r"^\s*//\s*([\w-]+):\s*(.*\S)\s*$").expect("metadata regex");

    let mut graph = DepGraph::new();
    let mut metadata = Metadata::default();
    let mut names: HashMap<String, NodeId> = HashMap::new();
    let mut order: Vec<(NodeId, String)> = Vec::new();

    for (i, raw) in text.lines().enumerate() {
        let line_no = i + 1;
        let line = raw.trim();
        if line.is_empty()
            || line.starts_with("digraph")
            || line == "}"
            || line.starts_with("label=")
            || line.starts_with("labelloc")
        {
            continue;
        }
        if let Some(caps) = meta_re.captures(line) {
            metadata.set_field(&caps[1], &caps[2]);
            continue;
        }
        if line.starts_with("//") {
            continue;
        }
        if let Some(caps) = node_re.captures(line) {
            let name = caps[1].to_string();
            if names.contains_key(&name) {
                return Err(ParseError::Syntax {
                    line: line_no,
                    message: format!("node '{name}' declared twice"),
                });
            }
            let kind = node_kind(&caps[2], line_no)?;
            let id = graph.add_node(kind);
            names.insert(name.clone(), id);
            order.push((id, name));
            continue;
        }
        if let Some(caps) = edge_re.captures(line) {
            let from = *names.get(&caps[1]).ok_or_else(|| ParseError::UnknownNode {
                line: line_no,
                name: caps[1].to_string(),
            })?;
            let to = *names.get(&caps[2]).ok_or_else(|| ParseError::UnknownNode {
                line: line_no,
                name: caps[2].to_string(),
            })?;
            graph.add_edge(from, to);
            continue;
        }
        return Err(ParseError::Syntax {
            line: line_no,
            message: format!("unrecognized line: {line}"),
        });
    }

    let roots: Vec<&(NodeId, String)> = order
        .iter()
        .filter(|(id, _)| graph.predecessors(*id).is_empty())
        .collect();
    match roots.as_slice() {
        [] => return Err(ParseError::NoRoot),
        [(root, _)] => graph.set_root(*root),
        many => {
            return Err(ParseError::MultipleRoots {
                names: many.iter().map(|(_, n)| n.clone()).collect(),
            });
        }
    }

    graph.set_metadata(metadata);
    graph.compute_sccs();
    Ok(graph)
}

pub fn parse_file(path: &Path) -> Result<DepGraph, ParseError> {
    let text = std::fs::read_to_string(path).map_err(|source| ParseError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_str(&text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::depgraph::NodeKind;

    const SAMPLE: &str = r#"
digraph depgraph {
  // uuid: 123e4567
  // url: https://example.com/page
  n1 [label="Var: out"];
  n2 [label="Op: concat"];
  n3 [label="Lit: hello "];
  n4 [label="Input: username"];
  n1 -> n2;
  n2 -> n3;
  n2 -> n4;
}
"#;

    #[test]
    fn parses_nodes_edges_and_metadata() {
        let g = parse_str(SAMPLE).unwrap();
        assert_eq!(g.node_count(), 4);
        assert_eq!(g.metadata().uuid.as_deref(), Some("123e4567"));
        assert_eq!(g.metadata().url.as_deref(), Some("https://example.com/page"));

        let root = g.root().unwrap();
        assert!(matches!(&g.get(root).kind, NodeKind::Normal { .. }));
        let concat = g.successors(root)[0];
        assert!(matches!(&g.get(concat).kind, NodeKind::Op { name } if name == "concat"));
        // Operand order follows edge order.
        let operands = g.successors(concat);
        assert!(
            matches!(&g.get(operands[0]).kind, NodeKind::Normal { place: Place::Literal(v) } if v == "hello ")
        );
        assert!(matches!(&g.get(operands[1]).kind, NodeKind::Uninit { name } if name == "username"));
    }

    #[test]
    fn input_lookup_by_field_name() {
        let g = parse_str(SAMPLE).unwrap();
        assert!(g.find_input("username").is_some());
        assert!(g.find_input("missing").is_none());
    }

    #[test]
    fn literal_escapes_are_decoded() {
        let g = parse_str(
            r#"digraph d {
                n1 [label="Var: x"];
                n2 [label="Lit: a\"b\\c\nd"];
                n1 -> n2;
            }"#,
        )
        .unwrap();
        let root = g.root().unwrap();
        let lit = g.successors(root)[0];
        match &g.get(lit).kind {
            NodeKind::Normal {
                place: Place::Literal(v),
            } => assert_eq!(v, "a\"b\\c\nd"),
            other => panic!("expected literal, got {other:?}"),
        }
    }

    #[test]
    fn missing_root_is_rejected() {
        let err = parse_str(
            r#"digraph d {
                n1 [label="Var: a"];
                n2 [label="Var: b"];
                n1 -> n2;
                n2 -> n1;
            }"#,
        )
        .unwrap_err();
        assert!(matches!(err, ParseError::NoRoot));
    }

    #[test]
    fn multiple_roots_are_rejected() {
        let err = parse_str(
            r#"digraph d {
                n1 [label="Var: a"];
                n2 [label="Var: b"];
            }"#,
        )
        .unwrap_err();
        assert!(matches!(err, ParseError::MultipleRoots { .. }));
    }

    #[test]
    fn unknown_edge_target_is_rejected() {
        let err = parse_str(
            r#"digraph d {
                n1 [label="Var: a"];
                n1 -> n9;
            }"#,
        )
        .unwrap_err();
        assert!(matches!(err, ParseError::UnknownNode { .. }));
    }

    #[test]
    fn garbage_line_is_a_syntax_error() {
        let err = parse_str("digraph d {\n  what is this\n}").unwrap_err();
        assert!(matches!(err, ParseError::Syntax { line: 2, .. }));
    }

    #[test]
    fn cycles_get_scc_info_at_parse_time() {
        let g = parse_str(
            r#"digraph d {
                n0 [label="Var: root"];
                n1 [label="Var: a"];
                n2 [label="Op: concat"];
                n3 [label="Lit: x"];
                n0 -> n1;
                n1 -> n2;
                n2 -> n1;
                n2 -> n3;
            }"#,
        )
        .unwrap();
        let root = g.root().unwrap();
        let a = g.successors(root)[0];
        assert!(g.is_scc_element(a));
    }
}
