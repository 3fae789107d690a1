//! Operator transfer registry.
//!
//! One entry per modeled builtin: arity bounds, a forward transfer
//! (operand automata in, result automaton out) and a backward-for-child
//! transfer (the operation's backward value in, one operand's backward
//! contribution out). Unknown operators have no entry; the engines record
//! the node and raise `NotImplemented` instead of approximating.

use std::collections::HashMap;

use strand_automata::{HtmlFlag, RegexMode, StringAutomaton};

use crate::depgraph::{DepGraph, NodeId, NodeKind, node_index};
use crate::error::AnalysisError;

use super::result::AnalysisResult;
use super::{ImageComputer, tagged};

type ForwardFn = fn(
    &mut ImageComputer,
    &DepGraph,
    NodeId,
    &mut AnalysisResult,
) -> Result<StringAutomaton, AnalysisError>;

type BackwardFn = fn(
    &ImageComputer,
    &DepGraph,
    NodeId,
    NodeId,
    &AnalysisResult,
    &AnalysisResult,
) -> Result<StringAutomaton, AnalysisError>;

#[derive(Clone, Copy)]
pub(crate) enum ForwardOp {
    /// Applies to the first operand's forward value.
    Unary(fn(&StringAutomaton) -> StringAutomaton),
    Full(ForwardFn),
}

#[derive(Clone, Copy)]
pub(crate) enum BackwardOp {
    /// Applies to the operation's backward value.
    Unary(fn(&StringAutomaton) -> StringAutomaton),
    Full(BackwardFn),
}

#[derive(Clone, Copy)]
pub struct OperatorEntry {
    pub name: &'static str,
    pub min_args: usize,
    pub max_args: Option<usize>,
    pub(crate) forward: ForwardOp,
    pub(crate) backward: BackwardOp,
}

pub struct OperatorRegistry {
    entries: HashMap<&'static str, OperatorEntry>,
}

impl OperatorRegistry {
    pub fn with_defaults() -> Self {
        let mut registry = OperatorRegistry {
            entries: HashMap::new(),
        };
        for entry in default_entries() {
            registry.entries.insert(entry.name, entry);
        }
        registry
    }

    /// Resolves an operator name. Guard operators match by substring,
    /// since front ends suffix `__vlab_restrict` with qualifiers.
    pub fn lookup(&self, name: &str) -> Option<OperatorEntry> {
        if name.contains("__vlab_restrict") {
            return self.entries.get("__vlab_restrict").copied();
        }
        self.entries.get(name).copied()
    }

    pub fn operator_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.entries.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl ImageComputer {
    pub(crate) fn ensure_forward(
        &mut self,
        graph: &DepGraph,
        node: NodeId,
        result: &mut AnalysisResult,
    ) -> Result<(), AnalysisError> {
        if !result.contains(node) {
            self.forward_analysis(graph, node, result)?;
        }
        Ok(())
    }

    fn op_name(&self, graph: &DepGraph, op: NodeId) -> Result<String, AnalysisError> {
        match &graph.get(op).kind {
            NodeKind::Op { name } => Ok(name.clone()),
            _ => Err(AnalysisError::malformed(
                node_index(op),
                "expected an operation node",
            )),
        }
    }

    fn checked_entry(
        &mut self,
        graph: &DepGraph,
        op: NodeId,
        record_unmodeled: bool,
    ) -> Result<OperatorEntry, AnalysisError> {
        let name = self.op_name(graph, op)?;
        let entry = match self.registry.lookup(&name) {
            Some(entry) => entry,
            None => {
                if record_unmodeled {
                    tracing::warn!(op = %name, node = node_index(op), "unmodeled builtin");
                    self.unmodeled.push(op);
                }
                return Err(AnalysisError::NotImplemented {
                    node: node_index(op),
                    op: name,
                });
            }
        };
        let argc = graph.successors(op).len();
        if argc < entry.min_args || entry.max_args.is_some_and(|max| argc > max) {
            return Err(AnalysisError::malformed(
                node_index(op),
                format!("'{name}' has {argc} arguments"),
            ));
        }
        Ok(entry)
    }

    /// Post-image of an operation node.
    pub(crate) fn post_image_for_op(
        &mut self,
        graph: &DepGraph,
        op: NodeId,
        result: &mut AnalysisResult,
    ) -> Result<StringAutomaton, AnalysisError> {
        let entry = self.checked_entry(graph, op, true)?;
        match entry.forward {
            ForwardOp::Full(f) => f(self, graph, op, result),
            ForwardOp::Unary(f) => {
                let operand = graph.successors(op)[0];
                self.ensure_forward(graph, operand, result)?;
                let value = self.fw_value(result, operand, "operand")?;
                Ok(tagged(f(value), op))
            }
        }
    }

    /// Backward contribution of operation `op` toward its operand `child`.
    pub(crate) fn pre_image_for_op_child(
        &mut self,
        graph: &DepGraph,
        op: NodeId,
        child: NodeId,
        bw: &AnalysisResult,
        fw: &AnalysisResult,
    ) -> Result<StringAutomaton, AnalysisError> {
        let entry = self.checked_entry(graph, op, false)?;
        match entry.backward {
            BackwardOp::Full(f) => f(self, graph, op, child, bw, fw),
            BackwardOp::Unary(f) => {
                let op_auto = self.fw_value(bw, op, "operation backward value")?;
                Ok(tagged(f(op_auto), child))
            }
        }
    }
}

// ---- forward transfer functions ----

fn fw_restrict(
    c: &mut ImageComputer,
    g: &DepGraph,
    op: NodeId,
    result: &mut AnalysisResult,
) -> Result<StringAutomaton, AnalysisError> {
    let (pattern, subject, complement) = {
        let s = g.successors(op);
        (s[0], s[1], s[2])
    };
    c.ensure_forward(g, subject, result)?;
    // The pattern argument of a guard is a literal matched anywhere.
    if !result.contains(pattern) {
        let auto = c.literal_auto(g, pattern, true)?;
        result.set(pattern, auto);
    }
    let complement_value = c.literal_value(g, complement)?.to_string();
    let subject_auto = c.fw_value(result, subject, "restrict subject")?;
    let pattern_auto = c.fw_value(result, pattern, "restrict pattern")?;
    let out = if complement_value.contains("false") || complement_value.contains("FALSE") {
        subject_auto.intersect(pattern_auto)
    } else {
        subject_auto.intersect(&pattern_auto.complement())
    };
    Ok(tagged(out, op))
}

fn fw_concat(
    c: &mut ImageComputer,
    g: &DepGraph,
    op: NodeId,
    result: &mut AnalysisResult,
) -> Result<StringAutomaton, AnalysisError> {
    let mut acc: Option<StringAutomaton> = None;
    for i in 0..g.successors(op).len() {
        let operand = g.successors(op)[i];
        c.ensure_forward(g, operand, result)?;
        if c.is_literal(g, operand) && !c.settings().do_concats {
            continue;
        }
        let value = c.fw_value(result, operand, "concat operand")?;
        acc = Some(match acc {
            None => value.clone(),
            Some(current) => current.concat(value),
        });
    }
    let out = acc.ok_or_else(|| {
        AnalysisError::malformed(node_index(op), "no operands contributed to concatenation")
    })?;
    Ok(tagged(out, op))
}

fn replace_operands(
    c: &mut ImageComputer,
    g: &DepGraph,
    op: NodeId,
    result: &mut AnalysisResult,
) -> Result<(NodeId, NodeId, NodeId), AnalysisError> {
    let (pattern, replace, subject) = {
        let s = g.successors(op);
        (s[0], s[1], s[2])
    };
    c.ensure_forward(g, subject, result)?;
    c.ensure_forward(g, pattern, result)?;
    c.ensure_forward(g, replace, result)?;
    Ok((pattern, replace, subject))
}

fn fw_replace(
    c: &mut ImageComputer,
    g: &DepGraph,
    op: NodeId,
    result: &mut AnalysisResult,
) -> Result<StringAutomaton, AnalysisError> {
    let (pattern, replace, subject) = replace_operands(c, g, op, result)?;
    let subject_auto = c.fw_value(result, subject, "replace subject")?;
    let pattern_auto = c.fw_value(result, pattern, "replace pattern")?;
    let replace_auto = c.fw_value(result, replace, "replace replacement")?;
    Ok(tagged(
        subject_auto.replace_all(pattern_auto, replace_auto),
        op,
    ))
}

fn fw_replace_once(
    c: &mut ImageComputer,
    g: &DepGraph,
    op: NodeId,
    result: &mut AnalysisResult,
) -> Result<StringAutomaton, AnalysisError> {
    let (pattern, replace, subject) = replace_operands(c, g, op, result)?;
    let replace_auto = c.fw_value(result, replace, "replace replacement")?;

    // Exploit-prevention heuristic: a replacement embedding the page's
    // own URL can smuggle the taint source past the patch.
    if let Some(url) = &g.metadata().url {
        if let Ok(replace_str) = replace_auto.singleton_value() {
            if replace_str.contains(url.as_str()) {
                return Err(AnalysisError::UrlInReplaceString {
                    node: node_index(op),
                    url: url.clone(),
                });
            }
        }
    }

    let subject_auto = c.fw_value(result, subject, "replace subject")?;
    let pattern_auto = c.fw_value(result, pattern, "replace pattern")?;
    Ok(tagged(
        subject_auto.replace_once(pattern_auto, replace_auto),
        op,
    ))
}

fn fw_match(
    c: &mut ImageComputer,
    g: &DepGraph,
    op: NodeId,
    result: &mut AnalysisResult,
) -> Result<StringAutomaton, AnalysisError> {
    let (pattern, group, subject) = {
        let s = g.successors(op);
        (s[0], s[1], s[2])
    };
    c.ensure_forward(g, subject, result)?;
    c.ensure_forward(g, pattern, result)?;
    c.ensure_forward(g, group, result)?;
    let name = c.op_name(g, op)?;
    let group_auto = c.fw_value(result, group, "match group")?;
    // Validated but not used to narrow the match set; see DESIGN.md.
    let _group = c.int_arg(group_auto, group, &name, "group")?;
    let subject_auto = c.fw_value(result, subject, "match subject")?;
    let pattern_auto = c.fw_value(result, pattern, "match pattern")?;
    Ok(tagged(subject_auto.intersect(pattern_auto), op))
}

fn fw_split(
    c: &mut ImageComputer,
    g: &DepGraph,
    op: NodeId,
    result: &mut AnalysisResult,
) -> Result<StringAutomaton, AnalysisError> {
    let (pattern, subject) = {
        let s = g.successors(op);
        (s[0], s[1])
    };
    c.ensure_forward(g, subject, result)?;
    c.ensure_forward(g, pattern, result)?;
    let subject_auto = c.fw_value(result, subject, "split subject")?;
    let pattern_auto = c.fw_value(result, pattern, "split pattern")?;
    // Split is modeled as deleting the separator, not as a real array.
    Ok(tagged(
        subject_auto.replace_all(pattern_auto, &StringAutomaton::empty_string()),
        op,
    ))
}

fn fw_substr(
    c: &mut ImageComputer,
    g: &DepGraph,
    op: NodeId,
    result: &mut AnalysisResult,
) -> Result<StringAutomaton, AnalysisError> {
    let subject = g.successors(op)[0];
    c.ensure_forward(g, subject, result)?;
    if !c.settings().do_substr {
        let subject_auto = c.fw_value(result, subject, "substr subject")?;
        return Ok(tagged(subject_auto.clone(), op));
    }
    let name = c.op_name(g, op)?;
    let start_node = g.successors(op)[1];
    c.ensure_forward(g, start_node, result)?;
    let start = {
        let start_auto = c.fw_value(result, start_node, "substr start")?;
        c.int_arg(start_auto, start_node, &name, "start")?
    };
    let length = if g.successors(op).len() >= 3 {
        let length_node = g.successors(op)[2];
        c.ensure_forward(g, length_node, result)?;
        let length_auto = c.fw_value(result, length_node, "substr length")?;
        Some(c.int_arg(length_auto, length_node, &name, "length")?)
    } else {
        None
    };
    let subject_auto = c.fw_value(result, subject, "substr subject")?;
    let out = match length {
        Some(length) => subject_auto.substr(start, length),
        None => subject_auto.substr_from(start),
    };
    Ok(tagged(out, op))
}

#[derive(Clone, Copy)]
enum TrimKind {
    Both,
    Left,
    Right,
}

fn trim_like(
    c: &mut ImageComputer,
    g: &DepGraph,
    op: NodeId,
    result: &mut AnalysisResult,
    kind: TrimKind,
) -> Result<StringAutomaton, AnalysisError> {
    let name = c.op_name(g, op)?;
    if g.successors(op).len() == 2 {
        // A custom trim-character set is only supported when it is the
        // default whitespace set anyway.
        let chars_node = g.successors(op)[1];
        let chars = c.literal_value(g, chars_node)?;
        if !chars.bytes().all(|b| b" \t\n\r\0\x0B".contains(&b)) {
            return Err(AnalysisError::NotImplemented {
                node: node_index(op),
                op: format!("{name} with custom trim characters"),
            });
        }
    }
    let subject = g.successors(op)[0];
    c.ensure_forward(g, subject, result)?;
    let subject_auto = c.fw_value(result, subject, "trim subject")?;
    let out = match kind {
        TrimKind::Both => subject_auto.trim_spaces(),
        TrimKind::Left => subject_auto.trim_spaces_left(),
        TrimKind::Right => subject_auto.trim_spaces_right(),
    };
    Ok(tagged(out, op))
}

fn fw_trim(
    c: &mut ImageComputer,
    g: &DepGraph,
    op: NodeId,
    result: &mut AnalysisResult,
) -> Result<StringAutomaton, AnalysisError> {
    trim_like(c, g, op, result, TrimKind::Both)
}

fn fw_ltrim(
    c: &mut ImageComputer,
    g: &DepGraph,
    op: NodeId,
    result: &mut AnalysisResult,
) -> Result<StringAutomaton, AnalysisError> {
    trim_like(c, g, op, result, TrimKind::Left)
}

fn fw_rtrim(
    c: &mut ImageComputer,
    g: &DepGraph,
    op: NodeId,
    result: &mut AnalysisResult,
) -> Result<StringAutomaton, AnalysisError> {
    trim_like(c, g, op, result, TrimKind::Right)
}

fn html_flag(
    c: &mut ImageComputer,
    g: &DepGraph,
    op: NodeId,
    value: &StringAutomaton,
) -> Result<HtmlFlag, AnalysisError> {
    let name = c.op_name(g, op)?;
    let flag_text = c.singleton_arg(value, op, &name, "flag")?;
    HtmlFlag::parse(&flag_text).ok_or_else(|| AnalysisError::InvalidArgument {
        node: node_index(op),
        op: name,
        message: format!("unknown htmlspecialchars flag '{flag_text}'"),
    })
}

fn fw_htmlspecialchars(
    c: &mut ImageComputer,
    g: &DepGraph,
    op: NodeId,
    result: &mut AnalysisResult,
) -> Result<StringAutomaton, AnalysisError> {
    let subject = g.successors(op)[0];
    c.ensure_forward(g, subject, result)?;
    let flag = if g.successors(op).len() > 1 {
        let flag_node = g.successors(op)[1];
        c.ensure_forward(g, flag_node, result)?;
        let flag_auto = c.fw_value(result, flag_node, "htmlspecialchars flag")?.clone();
        html_flag(c, g, op, &flag_auto)?
    } else {
        HtmlFlag::Compat
    };
    let subject_auto = c.fw_value(result, subject, "htmlspecialchars subject")?;
    Ok(tagged(subject_auto.html_special_chars(flag), op))
}

fn fw_md5(
    _c: &mut ImageComputer,
    _g: &DepGraph,
    op: NodeId,
    _result: &mut AnalysisResult,
) -> Result<StringAutomaton, AnalysisError> {
    // A hash is unmodelable; 32 hex chars is the sound coarse shape.
    StringAutomaton::compile_regex("[aAbBcCdDeEfF0-9]{32}", RegexMode::Exact)
        .map(|a| tagged(a, op))
        .map_err(|source| AnalysisError::Automaton {
            node: node_index(op),
            source,
        })
}

// ---- backward transfer functions ----

fn bw_restrict(
    c: &ImageComputer,
    g: &DepGraph,
    op: NodeId,
    child: NodeId,
    bw: &AnalysisResult,
    _fw: &AnalysisResult,
) -> Result<StringAutomaton, AnalysisError> {
    let (pattern, subject, complement) = {
        let s = g.successors(op);
        (s[0], s[1], s[2])
    };
    if child == subject {
        let op_auto = c.fw_value(bw, op, "restrict backward value")?;
        return Ok(op_auto.clone_for(node_index(child) as u32));
    }
    if child == pattern || child == complement {
        return Err(AnalysisError::malformed(
            node_index(child),
            "pattern/complement argument of a guard must not be on a backward path",
        ));
    }
    Err(AnalysisError::malformed(
        node_index(child),
        "child of a guard is not among its operands",
    ))
}

fn bw_concat(
    c: &ImageComputer,
    g: &DepGraph,
    op: NodeId,
    child: NodeId,
    bw: &AnalysisResult,
    fw: &AnalysisResult,
) -> Result<StringAutomaton, AnalysisError> {
    let (left, right) = {
        let s = g.successors(op);
        (s[0], s[1])
    };
    let concat_auto = c.fw_value(bw, op, "concat backward value")?;
    let child_tag = node_index(child) as u32;

    if child == left {
        if fw.get(left).is_none() {
            return Err(AnalysisError::malformed(
                node_index(left),
                "left concat operand was never computed forward",
            ));
        }
        return Ok(match fw.get(right) {
            // The sibling was skipped by the single-input projection;
            // inversion degenerates to a pass-through.
            None => concat_auto.clone_for(child_tag),
            Some(right_fw) => {
                if c.is_literal(g, right) {
                    if c.settings().do_concats {
                        let value = c.literal_value(g, right)?;
                        tagged(concat_auto.left_pre_concat_literal(value), child)
                    } else {
                        concat_auto.clone_for(child_tag)
                    }
                } else {
                    tagged(concat_auto.left_pre_concat(right_fw), child)
                }
            }
        });
    }
    if child == right {
        if fw.get(right).is_none() {
            return Err(AnalysisError::malformed(
                node_index(right),
                "right concat operand was never computed forward",
            ));
        }
        return Ok(match fw.get(left) {
            None => concat_auto.clone_for(child_tag),
            Some(left_fw) => {
                if c.is_literal(g, left) {
                    if c.settings().do_concats {
                        let value = c.literal_value(g, left)?;
                        tagged(concat_auto.right_pre_concat_literal(value), child)
                    } else {
                        concat_auto.clone_for(child_tag)
                    }
                } else {
                    tagged(concat_auto.right_pre_concat(left_fw), child)
                }
            }
        });
    }
    Err(AnalysisError::malformed(
        node_index(child),
        "child of concat is not among its first two operands",
    ))
}

fn bw_replace(
    c: &ImageComputer,
    g: &DepGraph,
    op: NodeId,
    child: NodeId,
    bw: &AnalysisResult,
    fw: &AnalysisResult,
) -> Result<StringAutomaton, AnalysisError> {
    let (pattern, replace) = {
        let s = g.successors(op);
        (s[0], s[1])
    };
    let name = c.op_name(g, op)?;
    let subject_auto = c.fw_value(bw, op, "replace backward value")?;
    let pattern_auto = c.fw_value(fw, pattern, "replace pattern")?;
    let replace_auto = c.fw_value(fw, replace, "replace replacement")?;
    let replace_str = c.singleton_arg(replace_auto, replace, &name, "replacement")?;

    // Escaping special case: pattern is one character, replacement a
    // two-character escape of it. Inverting is replacing the escape
    // sequence with the raw character again.
    if let Ok(pattern_str) = pattern_auto.singleton_value() {
        if replace_str.len() == 2
            && pattern_str.len() == 1
            && pattern_str.as_bytes()[0] == replace_str.as_bytes()[1]
        {
            return Ok(tagged(
                subject_auto.replace_all(replace_auto, pattern_auto),
                child,
            ));
        }
    }
    Ok(tagged(
        subject_auto.pre_replace_all(pattern_auto, &replace_str),
        child,
    ))
}

fn bw_replace_once(
    c: &ImageComputer,
    g: &DepGraph,
    op: NodeId,
    child: NodeId,
    bw: &AnalysisResult,
    fw: &AnalysisResult,
) -> Result<StringAutomaton, AnalysisError> {
    let (pattern, replace) = {
        let s = g.successors(op);
        (s[0], s[1])
    };
    let name = c.op_name(g, op)?;
    let subject_auto = c.fw_value(bw, op, "replace backward value")?;
    let pattern_auto = c.fw_value(fw, pattern, "replace pattern")?;
    let replace_auto = c.fw_value(fw, replace, "replace replacement")?;
    let replace_str = c.singleton_arg(replace_auto, replace, &name, "replacement")?;
    Ok(tagged(
        subject_auto.pre_replace_once(pattern_auto, &replace_str),
        child,
    ))
}

fn bw_split(
    c: &ImageComputer,
    g: &DepGraph,
    op: NodeId,
    child: NodeId,
    bw: &AnalysisResult,
    fw: &AnalysisResult,
) -> Result<StringAutomaton, AnalysisError> {
    let pattern = g.successors(op)[0];
    let subject_auto = c.fw_value(bw, op, "split backward value")?;
    let pattern_auto = c.fw_value(fw, pattern, "split pattern")?;
    Ok(tagged(subject_auto.pre_replace_all(pattern_auto, ""), child))
}

fn bw_substr(
    c: &ImageComputer,
    g: &DepGraph,
    op: NodeId,
    child: NodeId,
    bw: &AnalysisResult,
    fw: &AnalysisResult,
) -> Result<StringAutomaton, AnalysisError> {
    let subject_auto = c.fw_value(bw, op, "substr backward value")?;
    if !c.settings().do_substr {
        return Ok(subject_auto.clone_for(node_index(child) as u32));
    }
    let name = c.op_name(g, op)?;
    let start_node = g.successors(op)[1];
    let start_auto = c.fw_value(fw, start_node, "substr start")?;
    let start = c.int_arg(start_auto, start_node, &name, "start")?;
    let out = if g.successors(op).len() >= 3 {
        let length_node = g.successors(op)[2];
        let length_auto = c.fw_value(fw, length_node, "substr length")?;
        let length = c.int_arg(length_auto, length_node, &name, "length")?;
        subject_auto.pre_substr(start, length)
    } else {
        subject_auto.pre_substr_from(start)
    };
    Ok(tagged(out, child))
}

fn bw_htmlspecialchars(
    c: &ImageComputer,
    g: &DepGraph,
    op: NodeId,
    child: NodeId,
    bw: &AnalysisResult,
    fw: &AnalysisResult,
) -> Result<StringAutomaton, AnalysisError> {
    if child != g.successors(op)[0] {
        return Err(AnalysisError::malformed(
            node_index(child),
            "flag argument of htmlspecialchars must not be on a backward path",
        ));
    }
    let flag = if g.successors(op).len() > 1 {
        let flag_node = g.successors(op)[1];
        let flag_auto = c.fw_value(fw, flag_node, "htmlspecialchars flag")?;
        let name = c.op_name(g, op)?;
        let flag_text = c.singleton_arg(flag_auto, flag_node, &name, "flag")?;
        HtmlFlag::parse(&flag_text).ok_or_else(|| AnalysisError::InvalidArgument {
            node: node_index(op),
            op: name,
            message: format!("unknown htmlspecialchars flag '{flag_text}'"),
        })?
    } else {
        HtmlFlag::Compat
    };
    let op_auto = c.fw_value(bw, op, "htmlspecialchars backward value")?;
    Ok(tagged(op_auto.pre_html_special_chars(flag), child))
}

fn bw_match(
    c: &ImageComputer,
    _g: &DepGraph,
    op: NodeId,
    child: NodeId,
    bw: &AnalysisResult,
    _fw: &AnalysisResult,
) -> Result<StringAutomaton, AnalysisError> {
    // Matching was already applied as an intersection in the forward
    // pass; its inversion is a pass-through.
    let op_auto = c.fw_value(bw, op, "match backward value")?;
    Ok(op_auto.clone_for(node_index(child) as u32))
}

// ---- the table ----

fn default_entries() -> Vec<OperatorEntry> {
    fn entry(
        name: &'static str,
        min_args: usize,
        max_args: Option<usize>,
        forward: ForwardOp,
        backward: BackwardOp,
    ) -> OperatorEntry {
        OperatorEntry {
            name,
            min_args,
            max_args,
            forward,
            backward,
        }
    }
    use BackwardOp as B;
    use ForwardOp as F;

    vec![
        entry(".", 2, None, F::Full(fw_concat), B::Full(bw_concat)),
        entry("concat", 2, None, F::Full(fw_concat), B::Full(bw_concat)),
        entry(
            "__vlab_restrict",
            3,
            Some(3),
            F::Full(fw_restrict),
            B::Full(bw_restrict),
        ),
        entry(
            "preg_replace",
            3,
            Some(3),
            F::Full(fw_replace),
            B::Full(bw_replace),
        ),
        entry(
            "ereg_replace",
            3,
            Some(3),
            F::Full(fw_replace),
            B::Full(bw_replace),
        ),
        entry(
            "str_replace",
            3,
            Some(3),
            F::Full(fw_replace),
            B::Full(bw_replace),
        ),
        entry(
            "str_replace_once",
            3,
            Some(3),
            F::Full(fw_replace_once),
            B::Full(bw_replace_once),
        ),
        entry(
            "regex_match",
            3,
            Some(3),
            F::Full(fw_match),
            B::Full(bw_match),
        ),
        entry(
            "regex_exec",
            3,
            Some(3),
            F::Full(fw_match),
            B::Full(bw_match),
        ),
        entry("split", 2, Some(2), F::Full(fw_split), B::Full(bw_split)),
        entry("substr", 2, Some(3), F::Full(fw_substr), B::Full(bw_substr)),
        entry(
            "strtoupper",
            1,
            Some(1),
            F::Unary(|a| a.to_upper_case()),
            B::Unary(|a| a.pre_to_upper_case()),
        ),
        entry(
            "strtolower",
            1,
            Some(1),
            F::Unary(|a| a.to_lower_case()),
            B::Unary(|a| a.pre_to_lower_case()),
        ),
        entry(
            "trim",
            1,
            Some(2),
            F::Full(fw_trim),
            B::Unary(|a| a.pre_trim_spaces()),
        ),
        entry(
            "ltrim",
            1,
            Some(2),
            F::Full(fw_ltrim),
            B::Unary(|a| a.pre_trim_spaces_left()),
        ),
        entry(
            "rtrim",
            1,
            Some(2),
            F::Full(fw_rtrim),
            B::Unary(|a| a.pre_trim_spaces_right()),
        ),
        entry(
            "htmlspecialchars",
            1,
            Some(2),
            F::Full(fw_htmlspecialchars),
            B::Full(bw_htmlspecialchars),
        ),
        entry(
            "addslashes",
            1,
            Some(1),
            F::Unary(|a| a.add_slashes()),
            B::Unary(|a| a.pre_add_slashes()),
        ),
        entry(
            "mysql_escape_string",
            1,
            Some(2),
            F::Unary(|a| a.mysql_escape()),
            B::Unary(|a| a.pre_mysql_escape()),
        ),
        entry(
            "mysql_real_escape_string",
            1,
            Some(2),
            F::Unary(|a| a.mysql_real_escape()),
            B::Unary(|a| a.pre_mysql_real_escape()),
        ),
        entry(
            "nl2br",
            1,
            Some(2),
            F::Unary(|a| a.nl2br()),
            B::Unary(|a| a.pre_nl2br()),
        ),
        entry(
            "encodeURIComponent",
            1,
            Some(1),
            F::Unary(|a| a.encode_uri_component()),
            B::Unary(|a| a.decode_uri_component()),
        ),
        entry(
            "decodeURIComponent",
            1,
            Some(1),
            F::Unary(|a| a.decode_uri_component()),
            // The exact inverse explodes on large automata; above the
            // threshold the pre-image degrades to a pass-through.
            B::Unary(|a| {
                if a.state_count() > 1000 {
                    a.clone()
                } else {
                    a.encode_uri_component()
                }
            }),
        ),
        entry(
            "encodeURI",
            1,
            Some(1),
            F::Unary(|a| a.encode_uri()),
            B::Unary(|a| a.decode_uri()),
        ),
        entry(
            "decodeURI",
            1,
            Some(1),
            F::Unary(|a| a.decode_uri()),
            B::Unary(|a| a.encode_uri()),
        ),
        entry(
            "escape",
            1,
            Some(1),
            F::Unary(|a| a.escape_js()),
            B::Unary(|a| a.unescape_js()),
        ),
        entry(
            "unescape",
            1,
            Some(1),
            F::Unary(|a| a.unescape_js()),
            B::Unary(|a| a.escape_js()),
        ),
        entry(
            "JSON.stringify",
            1,
            Some(1),
            F::Unary(|a| a.json_stringify()),
            B::Unary(|a| a.json_parse()),
        ),
        entry(
            "JSON.parse",
            1,
            Some(1),
            F::Unary(|a| a.json_parse()),
            B::Unary(|a| a.json_stringify()),
        ),
        entry(
            "encodeAttrString",
            1,
            Some(2),
            F::Unary(|a| a.encode_attr_string()),
            B::Unary(|a| a.pre_encode_attr_string()),
        ),
        entry(
            "encodeTextFragment",
            1,
            Some(2),
            F::Unary(|a| a.encode_text_fragment()),
            B::Unary(|a| a.pre_encode_text_fragment()),
        ),
        entry("md5", 1, Some(1), F::Full(fw_md5), B::Unary(|_| StringAutomaton::any_string())),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_knows_the_modeled_set() {
        let registry = OperatorRegistry::with_defaults();
        for name in [
            ".",
            "concat",
            "__vlab_restrict",
            "preg_replace",
            "str_replace_once",
            "regex_match",
            "split",
            "substr",
            "htmlspecialchars",
            "trim",
            "strtoupper",
            "addslashes",
            "mysql_real_escape_string",
            "nl2br",
            "encodeURIComponent",
            "decodeURI",
            "escape",
            "JSON.parse",
            "encodeAttrString",
            "md5",
        ] {
            assert!(registry.lookup(name).is_some(), "missing operator {name}");
        }
        assert!(registry.lookup("crypt").is_none());
        assert!(registry.lookup("custom_sanitize").is_none());
    }

    #[test]
    fn vlab_restrict_matches_by_substring() {
        let registry = OperatorRegistry::with_defaults();
        let entry = registry.lookup("__vlab_restrict_html").unwrap();
        assert_eq!(entry.name, "__vlab_restrict");
        assert_eq!(entry.min_args, 3);
    }

    #[test]
    fn arity_bounds_are_recorded() {
        let registry = OperatorRegistry::with_defaults();
        let concat = registry.lookup("concat").unwrap();
        assert_eq!(concat.min_args, 2);
        assert_eq!(concat.max_args, None);
        let substr = registry.lookup("substr").unwrap();
        assert_eq!(substr.max_args, Some(3));
    }

    #[test]
    fn operator_names_are_enumerable() {
        let registry = OperatorRegistry::with_defaults();
        let names = registry.operator_names();
        assert!(names.len() >= 30);
        assert!(names.contains(&"htmlspecialchars"));
    }
}
