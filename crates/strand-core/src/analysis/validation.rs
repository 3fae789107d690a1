//! Validation-extraction backward analysis.
//!
//! A sanitizer's *validation* logic is the sub-computation downstream of
//! its first guard (`__vlab_restrict`) operation. This computer walks the
//! same backward BFS as the general engine but stays in a "searching"
//! state until it meets a guard; nodes seen before that keep the seeded
//! root value untouched. From the guard on, pre-images are computed with
//! validation-specific transfer rules (no forward result exists in this
//! phase, so inversions rebuild their own forward images from Σ*).

use std::collections::{HashSet, VecDeque};

use strand_automata::{HtmlFlag, StringAutomaton};

use crate::config::AnalysisSettings;
use crate::depgraph::{DepGraph, NodeId, NodeKind, Subgraph, node_index};
use crate::error::AnalysisError;

use super::result::AnalysisResult;
use super::{
    COARSE_WIDENING_THRESHOLD, ImageComputer, PRECISE_WIDENING_THRESHOLD, SCC_ITERATION_CAP,
    tagged,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// A guard operation was found; the result holds its pre-image.
    ValidationFound,
    /// No guard anywhere: the result is the trivial passthrough.
    NoValidation,
}

pub struct ValidationImageComputer {
    computer: ImageComputer,
}

impl Default for ValidationImageComputer {
    fn default() -> Self {
        ValidationImageComputer::new(AnalysisSettings::default())
    }
}

impl ValidationImageComputer {
    pub fn new(settings: AnalysisSettings) -> Self {
        ValidationImageComputer {
            computer: ImageComputer::new(settings),
        }
    }

    pub fn backward_analysis_validation(
        &mut self,
        sub: &Subgraph<'_>,
        initial: &StringAutomaton,
    ) -> Result<(AnalysisResult, ValidationOutcome), AnalysisError> {
        let graph = sub.graph();
        let root = sub.root();
        let mut bw = AnalysisResult::new();
        bw.set(root, initial.clone_for(node_index(root) as u32));

        let mut validating = false;
        let mut queue: VecDeque<NodeId> = VecDeque::new();
        let mut visited: HashSet<NodeId> = HashSet::new();
        let mut processed_sccs: HashSet<usize> = HashSet::new();
        queue.push_back(root);
        visited.insert(root);

        while let Some(curr) = queue.pop_front() {
            if !validating {
                if let NodeKind::Op { name } = &graph.get(curr).kind {
                    if name.contains("__vlab_restrict") {
                        validating = true;
                        tracing::debug!(node = node_index(curr), "validation guard found");
                    }
                }
            } else if let Some(scc) = graph.scc_id(curr) {
                if processed_sccs.insert(scc) {
                    self.pre_image_scc_validation(graph, curr, &mut bw)?;
                }
            } else {
                self.pre_image_validation(graph, curr, &mut bw)?;
            }

            for succ in sub.successors(curr) {
                if visited.insert(succ) {
                    // Nodes ahead of the guard keep the seed untouched.
                    bw.set(succ, initial.clone_for(node_index(succ) as u32));
                    queue.push_back(succ);
                }
            }
        }

        let outcome = if validating {
            ValidationOutcome::ValidationFound
        } else {
            ValidationOutcome::NoValidation
        };
        Ok((bw, outcome))
    }

    fn pre_image_validation(
        &mut self,
        graph: &DepGraph,
        node: NodeId,
        bw: &mut AnalysisResult,
    ) -> Result<(), AnalysisError> {
        let value = if graph.predecessors(node).is_empty() {
            self.computer
                .fw_value(bw, node, "root backward value")?
                .clone()
        } else if graph.successors(node).is_empty()
            && matches!(graph.get(node).kind, NodeKind::Normal { .. })
        {
            self.computer.literal_auto(graph, node, false)?
        } else {
            let mut acc: Option<StringAutomaton> = None;
            for i in 0..graph.predecessors(node).len() {
                let pred = graph.predecessors(node)[i];
                if pred == node {
                    continue;
                }
                let contribution = match &graph.get(pred).kind {
                    NodeKind::Normal { .. } | NodeKind::Uninit { .. } => match bw.get(pred) {
                        Some(value) => value.clone_for(node_index(node) as u32),
                        None => continue,
                    },
                    NodeKind::Op { .. } => {
                        if !bw.contains(pred) {
                            continue;
                        }
                        self.pre_image_for_op_child_validation(graph, pred, node, bw)?
                    }
                };
                acc = Some(match acc {
                    None => contribution,
                    Some(current) => current.union(&contribution),
                });
            }
            acc.ok_or_else(|| {
                AnalysisError::malformed(node_index(node), "backward automaton cannot be computed")
            })?
        };
        bw.set(node, tagged(value, node));
        Ok(())
    }

    fn pre_image_scc_validation(
        &mut self,
        graph: &DepGraph,
        node: NodeId,
        bw: &mut AnalysisResult,
    ) -> Result<(), AnalysisError> {
        let scc = graph
            .scc_id(node)
            .ok_or_else(|| AnalysisError::malformed(node_index(node), "node is not in an SCC"))?;

        let members: Vec<NodeId> = graph.scc_nodes(scc).to_vec();
        let mut visit_count: std::collections::HashMap<NodeId, usize> =
            std::collections::HashMap::new();
        for &m in &members {
            bw.set(m, tagged(StringAutomaton::empty_set(), m));
            visit_count.insert(m, 0);
        }

        let mut worklist: VecDeque<NodeId> = VecDeque::new();
        let mut pending: HashSet<NodeId> = HashSet::new();
        for &p in graph.predecessors(node) {
            if pending.insert(p) {
                worklist.push_back(p);
            }
        }

        let mut iterations = 0usize;
        while let Some(curr) = worklist.pop_front() {
            pending.remove(&curr);
            iterations += 1;
            if iterations > SCC_ITERATION_CAP {
                tracing::warn!(
                    scc,
                    iterations,
                    "validation SCC fixed-point hit the iteration cap; result may be unconverged"
                );
                break;
            }

            for i in 0..graph.successors(curr).len() {
                let succ = graph.successors(curr)[i];
                if graph.scc_id(succ) != Some(scc) {
                    continue;
                }

                let contribution = match &graph.get(curr).kind {
                    NodeKind::Normal { .. } | NodeKind::Uninit { .. } => match bw.get(curr) {
                        Some(value) => value.clone(),
                        None => continue,
                    },
                    NodeKind::Op { .. } => {
                        if !bw.contains(curr) {
                            continue;
                        }
                        self.pre_image_for_op_child_validation(graph, curr, succ, bw)?
                    }
                };

                let prev = self.computer.fw_value(bw, succ, "SCC member")?.clone();
                let unioned = contribution.union(&prev);
                let visits = visit_count.get(&succ).copied().unwrap_or(0) + 1;
                let new_value = if visits > COARSE_WIDENING_THRESHOLD {
                    prev.widen_coarse(&unioned)
                } else if visits > PRECISE_WIDENING_THRESHOLD {
                    prev.widen_precise(&unioned)
                } else {
                    unioned
                };

                if !new_value.is_subset_of(&prev) {
                    if pending.insert(succ) {
                        worklist.push_back(succ);
                    }
                    bw.set(succ, tagged(new_value, succ));
                    visit_count.insert(succ, visits);
                }
            }
        }
        Ok(())
    }

    /// Inverts `op` toward `child` without a forward result: forward
    /// images are rebuilt from Σ* where the inversion needs them.
    fn pre_image_for_op_child_validation(
        &mut self,
        graph: &DepGraph,
        op: NodeId,
        child: NodeId,
        bw: &mut AnalysisResult,
    ) -> Result<StringAutomaton, AnalysisError> {
        let name = match &graph.get(op).kind {
            NodeKind::Op { name } => name.clone(),
            _ => {
                return Err(AnalysisError::malformed(
                    node_index(op),
                    "expected an operation node",
                ));
            }
        };
        let op_auto = self
            .computer
            .fw_value(bw, op, "operation backward value")?
            .clone();

        let inverse_via_sigma = |forward: fn(&StringAutomaton) -> StringAutomaton,
                                 pre: fn(&StringAutomaton) -> StringAutomaton|
         -> StringAutomaton {
            let image = forward(&StringAutomaton::any_string());
            pre(&op_auto.intersect(&image))
        };

        let out = if name.contains("__vlab_restrict") {
            let (pattern, subject, complement) = {
                let s = graph.successors(op);
                if s.len() != 3 {
                    return Err(AnalysisError::malformed(
                        node_index(op),
                        format!("'{name}' has {} arguments", s.len()),
                    ));
                }
                (s[0], s[1], s[2])
            };
            if child != subject {
                return Err(AnalysisError::malformed(
                    node_index(child),
                    "child of a guard is not on the backward path",
                ));
            }
            let pattern_auto = self.computer.literal_auto(graph, pattern, true)?;
            let complement_value = self.computer.literal_value(graph, complement)?;
            // The guard removed these strings; the pre-image re-admits them.
            if complement_value.contains("false") || complement_value.contains("FALSE") {
                op_auto.union(&pattern_auto.complement())
            } else {
                op_auto.union(&pattern_auto)
            }
        } else if name == "." || name == "concat" {
            return Err(AnalysisError::NotImplemented {
                node: node_index(op),
                op: format!("{name} in the validation phase"),
            });
        } else if name == "addslashes" {
            inverse_via_sigma(|a| a.add_slashes(), |a| a.pre_add_slashes())
        } else if name == "trim" {
            inverse_via_sigma(|a| a.trim_spaces(), |a| a.pre_trim_spaces())
        } else if name == "ltrim" {
            inverse_via_sigma(|a| a.trim_spaces_left(), |a| a.pre_trim_spaces_left())
        } else if name == "rtrim" {
            inverse_via_sigma(|a| a.trim_spaces_right(), |a| a.pre_trim_spaces_right())
        } else if name == "strtoupper" {
            inverse_via_sigma(|a| a.to_upper_case(), |a| a.pre_to_upper_case())
        } else if name == "strtolower" {
            inverse_via_sigma(|a| a.to_lower_case(), |a| a.pre_to_lower_case())
        } else if name == "mysql_escape_string" {
            inverse_via_sigma(|a| a.mysql_escape(), |a| a.pre_mysql_escape())
        } else if name == "mysql_real_escape_string" {
            inverse_via_sigma(|a| a.mysql_real_escape(), |a| a.pre_mysql_real_escape())
        } else if name == "htmlspecialchars" {
            if child != graph.successors(op)[0] {
                return Err(AnalysisError::malformed(
                    node_index(child),
                    "flag argument of htmlspecialchars must not be on a backward path",
                ));
            }
            let flag = if graph.successors(op).len() > 1 {
                let flag_node = graph.successors(op)[1];
                let flag_text = self.computer.literal_value(graph, flag_node)?;
                HtmlFlag::parse(flag_text).ok_or_else(|| AnalysisError::InvalidArgument {
                    node: node_index(op),
                    op: name.clone(),
                    message: format!("unknown htmlspecialchars flag '{flag_text}'"),
                })?
            } else {
                HtmlFlag::Compat
            };
            let image = StringAutomaton::any_string().html_special_chars(flag);
            op_auto.intersect(&image).pre_html_special_chars(flag)
        } else if name == "preg_replace" || name == "ereg_replace" || name == "str_replace" {
            let (pattern, replace, subject) = {
                let s = graph.successors(op);
                if s.len() != 3 {
                    return Err(AnalysisError::malformed(
                        node_index(op),
                        format!("'{name}' has {} arguments", s.len()),
                    ));
                }
                (s[0], s[1], s[2])
            };
            if child != subject {
                return Err(AnalysisError::malformed(
                    node_index(child),
                    "child of replace is not on the backward path",
                ));
            }
            // No forward pass exists here; run one over the side operands.
            let mut side = AnalysisResult::new();
            self.computer.forward_analysis(graph, pattern, &mut side)?;
            self.computer.forward_analysis(graph, replace, &mut side)?;
            let pattern_auto = self.computer.fw_value(&side, pattern, "replace pattern")?;
            let replace_auto = self
                .computer
                .fw_value(&side, replace, "replace replacement")?;
            let replace_str =
                self.computer
                    .singleton_arg(replace_auto, replace, &name, "replacement")?;
            let image = StringAutomaton::any_string().replace_all(pattern_auto, replace_auto);
            let narrowed = op_auto.intersect(&image);
            let escape_case = pattern_auto.singleton_value().is_ok_and(|p| {
                replace_str.len() == 2
                    && p.len() == 1
                    && p.as_bytes()[0] == replace_str.as_bytes()[1]
            });
            if escape_case {
                narrowed.replace_all(replace_auto, pattern_auto)
            } else {
                narrowed.pre_replace_all(pattern_auto, &replace_str)
            }
        } else if name == "substr" {
            let (start_node, length_node) = {
                let s = graph.successors(op);
                if s.len() != 3 {
                    return Err(AnalysisError::malformed(
                        node_index(op),
                        format!("'{name}' has {} arguments", s.len()),
                    ));
                }
                (s[1], s[2])
            };
            let mut side = AnalysisResult::new();
            self.computer.forward_analysis(graph, start_node, &mut side)?;
            self.computer
                .forward_analysis(graph, length_node, &mut side)?;
            let start_auto = self.computer.fw_value(&side, start_node, "substr start")?;
            let start = self.computer.int_arg(start_auto, start_node, &name, "start")?;
            let length_auto = self.computer.fw_value(&side, length_node, "substr length")?;
            let length = self
                .computer
                .int_arg(length_auto, length_node, &name, "length")?;
            let image = StringAutomaton::any_string().substr(start, length);
            op_auto.intersect(&image).pre_substr(start, length)
        } else if name == "md5" {
            StringAutomaton::any_string()
        } else {
            return Err(AnalysisError::NotImplemented {
                node: node_index(op),
                op: format!("{name} in the validation phase"),
            });
        };
        Ok(tagged(out, child))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::depgraph::parse_str;

    #[test]
    fn no_guard_reports_passthrough() {
        let graph = parse_str(
            r#"digraph d {
                n1 [label="Var: out"];
                n2 [label="Op: strtoupper"];
                n3 [label="Input: x"];
                n1 -> n2;
                n2 -> n3;
            }"#,
        )
        .unwrap();
        let sub = graph.as_subgraph().unwrap();
        let mut vic = ValidationImageComputer::default();
        let seed = StringAutomaton::any_string();
        let (result, outcome) = vic.backward_analysis_validation(&sub, &seed).unwrap();
        assert_eq!(outcome, ValidationOutcome::NoValidation);
        // Everything keeps the seeded value.
        let input = graph.find_input("x").unwrap();
        assert!(result.get(input).unwrap().equals(&seed));
    }

    #[test]
    fn guard_pre_image_readmits_rejected_strings() {
        // out = __vlab_restrict(/^[0-9]+$/, input, false): only digits
        // survive the guard. The pre-image of "nothing bad reaches the
        // sink" (seeded with the empty set) is exactly what the guard
        // filters out: the non-digit strings.
        let graph = parse_str(
            r#"digraph d {
                n1 [label="Var: out"];
                n2 [label="Op: __vlab_restrict"];
                n3 [label="Lit: /^[0-9]+$/"];
                n4 [label="Input: x"];
                n5 [label="Lit: false"];
                n1 -> n2;
                n2 -> n3;
                n2 -> n4;
                n2 -> n5;
            }"#,
        )
        .unwrap();
        let sub = graph.as_subgraph().unwrap();
        let mut vic = ValidationImageComputer::default();
        let seed = StringAutomaton::empty_set();
        let (result, outcome) = vic.backward_analysis_validation(&sub, &seed).unwrap();
        assert_eq!(outcome, ValidationOutcome::ValidationFound);

        let input = graph.find_input("x").unwrap();
        let pre = result.get(input).unwrap();
        assert!(pre.accepts("abc"), "rejected strings are in the pre-image");
        assert!(pre.accepts(""), "empty string does not pass the guard");
        assert!(!pre.accepts("123"), "accepted strings pass the guard");
    }
}
