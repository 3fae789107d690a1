//! Forward (post-image) analysis.
//!
//! An iterative post-order walk computes, for every node reachable from
//! the entry, an automaton over-approximating the strings its program
//! variable can hold. Nodes inside a non-trivial SCC are resolved once
//! per component by a worklist fixed-point with the widening ladder.

use std::collections::{HashSet, VecDeque};

use strand_automata::StringAutomaton;

use crate::depgraph::{DepGraph, NodeId, NodeKind, Subgraph, node_index};
use crate::error::AnalysisError;

use super::result::AnalysisResult;
use super::{
    COARSE_WIDENING_THRESHOLD, ImageComputer, PRECISE_WIDENING_THRESHOLD, SCC_ITERATION_CAP,
    tagged,
};

impl ImageComputer {
    /// Restricts the walk to the subgraph relevant to `input`, then
    /// computes post-images for it. The input node must be seeded in
    /// `result` before the call.
    pub fn forward_analysis_single_input(
        &mut self,
        graph: &DepGraph,
        input: NodeId,
        result: &mut AnalysisResult,
    ) -> Result<(), AnalysisError> {
        let sub = graph.input_relevant(input).ok_or_else(|| {
            AnalysisError::malformed(
                node_index(input),
                "input node is not relevant to the graph root",
            )
        })?;
        self.forward_over_subgraph(&sub, result)
    }

    /// Walks an input-relevant projection. Traversal order follows the
    /// projection; each node's value is computed against the full graph.
    pub(crate) fn forward_over_subgraph(
        &mut self,
        sub: &Subgraph<'_>,
        result: &mut AnalysisResult,
    ) -> Result<(), AnalysisError> {
        let graph = sub.graph();
        let mut stack = vec![sub.root()];
        let mut visited: HashSet<NodeId> = HashSet::new();
        let mut processed_sccs: HashSet<usize> = HashSet::new();

        while let Some(&curr) = stack.last() {
            let first_visit = visited.insert(curr);
            let succs = sub.successors(curr);
            if !succs.is_empty() && first_visit {
                for &s in succs.iter().rev() {
                    if !result.contains(s) {
                        stack.push(s);
                    }
                }
            } else {
                self.resolve_node(graph, curr, result, &mut processed_sccs, true)?;
                stack.pop();
            }
        }
        Ok(())
    }

    /// General entry: computes the post-image for `node` and everything it
    /// transitively depends on, memoizing into `result`. Also invoked
    /// recursively by transfer functions needing a side value.
    pub fn forward_analysis(
        &mut self,
        graph: &DepGraph,
        node: NodeId,
        result: &mut AnalysisResult,
    ) -> Result<(), AnalysisError> {
        let mut stack = vec![node];
        let mut visited: HashSet<NodeId> = HashSet::new();
        let mut processed_sccs: HashSet<usize> = HashSet::new();

        while let Some(&curr) = stack.last() {
            let first_visit = visited.insert(curr);
            let succs = graph.successors(curr);
            if !succs.is_empty() && first_visit {
                for &s in succs.iter().rev() {
                    if !result.contains(s) {
                        stack.push(s);
                    }
                }
            } else {
                self.resolve_node(graph, curr, result, &mut processed_sccs, false)?;
                stack.pop();
            }
        }
        Ok(())
    }

    fn resolve_node(
        &mut self,
        graph: &DepGraph,
        node: NodeId,
        result: &mut AnalysisResult,
        processed_sccs: &mut HashSet<usize>,
        require_seeded_inputs: bool,
    ) -> Result<(), AnalysisError> {
        if let Some(scc) = graph.scc_id(node) {
            if processed_sccs.insert(scc) {
                self.post_image_scc(graph, node, result)?;
            }
            return Ok(());
        }
        self.post_image(graph, node, result, require_seeded_inputs)
    }

    /// Single-node post-image outside cycles.
    fn post_image(
        &mut self,
        graph: &DepGraph,
        node: NodeId,
        result: &mut AnalysisResult,
        require_seeded_inputs: bool,
    ) -> Result<(), AnalysisError> {
        if result.contains(node) {
            return Ok(());
        }
        let value = match &graph.get(node).kind {
            NodeKind::Normal { .. } => {
                if graph.successors(node).is_empty() {
                    self.literal_auto(graph, node, false)?
                } else {
                    self.union_of_successors(graph, node, result)?
                }
            }
            NodeKind::Op { .. } => self.post_image_for_op(graph, node, result)?,
            NodeKind::Uninit { .. } => {
                if require_seeded_inputs {
                    return Err(AnalysisError::malformed(
                        node_index(node),
                        "input node automaton must be initialized before analysis begins",
                    ));
                }
                tagged(StringAutomaton::empty_set(), node)
            }
        };
        result.set(node, value);
        Ok(())
    }

    /// Merge point: union of all operand values, self-loops skipped.
    fn union_of_successors(
        &mut self,
        graph: &DepGraph,
        node: NodeId,
        result: &mut AnalysisResult,
    ) -> Result<StringAutomaton, AnalysisError> {
        let mut acc: Option<StringAutomaton> = None;
        for i in 0..graph.successors(node).len() {
            let succ = graph.successors(node)[i];
            if succ == node {
                continue;
            }
            if !result.contains(succ) {
                self.forward_analysis(graph, succ, result)?;
            }
            let value = self.fw_value(result, succ, "successor")?;
            acc = Some(match acc {
                None => value.clone(),
                Some(current) => current.union(value),
            });
        }
        let merged = acc.ok_or_else(|| {
            AnalysisError::malformed(node_index(node), "forward automaton cannot be computed")
        })?;
        Ok(tagged(merged, node))
    }

    /// SCC fixed-point: every member starts at bottom, contributions are
    /// unioned along predecessor edges, and the widening ladder forces
    /// convergence.
    fn post_image_scc(
        &mut self,
        graph: &DepGraph,
        node: NodeId,
        result: &mut AnalysisResult,
    ) -> Result<(), AnalysisError> {
        let scc = graph
            .scc_id(node)
            .ok_or_else(|| AnalysisError::malformed(node_index(node), "node is not in an SCC"))?;

        let members: Vec<NodeId> = graph.scc_nodes(scc).to_vec();
        let mut visit_count: std::collections::HashMap<NodeId, usize> =
            std::collections::HashMap::new();
        for &m in &members {
            result.set(m, tagged(StringAutomaton::empty_set(), m));
            visit_count.insert(m, 0);
        }

        // Entry edges: the operands of the node that triggered resolution.
        let mut worklist: VecDeque<NodeId> = VecDeque::new();
        let mut pending: HashSet<NodeId> = HashSet::new();
        for &s in graph.successors(node) {
            if pending.insert(s) {
                worklist.push_back(s);
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
                    "SCC fixed-point hit the iteration cap; result may be unconverged"
                );
                break;
            }

            for i in 0..graph.predecessors(curr).len() {
                let pred = graph.predecessors(curr)[i];
                if graph.scc_id(pred) != Some(scc) {
                    continue;
                }

                let contribution = match &graph.get(pred).kind {
                    NodeKind::Normal { .. } => {
                        // A seed operand outside the SCC may not be
                        // memoized yet.
                        if !result.contains(curr) {
                            self.forward_analysis(graph, curr, result)?;
                        }
                        self.fw_value(result, curr, "SCC member")?.clone()
                    }
                    NodeKind::Op { .. } => self.post_image_for_op(graph, pred, result)?,
                    NodeKind::Uninit { .. } => {
                        return Err(AnalysisError::malformed(
                            node_index(pred),
                            "an input node cannot be an element of an SCC",
                        ));
                    }
                };

                let prev = self.fw_value(result, pred, "SCC member")?.clone();
                let unioned = contribution.union(&prev);
                let visits = visit_count.get(&pred).copied().unwrap_or(0) + 1;
                let new_value = if visits > COARSE_WIDENING_THRESHOLD {
                    prev.widen_coarse(&unioned)
                } else if visits > PRECISE_WIDENING_THRESHOLD {
                    prev.widen_precise(&unioned)
                } else {
                    unioned
                };

                if !new_value.is_subset_of(&prev) {
                    if pending.insert(pred) {
                        worklist.push_back(pred);
                    }
                    result.set(pred, tagged(new_value, pred));
                    visit_count.insert(pred, visits);
                }
            }
        }
        Ok(())
    }
}
