//! Backward (pre-image) analysis.
//!
//! Starting from a target automaton at the root (typically the overlap of
//! the forward post-image with an attack pattern), a breadth-first walk
//! toward the inputs computes, per node, the values that could drive the
//! root into the target language. Every accepted value is intersected
//! with the node's forward value: the pre-image never claims strings the
//! forward pass proved unreachable.

use std::collections::{HashSet, VecDeque};

use strand_automata::StringAutomaton;

use crate::depgraph::{NodeId, NodeKind, Subgraph, node_index};
use crate::error::AnalysisError;

use super::result::AnalysisResult;
use super::{
    COARSE_WIDENING_THRESHOLD, ImageComputer, PRECISE_WIDENING_THRESHOLD, SCC_ITERATION_CAP,
    tagged,
};

impl ImageComputer {
    /// Runs the backward analysis over `sub`, seeding its root with
    /// `initial`. `fw` is the completed forward result for the same
    /// subgraph. Returns a fresh result map owned by the caller.
    pub fn backward_analysis(
        &mut self,
        sub: &Subgraph<'_>,
        initial: &StringAutomaton,
        fw: &AnalysisResult,
    ) -> Result<AnalysisResult, AnalysisError> {
        let graph = sub.graph();
        let root = sub.root();
        let mut bw = AnalysisResult::new();
        bw.set(root, initial.clone_for(node_index(root) as u32));

        let mut queue: VecDeque<NodeId> = VecDeque::new();
        let mut visited: HashSet<NodeId> = HashSet::new();
        let mut processed_sccs: HashSet<usize> = HashSet::new();
        queue.push_back(root);
        visited.insert(root);

        while let Some(curr) = queue.pop_front() {
            if let Some(scc) = graph.scc_id(curr) {
                if processed_sccs.insert(scc) {
                    self.pre_image_scc(graph, curr, &mut bw, fw)?;
                }
            } else {
                self.pre_image(graph, curr, &mut bw, fw)?;
            }
            for s in sub.successors(curr) {
                if visited.insert(s) {
                    queue.push_back(s);
                }
            }
        }
        Ok(bw)
    }

    /// Single-node pre-image outside cycles.
    fn pre_image(
        &mut self,
        graph: &crate::depgraph::DepGraph,
        node: NodeId,
        bw: &mut AnalysisResult,
        fw: &AnalysisResult,
    ) -> Result<(), AnalysisError> {
        let value = if graph.predecessors(node).is_empty() {
            // The root carries the caller's seed.
            self.fw_value(bw, node, "root backward value")?.clone()
        } else if graph.successors(node).is_empty()
            && matches!(graph.get(node).kind, NodeKind::Normal { .. })
        {
            self.literal_auto(graph, node, false)?
        } else {
            let forward_auto = self.fw_value(fw, node, "forward value")?.clone();
            let mut acc: Option<StringAutomaton> = None;
            for i in 0..graph.predecessors(node).len() {
                let pred = graph.predecessors(node)[i];
                if pred == node {
                    // Simple self-loops are the SCC path's business.
                    continue;
                }
                let contribution = match &graph.get(pred).kind {
                    NodeKind::Normal { .. } | NodeKind::Uninit { .. } => match bw.get(pred) {
                        Some(value) => value.clone_for(node_index(node) as u32),
                        // Not reached by the backward walk yet; nothing
                        // to contribute.
                        None => continue,
                    },
                    NodeKind::Op { .. } => {
                        if !bw.contains(pred) {
                            continue;
                        }
                        self.pre_image_for_op_child(graph, pred, node, bw, fw)?
                    }
                };
                acc = Some(match acc {
                    None => contribution,
                    Some(current) => current.union(&contribution),
                });
            }
            let merged = acc.ok_or_else(|| {
                AnalysisError::malformed(node_index(node), "backward automaton cannot be computed")
            })?;
            forward_auto.intersect(&merged)
        };
        bw.set(node, tagged(value, node));
        Ok(())
    }

    /// SCC pre-image fixed-point. Mirrors the forward variant, with two
    /// differences: contributions run through the backward transfer
    /// functions, and every accepted change is filtered against the
    /// forward value before being stored.
    fn pre_image_scc(
        &mut self,
        graph: &crate::depgraph::DepGraph,
        node: NodeId,
        bw: &mut AnalysisResult,
        fw: &AnalysisResult,
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
                    "backward SCC fixed-point hit the iteration cap; result may be unconverged"
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
                        self.pre_image_for_op_child(graph, curr, succ, bw, fw)?
                    }
                };

                let forward_auto = self.fw_value(fw, succ, "forward value")?.clone();
                let prev = self.fw_value(bw, succ, "SCC member")?.clone();
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
                    let filtered = forward_auto.intersect(&new_value);
                    bw.set(succ, tagged(filtered, succ));
                    visit_count.insert(succ, visits);
                }
            }
        }
        Ok(())
    }
}
