//! Node-indexed store of computed automata.
//!
//! The map owns its automata: `set` drops any previous value for the
//! node, `get` hands out borrows, and dropping the map releases
//! everything exactly once. The original implementation tracked this by
//! hand through raw pointers; here ownership is the type system's
//! problem.

use std::collections::HashMap;

use strand_automata::StringAutomaton;

use crate::depgraph::NodeId;

#[derive(Debug, Default)]
pub struct AnalysisResult {
    values: HashMap<NodeId, StringAutomaton>,
}

impl AnalysisResult {
    pub fn new() -> Self {
        AnalysisResult::default()
    }

    /// Stores `value` for `node`, dropping any previous value.
    pub fn set(&mut self, node: NodeId, value: StringAutomaton) {
        self.values.insert(node, value);
    }

    pub fn get(&self, node: NodeId) -> Option<&StringAutomaton> {
        self.values.get(&node)
    }

    /// The memoization gate of the traversals.
    pub fn contains(&self, node: NodeId) -> bool {
        self.values.contains_key(&node)
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &StringAutomaton)> {
        self.values.iter().map(|(&id, a)| (id, a))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::depgraph::{DepGraph, NodeKind, Place};

    fn graph_with_two_nodes() -> (DepGraph, NodeId, NodeId) {
        let mut g = DepGraph::new();
        let a = g.add_node(NodeKind::Normal {
            place: Place::Var("a".to_string()),
        });
        let b = g.add_node(NodeKind::Normal {
            place: Place::Var("b".to_string()),
        });
        (g, a, b)
    }

    #[test]
    fn set_then_get_returns_the_same_language() {
        let (_g, a, _b) = graph_with_two_nodes();
        let mut result = AnalysisResult::new();
        result.set(a, StringAutomaton::literal("v"));
        let got = result.get(a).unwrap();
        assert!(got.accepts("v"));
        assert!(!got.accepts("w"));
    }

    #[test]
    fn overwrite_replaces_the_value() {
        let (_g, a, _b) = graph_with_two_nodes();
        let mut result = AnalysisResult::new();
        result.set(a, StringAutomaton::literal("first"));
        result.set(a, StringAutomaton::literal("second"));
        assert_eq!(result.len(), 1);
        assert!(result.get(a).unwrap().accepts("second"));
        assert!(!result.get(a).unwrap().accepts("first"));
    }

    #[test]
    fn contains_gates_recomputation() {
        let (_g, a, b) = graph_with_two_nodes();
        let mut result = AnalysisResult::new();
        result.set(a, StringAutomaton::empty_set());
        assert!(result.contains(a));
        assert!(!result.contains(b));
    }

    #[test]
    fn clear_empties_the_map() {
        let (_g, a, b) = graph_with_two_nodes();
        let mut result = AnalysisResult::new();
        result.set(a, StringAutomaton::any_string());
        result.set(b, StringAutomaton::any_string());
        result.clear();
        assert!(result.is_empty());
        assert!(result.get(a).is_none());
        assert!(result.get(b).is_none());
    }
}
