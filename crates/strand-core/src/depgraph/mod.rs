//! Dependency graphs: the program representation the analysis runs on.
//!
//! Nodes are values and operations; an edge `a -> b` records that `b` is
//! an operand of `a`. Successors of a node are its operands in argument
//! order; predecessors are its users. Non-trivial strongly connected
//! components (loops in the analyzed program) are computed once at build
//! time with an iterative Tarjan pass and drive the engines' fixed-point
//! handling.

mod parse;

pub use parse::{Metadata, ParseError, parse_file, parse_str};

use std::collections::{HashMap, HashSet};

use id_arena::{Arena, Id};

pub type NodeId = Id<DepNode>;

/// The arena index of a node, used in error payloads and reports.
pub fn node_index(id: NodeId) -> usize {
    id.index()
}

/// What a normal node is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Place {
    /// A literal/constant string value (or `/.../` regex literal).
    Literal(String),
    /// A program identifier.
    Var(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Normal { place: Place },
    Op { name: String },
    Uninit { name: String },
}

#[derive(Debug)]
pub struct DepNode {
    pub id: NodeId,
    pub kind: NodeKind,
    /// Operands, in argument order. Duplicates are meaningful
    /// (e.g. `concat(x, x)`).
    pub successors: Vec<NodeId>,
    /// Users of this node's value; deduplicated.
    pub predecessors: Vec<NodeId>,
}

#[derive(Debug, Default)]
pub struct DepGraph {
    arena: Arena<DepNode>,
    root: Option<NodeId>,
    metadata: Metadata,
    /// Node -> id of its non-trivial SCC.
    scc_member: HashMap<NodeId, usize>,
    /// SCC id -> member nodes.
    scc_components: Vec<Vec<NodeId>>,
}

impl DepGraph {
    pub fn new() -> Self {
        DepGraph::default()
    }

    pub fn add_node(&mut self, kind: NodeKind) -> NodeId {
        self.arena.alloc_with_id(|id| DepNode {
            id,
            kind,
            successors: Vec::new(),
            predecessors: Vec::new(),
        })
    }

    /// Appends `to` to `from`'s operand list.
    pub fn add_edge(&mut self, from: NodeId, to: NodeId) {
        self.arena[from].successors.push(to);
        if !self.arena[to].predecessors.contains(&from) {
            self.arena[to].predecessors.push(from);
        }
    }

    pub fn get(&self, id: NodeId) -> &DepNode {
        &self.arena[id]
    }

    pub fn nodes(&self) -> impl Iterator<Item = &DepNode> {
        self.arena.iter().map(|(_, node)| node)
    }

    pub fn node_count(&self) -> usize {
        self.arena.len()
    }

    pub fn successors(&self, id: NodeId) -> &[NodeId] {
        &self.arena[id].successors
    }

    pub fn predecessors(&self, id: NodeId) -> &[NodeId] {
        &self.arena[id].predecessors
    }

    pub fn set_root(&mut self, root: NodeId) {
        self.root = Some(root);
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn set_metadata(&mut self, metadata: Metadata) {
        self.metadata = metadata;
    }

    pub fn uninit_nodes(&self) -> Vec<NodeId> {
        self.nodes()
            .filter(|n| matches!(n.kind, NodeKind::Uninit { .. }))
            .map(|n| n.id)
            .collect()
    }

    /// Finds the uninitialized input node with the given field name.
    pub fn find_input(&self, name: &str) -> Option<NodeId> {
        self.nodes()
            .find(|n| matches!(&n.kind, NodeKind::Uninit { name: n2 } if n2 == name))
            .map(|n| n.id)
    }

    // ---- SCCs ----

    pub fn is_scc_element(&self, id: NodeId) -> bool {
        self.scc_member.contains_key(&id)
    }

    pub fn scc_id(&self, id: NodeId) -> Option<usize> {
        self.scc_member.get(&id).copied()
    }

    pub fn scc_nodes(&self, scc: usize) -> &[NodeId] {
        &self.scc_components[scc]
    }

    /// Computes non-trivial SCCs over the successor relation (iterative
    /// Tarjan). A component is non-trivial if it has at least two nodes
    /// or a self-loop.
    pub fn compute_sccs(&mut self) {
        self.scc_member.clear();
        self.scc_components.clear();

        let ids: Vec<NodeId> = self.nodes().map(|n| n.id).collect();
        let mut index: HashMap<NodeId, usize> = HashMap::new();
        let mut lowlink: HashMap<NodeId, usize> = HashMap::new();
        let mut on_stack: HashSet<NodeId> = HashSet::new();
        let mut scc_stack: Vec<NodeId> = Vec::new();
        let mut counter = 0usize;

        for &start in &ids {
            if index.contains_key(&start) {
                continue;
            }
            // Explicit DFS frames: (node, next successor position).
            let mut frames: Vec<(NodeId, usize)> = vec![(start, 0)];
            index.insert(start, counter);
            lowlink.insert(start, counter);
            counter += 1;
            scc_stack.push(start);
            on_stack.insert(start);

            while let Some(&(node, pos)) = frames.last() {
                let succs = &self.arena[node].successors;
                if pos < succs.len() {
                    if let Some(frame) = frames.last_mut() {
                        frame.1 += 1;
                    }
                    let next = succs[pos];
                    match index.get(&next) {
                        None => {
                            index.insert(next, counter);
                            lowlink.insert(next, counter);
                            counter += 1;
                            scc_stack.push(next);
                            on_stack.insert(next);
                            frames.push((next, 0));
                        }
                        Some(&next_index) => {
                            if on_stack.contains(&next) {
                                let low = lowlink[&node].min(next_index);
                                lowlink.insert(node, low);
                            }
                        }
                    }
                } else {
                    frames.pop();
                    if let Some(&(parent, _)) = frames.last() {
                        let low = lowlink[&parent].min(lowlink[&node]);
                        lowlink.insert(parent, low);
                    }
                    if lowlink[&node] == index[&node] {
                        let mut component = Vec::new();
                        loop {
                            let member = match scc_stack.pop() {
                                Some(m) => m,
                                None => break,
                            };
                            on_stack.remove(&member);
                            component.push(member);
                            if member == node {
                                break;
                            }
                        }
                        let self_loop = component.len() == 1
                            && self.arena[component[0]]
                                .successors
                                .contains(&component[0]);
                        if component.len() > 1 || self_loop {
                            let scc = self.scc_components.len();
                            for &member in &component {
                                self.scc_member.insert(member, scc);
                            }
                            self.scc_components.push(component);
                        }
                    }
                }
            }
        }
    }

    /// Projects the subgraph relevant to `input`: the nodes whose value
    /// (transitively) depends on it. `None` if the root does not.
    pub fn input_relevant(&self, input: NodeId) -> Option<Subgraph<'_>> {
        let root = self.root?;
        let mut keep: HashSet<NodeId> = HashSet::new();
        let mut stack = vec![input];
        keep.insert(input);
        while let Some(n) = stack.pop() {
            for &p in &self.arena[n].predecessors {
                if keep.insert(p) {
                    stack.push(p);
                }
            }
        }
        if !keep.contains(&root) {
            return None;
        }
        Some(Subgraph {
            graph: self,
            root,
            keep,
        })
    }

    /// The whole graph as a traversal view rooted at `root`.
    pub fn as_subgraph(&self) -> Option<Subgraph<'_>> {
        let root = self.root?;
        Some(Subgraph {
            graph: self,
            root,
            keep: self.nodes().map(|n| n.id).collect(),
        })
    }
}

/// A traversal view over a subset of a graph's nodes. Computation always
/// consults the full graph; only the walk order is restricted.
#[derive(Debug)]
pub struct Subgraph<'g> {
    graph: &'g DepGraph,
    root: NodeId,
    keep: HashSet<NodeId>,
}

impl<'g> Subgraph<'g> {
    pub fn graph(&self) -> &'g DepGraph {
        self.graph
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.keep.contains(&id)
    }

    pub fn node_count(&self) -> usize {
        self.keep.len()
    }

    /// Operands retained by the projection, in argument order.
    pub fn successors(&self, id: NodeId) -> Vec<NodeId> {
        self.graph.arena[id]
            .successors
            .iter()
            .copied()
            .filter(|s| self.keep.contains(s))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str) -> NodeKind {
        NodeKind::Normal {
            place: Place::Var(name.to_string()),
        }
    }

    fn lit(value: &str) -> NodeKind {
        NodeKind::Normal {
            place: Place::Literal(value.to_string()),
        }
    }

    fn op(name: &str) -> NodeKind {
        NodeKind::Op {
            name: name.to_string(),
        }
    }

    #[test]
    fn edges_track_both_directions() {
        let mut g = DepGraph::new();
        let a = g.add_node(var("a"));
        let b = g.add_node(lit("x"));
        g.add_edge(a, b);
        assert_eq!(g.successors(a), &[b]);
        assert_eq!(g.predecessors(b), &[a]);
    }

    #[test]
    fn duplicate_operands_are_kept_in_order() {
        let mut g = DepGraph::new();
        let c = g.add_node(op("concat"));
        let x = g.add_node(var("x"));
        g.add_edge(c, x);
        g.add_edge(c, x);
        assert_eq!(g.successors(c), &[x, x]);
        assert_eq!(g.predecessors(x), &[c]);
    }

    #[test]
    fn tarjan_finds_the_loop() {
        // root -> a -> b -> c -> a  (a cycle of three), plus leaf d.
        let mut g = DepGraph::new();
        let root = g.add_node(var("root"));
        let a = g.add_node(var("a"));
        let b = g.add_node(op("concat"));
        let c = g.add_node(var("c"));
        let d = g.add_node(lit("seed"));
        g.add_edge(root, a);
        g.add_edge(a, b);
        g.add_edge(b, c);
        g.add_edge(c, a);
        g.add_edge(b, d);
        g.set_root(root);
        g.compute_sccs();

        assert!(g.is_scc_element(a));
        assert!(g.is_scc_element(b));
        assert!(g.is_scc_element(c));
        assert!(!g.is_scc_element(root));
        assert!(!g.is_scc_element(d));
        let scc = g.scc_id(a).unwrap();
        assert_eq!(g.scc_id(b), Some(scc));
        assert_eq!(g.scc_nodes(scc).len(), 3);
    }

    #[test]
    fn self_loop_is_a_nontrivial_scc() {
        let mut g = DepGraph::new();
        let a = g.add_node(var("a"));
        g.add_edge(a, a);
        g.compute_sccs();
        assert!(g.is_scc_element(a));
    }

    #[test]
    fn acyclic_graph_has_no_sccs() {
        let mut g = DepGraph::new();
        let a = g.add_node(var("a"));
        let b = g.add_node(var("b"));
        g.add_edge(a, b);
        g.compute_sccs();
        assert!(!g.is_scc_element(a));
        assert!(!g.is_scc_element(b));
    }

    #[test]
    fn input_relevant_keeps_the_spine() {
        // root -> concat -> {lit, input}; lit is not input-relevant.
        let mut g = DepGraph::new();
        let root = g.add_node(var("root"));
        let cat = g.add_node(op("concat"));
        let l = g.add_node(lit("ab"));
        let input = g.add_node(NodeKind::Uninit {
            name: "field".to_string(),
        });
        g.add_edge(root, cat);
        g.add_edge(cat, l);
        g.add_edge(cat, input);
        g.set_root(root);

        let sub = g.input_relevant(input).unwrap();
        assert!(sub.contains(root));
        assert!(sub.contains(cat));
        assert!(sub.contains(input));
        assert!(!sub.contains(l));
        assert_eq!(sub.successors(cat), vec![input]);
        // Computation still sees all operands through the full graph.
        assert_eq!(g.successors(cat), &[l, input]);
    }

    #[test]
    fn input_relevant_fails_for_disconnected_input() {
        let mut g = DepGraph::new();
        let root = g.add_node(var("root"));
        let orphan = g.add_node(NodeKind::Uninit {
            name: "other".to_string(),
        });
        g.set_root(root);
        assert!(g.input_relevant(orphan).is_none());
    }
}
