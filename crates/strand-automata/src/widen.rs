//! Widening operators for the fixed-point engines.
//!
//! Both operators take `self` as the previous iterate and `newer` as the
//! grown value (which must already include `self`, the engines union
//! before widening) and return a language that includes `newer`. They
//! only ever merge states, so inclusion holds by construction.
//!
//! `widen_precise` merges states of the new automaton that simulate a
//! common state of the old one (the state-pairing widening of
//! Bartzis/Bultan). `widen_coarse` merges by local signature (acceptance
//! plus outgoing byte ranges), which collapses much harder and bounds
//! the state count regardless of how the iterates grow.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::StringAutomaton;
use crate::dfa::Dfa;
use crate::nfa::Nfa;

struct UnionFind(Vec<u32>);

impl UnionFind {
    fn new(n: usize) -> Self {
        UnionFind((0..n as u32).collect())
    }

    fn find(&mut self, mut x: u32) -> u32 {
        while self.0[x as usize] != x {
            let parent = self.0[x as usize];
            self.0[x as usize] = self.0[parent as usize];
            x = self.0[x as usize];
        }
        x
    }

    fn union(&mut self, a: u32, b: u32) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            self.0[ra as usize] = rb;
        }
    }
}

/// Collapses `d` along the given equivalence classes.
fn quotient(d: &Dfa, uf: &mut UnionFind) -> Dfa {
    let n = d.states.len();
    let mut class_id: HashMap<u32, u32> = HashMap::new();
    let mut nfa = Nfa::new();
    for s in 0..n as u32 {
        let root = uf.find(s);
        if !class_id.contains_key(&root) {
            let id = nfa.add_state();
            class_id.insert(root, id);
        }
    }
    for s in 0..n as u32 {
        let from = class_id[&uf.find(s)];
        if d.states[s as usize].accepting {
            nfa.mark_accepting(from);
        }
        for &(lo, hi, t) in &d.states[s as usize].edges {
            nfa.add_edge(from, lo, hi, class_id[&uf.find(t)]);
        }
    }
    nfa.set_start(class_id[&uf.find(0)]);
    nfa.into_dfa()
}

impl StringAutomaton {
    /// Precise widening: `self` is the previous iterate, `newer` the grown
    /// value (`self ⊆ newer`). Returns a superset of `newer`.
    pub fn widen_precise(&self, newer: &Self) -> Self {
        let new_d = &newer.dfa;
        let old_d = &self.dfa;

        // Reachable (new-state, old-state) pairs of the product.
        let mut seen: HashSet<(u32, u32)> = HashSet::new();
        let mut stack = vec![(0u32, 0u32)];
        seen.insert((0, 0));
        while let Some((q, o)) = stack.pop() {
            for &(nlo, nhi, nt) in &new_d.states[q as usize].edges {
                for &(olo, ohi, ot) in &old_d.states[o as usize].edges {
                    if nlo.max(olo) <= nhi.min(ohi) && seen.insert((nt, ot)) {
                        stack.push((nt, ot));
                    }
                }
            }
        }

        // New states that track the same old state collapse together, and
        // so do the states the old automaton cannot follow at all (the
        // freshly grown tail).
        let mut uf = UnionFind::new(new_d.states.len());
        let mut anchor: HashMap<u32, u32> = HashMap::new();
        let mut paired = vec![false; new_d.states.len()];
        for &(q, o) in &seen {
            paired[q as usize] = true;
            match anchor.get(&o) {
                Some(&first) => uf.union(first, q),
                None => {
                    anchor.insert(o, q);
                }
            }
        }
        let mut tail: Option<u32> = None;
        for q in 0..new_d.states.len() as u32 {
            if !paired[q as usize] {
                match tail {
                    Some(first) => uf.union(first, q),
                    None => tail = Some(q),
                }
            }
        }

        Self::from_dfa(quotient(new_d, &mut uf))
    }

    /// Coarse widening: collapse `newer` by local state signature.
    pub fn widen_coarse(&self, newer: &Self) -> Self {
        let new_d = &newer.dfa;
        let mut uf = UnionFind::new(new_d.states.len());
        let mut by_sig: HashMap<(bool, Vec<(u8, u8)>), u32> = HashMap::new();
        for (s, st) in new_d.states.iter().enumerate() {
            let ranges: BTreeSet<(u8, u8)> = st.edges.iter().map(|&(lo, hi, _)| (lo, hi)).collect();
            let key = (st.accepting, ranges.into_iter().collect::<Vec<_>>());
            match by_sig.get(&key) {
                Some(&first) => uf.union(first, s as u32),
                None => {
                    by_sig.insert(key, s as u32);
                }
            }
        }
        Self::from_dfa(quotient(new_d, &mut uf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// One unrolling step of a self-concatenating loop.
    fn grow(prev: &StringAutomaton, step: &StringAutomaton) -> StringAutomaton {
        prev.union(&prev.concat(step))
    }

    #[test]
    fn widening_includes_its_input() {
        let step = StringAutomaton::literal("ab");
        let mut prev = StringAutomaton::empty_string();
        for _ in 0..4 {
            let next = grow(&prev, &step);
            let widened = prev.widen_precise(&next);
            assert!(next.is_subset_of(&widened), "precise widening lost strings");
            let coarse = prev.widen_coarse(&next);
            assert!(next.is_subset_of(&coarse), "coarse widening lost strings");
            prev = next;
        }
    }

    #[test]
    fn widening_ladder_converges_on_concat_loop() {
        // The engines apply precise widening first and fall back to
        // coarse; the ladder must terminate on a self-concatenating loop.
        let step = StringAutomaton::literal("ab");
        let mut prev = StringAutomaton::empty_string();
        let mut iterations = 0;
        loop {
            let mut next = grow(&prev, &step);
            if next.is_subset_of(&prev) {
                break;
            }
            if iterations > 6 {
                next = prev.widen_coarse(&next);
            } else if iterations > 2 {
                next = prev.widen_precise(&next);
            }
            prev = next;
            iterations += 1;
            assert!(iterations < 50, "widening failed to converge");
        }
        // The fixpoint covers every finite unrolling.
        assert!(prev.accepts(""));
        assert!(prev.accepts("abab"));
        assert!(prev.accepts("abababababab"));
    }

    #[test]
    fn coarse_widening_bounds_state_count() {
        let step = StringAutomaton::literal("xy");
        let mut prev = StringAutomaton::empty_string();
        for _ in 0..6 {
            prev = grow(&prev, &step);
        }
        let widened = StringAutomaton::empty_string().widen_coarse(&prev);
        assert!(widened.state_count() < prev.state_count());
        assert!(prev.is_subset_of(&widened));
    }
}
