//! Deterministic automaton representation.
//!
//! States are indices into a vector; state 0 is the start state. A missing
//! transition rejects (there is no explicit sink). Transitions are stored
//! as sorted, non-overlapping byte ranges.
//!
//! Every `Dfa` handed out by this crate is canonical: trimmed (all states
//! reachable from the start and co-reachable to an accepting state),
//! minimized, and renumbered in BFS order with edges sorted by byte. Two
//! canonical DFAs denote the same language iff they are structurally equal.

use std::collections::VecDeque;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct DfaState {
    pub(crate) accepting: bool,
    /// `(lo, hi, target)`, inclusive bounds, sorted by `lo`.
    pub(crate) edges: Vec<(u8, u8, u32)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Dfa {
    pub(crate) states: Vec<DfaState>,
}

impl Dfa {
    /// The empty language (no strings at all).
    pub(crate) fn empty_lang() -> Self {
        Dfa {
            states: vec![DfaState::default()],
        }
    }

    /// The language containing only the empty string.
    pub(crate) fn epsilon() -> Self {
        Dfa {
            states: vec![DfaState {
                accepting: true,
                edges: Vec::new(),
            }],
        }
    }

    pub(crate) fn next(&self, state: u32, byte: u8) -> Option<u32> {
        for &(lo, hi, t) in &self.states[state as usize].edges {
            if byte < lo {
                return None;
            }
            if byte <= hi {
                return Some(t);
            }
        }
        None
    }

    /// Runs `input` from `state`; `None` if the walk falls off the automaton.
    pub(crate) fn walk(&self, state: u32, input: &[u8]) -> Option<u32> {
        let mut s = state;
        for &b in input {
            s = self.next(s, b)?;
        }
        Some(s)
    }

    pub(crate) fn accepts(&self, input: &[u8]) -> bool {
        match self.walk(0, input) {
            Some(s) => self.states[s as usize].accepting,
            None => false,
        }
    }

    /// Canonical DFAs are trimmed, so the language is empty iff no state accepts.
    pub(crate) fn is_empty_lang(&self) -> bool {
        !self.states.iter().any(|s| s.accepting)
    }

    /// Shortest accepted string, by BFS.
    pub(crate) fn example(&self) -> Option<Vec<u8>> {
        if self.is_empty_lang() {
            return None;
        }
        let n = self.states.len();
        let mut prev: Vec<Option<(u32, u8)>> = vec![None; n];
        let mut seen = vec![false; n];
        let mut queue = VecDeque::new();
        seen[0] = true;
        queue.push_back(0u32);
        while let Some(s) = queue.pop_front() {
            if self.states[s as usize].accepting {
                let mut bytes = Vec::new();
                let mut cur = s;
                while cur != 0 {
                    let (p, b) = prev[cur as usize].expect("BFS predecessor");
                    bytes.push(b);
                    cur = p;
                }
                bytes.reverse();
                return Some(bytes);
            }
            for &(lo, _hi, t) in &self.states[s as usize].edges {
                if !seen[t as usize] {
                    seen[t as usize] = true;
                    prev[t as usize] = Some((s, lo));
                    queue.push_back(t);
                }
            }
        }
        None
    }

    /// Length of the shortest accepted string.
    pub(crate) fn min_len(&self) -> Option<usize> {
        self.example().map(|e| e.len())
    }

    /// Length of the longest accepted string; `None` if unbounded.
    pub(crate) fn max_len(&self) -> Option<usize> {
        if self.is_empty_lang() {
            return Some(0);
        }
        // A trimmed automaton has only useful states, so any cycle means
        // unbounded length. Otherwise the state graph is a DAG and the
        // longest accepting path is a topological DP.
        let n = self.states.len();
        let mut color = vec![0u8; n]; // 0 unvisited, 1 on stack, 2 done
        let mut order = Vec::with_capacity(n);
        let mut stack: Vec<(u32, usize)> = vec![(0, 0)];
        color[0] = 1;
        while let Some(&(s, i)) = stack.last() {
            let edges = &self.states[s as usize].edges;
            if i < edges.len() {
                if let Some(frame) = stack.last_mut() {
                    frame.1 += 1;
                }
                let t = edges[i].2;
                match color[t as usize] {
                    0 => {
                        color[t as usize] = 1;
                        stack.push((t, 0));
                    }
                    1 => return None, // cycle
                    _ => {}
                }
            } else {
                color[s as usize] = 2;
                order.push(s);
                stack.pop();
            }
        }
        // `order` is reverse-topological.
        let mut longest = vec![isize::MIN; n];
        for &s in &order {
            let st = &self.states[s as usize];
            let mut best = if st.accepting { 0isize } else { isize::MIN };
            for &(_, _, t) in &st.edges {
                if longest[t as usize] != isize::MIN {
                    best = best.max(longest[t as usize] + 1);
                }
            }
            longest[s as usize] = best;
        }
        Some(longest[0] as usize)
    }

    /// True iff the language is exactly one string.
    pub(crate) fn is_singleton(&self) -> bool {
        if self.is_empty_lang() {
            return false;
        }
        let mut accepting = 0usize;
        for st in &self.states {
            if st.accepting {
                accepting += 1;
                if !st.edges.is_empty() {
                    return false;
                }
            }
            match st.edges.len() {
                0 => {}
                1 => {
                    let (lo, hi, _) = st.edges[0];
                    if lo != hi {
                        return false;
                    }
                }
                _ => return false,
            }
        }
        accepting == 1
    }

    pub(crate) fn singleton_value(&self) -> Option<Vec<u8>> {
        if !self.is_singleton() {
            return None;
        }
        let mut bytes = Vec::new();
        let mut s = 0u32;
        while !self.states[s as usize].accepting {
            let (lo, _, t) = self.states[s as usize].edges[0];
            bytes.push(lo);
            s = t;
        }
        Some(bytes)
    }

    /// States reachable from the start state.
    pub(crate) fn reachable(&self) -> Vec<bool> {
        let mut seen = vec![false; self.states.len()];
        let mut queue = VecDeque::new();
        seen[0] = true;
        queue.push_back(0u32);
        while let Some(s) = queue.pop_front() {
            for &(_, _, t) in &self.states[s as usize].edges {
                if !seen[t as usize] {
                    seen[t as usize] = true;
                    queue.push_back(t);
                }
            }
        }
        seen
    }
}

/// Merges adjacent ranges with identical targets. Edges must be sorted.
pub(crate) fn coalesce(edges: &mut Vec<(u8, u8, u32)>) {
    let mut out: Vec<(u8, u8, u32)> = Vec::with_capacity(edges.len());
    for &(lo, hi, t) in edges.iter() {
        if let Some(last) = out.last_mut() {
            if last.2 == t && last.1 as u16 + 1 == lo as u16 {
                last.1 = hi;
                continue;
            }
        }
        out.push((lo, hi, t));
    }
    *edges = out;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nfa::Nfa;

    fn literal(s: &[u8]) -> Dfa {
        let mut nfa = Nfa::new();
        let start = nfa.add_state();
        nfa.set_start(start);
        let end = nfa.add_literal_path(start, s);
        nfa.mark_accepting(end);
        nfa.into_dfa()
    }

    #[test]
    fn literal_roundtrip() {
        let d = literal(b"abc");
        assert!(d.accepts(b"abc"));
        assert!(!d.accepts(b"ab"));
        assert!(!d.accepts(b"abcd"));
        assert!(d.is_singleton());
        assert_eq!(d.singleton_value(), Some(b"abc".to_vec()));
    }

    #[test]
    fn empty_language_properties() {
        let d = Dfa::empty_lang();
        assert!(d.is_empty_lang());
        assert_eq!(d.example(), None);
        assert!(!d.is_singleton());
    }

    #[test]
    fn epsilon_properties() {
        let d = Dfa::epsilon();
        assert!(d.accepts(b""));
        assert!(!d.accepts(b"a"));
        assert_eq!(d.min_len(), Some(0));
        assert_eq!(d.max_len(), Some(0));
        assert_eq!(d.singleton_value(), Some(Vec::new()));
    }

    #[test]
    fn max_len_detects_cycles() {
        let mut nfa = Nfa::new();
        let s = nfa.add_state();
        nfa.set_start(s);
        nfa.add_edge(s, b'a', b'a', s);
        nfa.mark_accepting(s);
        let d = nfa.into_dfa();
        assert_eq!(d.max_len(), None);
        assert_eq!(d.min_len(), Some(0));
    }
}
