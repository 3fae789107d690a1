//! Backward transforms for concatenation: language quotients.
//!
//! `left_pre_concat` recovers the possible left operands of a
//! concatenation from its result and the right operand's language
//! (a right quotient); `right_pre_concat` is the mirror image. The
//! `_literal` variants specialize to a known constant sibling.

use std::collections::{HashSet, VecDeque};

use crate::StringAutomaton;
use crate::nfa::Nfa;

impl StringAutomaton {
    /// `{u | ∃v ∈ other: u·v ∈ self}` — the left operands consistent with
    /// some right operand in `other`.
    pub fn left_pre_concat(&self, other: &Self) -> Self {
        let d = &self.dfa;
        let r = &other.dfa;
        let n = d.states.len();
        let m = r.states.len();

        // Product pairs that can reach joint acceptance, by reverse BFS.
        let pair = |q: u32, p: u32| (q as usize) * m + p as usize;
        let mut rev: Vec<Vec<usize>> = vec![Vec::new(); n * m];
        let mut co = vec![false; n * m];
        let mut queue = VecDeque::new();
        for q in 0..n as u32 {
            for p in 0..m as u32 {
                for &(dlo, dhi, dt) in &d.states[q as usize].edges {
                    for &(rlo, rhi, rt) in &r.states[p as usize].edges {
                        if dlo.max(rlo) <= dhi.min(rhi) {
                            rev[pair(dt, rt)].push(pair(q, p));
                        }
                    }
                }
                if d.states[q as usize].accepting && r.states[p as usize].accepting {
                    co[pair(q, p)] = true;
                    queue.push_back(pair(q, p));
                }
            }
        }
        while let Some(x) = queue.pop_front() {
            for &y in &rev[x] {
                if !co[y] {
                    co[y] = true;
                    queue.push_back(y);
                }
            }
        }

        let mut nfa = Nfa::new();
        let (base, _) = nfa.import_dfa(d, false);
        nfa.set_start(base);
        for q in 0..n as u32 {
            if co[pair(q, 0)] {
                nfa.mark_accepting(base + q);
            }
        }
        StringAutomaton::from_dfa(nfa.into_dfa())
    }

    /// `left_pre_concat` against a known literal right operand.
    pub fn left_pre_concat_literal(&self, right: &str) -> Self {
        let d = &self.dfa;
        let bytes = right.as_bytes();
        let mut nfa = Nfa::new();
        let (base, _) = nfa.import_dfa(d, false);
        nfa.set_start(base);
        for q in 0..d.states.len() as u32 {
            if let Some(t) = d.walk(q, bytes) {
                if d.states[t as usize].accepting {
                    nfa.mark_accepting(base + q);
                }
            }
        }
        StringAutomaton::from_dfa(nfa.into_dfa())
    }

    /// `{v | ∃u ∈ other: u·v ∈ self}` — the right operands consistent with
    /// some left operand in `other`.
    pub fn right_pre_concat(&self, other: &Self) -> Self {
        let d = &self.dfa;
        let l = &other.dfa;

        // Forward product walk: states of `self` reachable while `other`
        // reads a full member.
        let mut starts: HashSet<u32> = HashSet::new();
        let mut seen: HashSet<(u32, u32)> = HashSet::new();
        let mut stack = vec![(0u32, 0u32)];
        seen.insert((0, 0));
        while let Some((q, p)) = stack.pop() {
            if l.states[p as usize].accepting {
                starts.insert(q);
            }
            for &(dlo, dhi, dt) in &d.states[q as usize].edges {
                for &(llo, lhi, lt) in &l.states[p as usize].edges {
                    if dlo.max(llo) <= dhi.min(lhi) && seen.insert((dt, lt)) {
                        stack.push((dt, lt));
                    }
                }
            }
        }
        if starts.is_empty() {
            return StringAutomaton::empty_set();
        }

        let mut nfa = Nfa::new();
        let (base, _) = nfa.import_dfa(d, true);
        for q in starts {
            nfa.add_start(base + q);
        }
        StringAutomaton::from_dfa(nfa.into_dfa())
    }

    /// `right_pre_concat` against a known literal left operand.
    pub fn right_pre_concat_literal(&self, left: &str) -> Self {
        let d = &self.dfa;
        match d.walk(0, left.as_bytes()) {
            None => StringAutomaton::empty_set(),
            Some(q) => {
                let mut nfa = Nfa::new();
                let (base, _) = nfa.import_dfa(d, true);
                nfa.set_start(base + q);
                StringAutomaton::from_dfa(nfa.into_dfa())
            }
        }
    }
}
