//! Modeling of the JavaScript/PHP `substr` builtin.
//!
//! Forward: dropping `start` leading bytes is a language quotient by
//! `Σ^start`; truncation to `length` combines the short members with the
//! length-`length` prefixes of the rest. Backward pads with unconstrained
//! segments around the known middle.

use crate::StringAutomaton;
use crate::dfa::Dfa;
use crate::nfa::Nfa;

/// Prefix closure: every prefix of an accepted string is accepted.
/// Canonical DFAs are trimmed, so marking all states accepting suffices.
fn prefixes(d: &Dfa) -> Dfa {
    if d.is_empty_lang() {
        return d.clone();
    }
    let mut nfa = Nfa::new();
    let (base, _) = nfa.import_dfa(d, true);
    nfa.set_start(base);
    for s in 0..d.states.len() as u32 {
        nfa.mark_accepting(base + s);
    }
    nfa.into_dfa()
}

impl StringAutomaton {
    /// `substr(start)`: the remainders after `start` bytes.
    pub fn substr_from(&self, start: usize) -> Self {
        let d = &self.dfa;
        // All states exactly `start` transitions deep.
        let mut level = vec![0u32];
        for _ in 0..start {
            let mut next: Vec<u32> = Vec::new();
            for &s in &level {
                for &(_, _, t) in &d.states[s as usize].edges {
                    if !next.contains(&t) {
                        next.push(t);
                    }
                }
            }
            if next.is_empty() {
                return StringAutomaton::empty_set();
            }
            level = next;
        }
        let mut nfa = Nfa::new();
        let (base, _) = nfa.import_dfa(d, true);
        for s in level {
            nfa.add_start(base + s);
        }
        StringAutomaton::from_dfa(nfa.into_dfa())
    }

    /// `substr(start, length)`.
    pub fn substr(&self, start: usize, length: usize) -> Self {
        if length == 0 {
            return StringAutomaton::empty_string();
        }
        let from = self.substr_from(start);
        if from.is_empty() {
            return from;
        }
        let short = from.intersect(&StringAutomaton::any_string_len_between(0, length - 1));
        let cut = StringAutomaton::from_dfa(prefixes(&from.dfa))
            .intersect(&StringAutomaton::any_string_of_len(length));
        short.union(&cut)
    }

    /// Pre-image of `substr(start)`.
    pub fn pre_substr_from(&self, start: usize) -> Self {
        StringAutomaton::any_string_of_len(start)
            .concat(self)
            .concat(&StringAutomaton::any_string())
    }

    /// Pre-image of `substr(start, length)`. A zero `length` output says
    /// nothing about the input.
    pub fn pre_substr(&self, start: usize, length: usize) -> Self {
        if length == 0 {
            return StringAutomaton::any_string();
        }
        StringAutomaton::any_string_of_len(start)
            .concat(self)
            .concat(&StringAutomaton::any_string())
    }
}
