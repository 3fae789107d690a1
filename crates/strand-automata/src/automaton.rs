//! The public automaton handle: a canonical DFA plus a provenance tag.

use crate::AutomatonError;
use crate::dfa::Dfa;
use crate::nfa::{self, Nfa};

/// A regular set of byte strings, the abstract value of the analysis.
///
/// The `tag` records the dependency-graph node the value was computed
/// for; it carries provenance only and does not affect the language.
#[derive(Debug, Clone)]
pub struct StringAutomaton {
    pub(crate) dfa: Dfa,
    tag: Option<u32>,
}

impl StringAutomaton {
    pub(crate) fn from_dfa(dfa: Dfa) -> Self {
        StringAutomaton { dfa, tag: None }
    }

    /// The empty set (bottom of the lattice).
    pub fn empty_set() -> Self {
        Self::from_dfa(Dfa::empty_lang())
    }

    /// All strings (top of the lattice).
    pub fn any_string() -> Self {
        let mut nfa = Nfa::new();
        let s = nfa.add_state();
        nfa.set_start(s);
        nfa.mark_accepting(s);
        nfa.add_edge(s, 0, 255, s);
        Self::from_dfa(nfa.into_dfa())
    }

    /// The set containing only the empty string.
    pub fn empty_string() -> Self {
        Self::from_dfa(Dfa::epsilon())
    }

    pub fn literal_bytes(bytes: &[u8]) -> Self {
        let mut nfa = Nfa::new();
        let start = nfa.add_state();
        nfa.set_start(start);
        let end = nfa.add_literal_path(start, bytes);
        nfa.mark_accepting(end);
        Self::from_dfa(nfa.into_dfa())
    }

    pub fn literal(s: &str) -> Self {
        Self::literal_bytes(s.as_bytes())
    }

    pub fn char(b: u8) -> Self {
        Self::literal_bytes(&[b])
    }

    pub fn char_range(lo: u8, hi: u8) -> Self {
        let mut nfa = Nfa::new();
        let start = nfa.add_state();
        let end = nfa.add_state();
        nfa.set_start(start);
        nfa.add_edge(start, lo, hi, end);
        nfa.mark_accepting(end);
        Self::from_dfa(nfa.into_dfa())
    }

    pub fn any_char() -> Self {
        Self::char_range(0, 255)
    }

    /// All strings of exactly `len` bytes.
    pub fn any_string_of_len(len: usize) -> Self {
        let mut nfa = Nfa::new();
        let mut cur = nfa.add_state();
        nfa.set_start(cur);
        for _ in 0..len {
            let next = nfa.add_state();
            nfa.add_edge(cur, 0, 255, next);
            cur = next;
        }
        nfa.mark_accepting(cur);
        Self::from_dfa(nfa.into_dfa())
    }

    /// All strings of length `lo..=hi` bytes.
    pub fn any_string_len_between(lo: usize, hi: usize) -> Self {
        let mut nfa = Nfa::new();
        let mut cur = nfa.add_state();
        nfa.set_start(cur);
        if lo == 0 {
            nfa.mark_accepting(cur);
        }
        for i in 1..=hi {
            let next = nfa.add_state();
            nfa.add_edge(cur, 0, 255, next);
            if i >= lo {
                nfa.mark_accepting(next);
            }
            cur = next;
        }
        Self::from_dfa(nfa.into_dfa())
    }

    // ---- provenance ----

    pub fn tag(&self) -> Option<u32> {
        self.tag
    }

    pub fn set_tag(&mut self, tag: u32) {
        self.tag = Some(tag);
    }

    /// Clone re-tagged for a different graph node.
    pub fn clone_for(&self, tag: u32) -> Self {
        StringAutomaton {
            dfa: self.dfa.clone(),
            tag: Some(tag),
        }
    }

    // ---- boolean operations ----

    pub fn union(&self, other: &Self) -> Self {
        Self::from_dfa(nfa::union(&self.dfa, &other.dfa))
    }

    pub fn union_with_empty_string(&self) -> Self {
        self.union(&Self::empty_string())
    }

    pub fn intersect(&self, other: &Self) -> Self {
        Self::from_dfa(nfa::intersect(&self.dfa, &other.dfa))
    }

    pub fn complement(&self) -> Self {
        Self::from_dfa(nfa::complement(&self.dfa))
    }

    pub fn concat(&self, other: &Self) -> Self {
        Self::from_dfa(nfa::concat(&self.dfa, &other.dfa))
    }

    pub fn star(&self) -> Self {
        Self::from_dfa(nfa::star(&self.dfa))
    }

    // ---- relations and queries ----

    pub fn is_subset_of(&self, other: &Self) -> bool {
        nfa::is_subset_of(&self.dfa, &other.dfa)
    }

    /// Language equality. Canonical DFAs make this structural.
    pub fn equals(&self, other: &Self) -> bool {
        self.dfa == other.dfa
    }

    pub fn is_empty(&self) -> bool {
        self.dfa.is_empty_lang()
    }

    /// True iff the language is exactly the empty string.
    pub fn is_empty_string(&self) -> bool {
        self.dfa == Dfa::epsilon()
    }

    pub fn is_singleton(&self) -> bool {
        self.dfa.is_singleton()
    }

    /// The single string of a singleton language.
    pub fn singleton_value(&self) -> Result<String, AutomatonError> {
        match self.dfa.singleton_value() {
            Some(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
            None => Err(AutomatonError::NotSingleton),
        }
    }

    /// A shortest member of the language, if any.
    pub fn example(&self) -> Option<String> {
        self.dfa
            .example()
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    }

    pub fn accepts(&self, s: &str) -> bool {
        self.dfa.accepts(s.as_bytes())
    }

    pub fn accepts_bytes(&self, bytes: &[u8]) -> bool {
        self.dfa.accepts(bytes)
    }

    pub fn state_count(&self) -> usize {
        self.dfa.states.len()
    }

    pub fn min_len(&self) -> Option<usize> {
        self.dfa.min_len()
    }

    /// `None` means unbounded.
    pub fn max_len(&self) -> Option<usize> {
        self.dfa.max_len()
    }
}
