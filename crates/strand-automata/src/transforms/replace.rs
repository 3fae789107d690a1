//! Replace-family transforms.
//!
//! The constructions work over occurrence pairs: `(q, q')` such that some
//! non-empty member of the pattern language drives the automaton from
//! state `q` to `q'`. Forward replace bridges each pair with a copy of
//! the replacement language; the pre-image bridges replacement-text walks
//! with a copy of the pattern. Occurrences are chosen
//! nondeterministically, so both directions over-approximate the
//! concrete leftmost-all semantics, which is the sound direction for the
//! analysis.

use std::collections::HashSet;

use crate::StringAutomaton;
use crate::dfa::Dfa;
use crate::nfa::Nfa;

/// Non-empty strings.
fn sigma_plus() -> StringAutomaton {
    let mut nfa = Nfa::new();
    let s0 = nfa.add_state();
    let s1 = nfa.add_state();
    nfa.set_start(s0);
    nfa.add_edge(s0, 0, 255, s1);
    nfa.add_edge(s1, 0, 255, s1);
    nfa.mark_accepting(s1);
    StringAutomaton::from_dfa(nfa.into_dfa())
}

fn push_moves(
    subject: &Dfa,
    pattern: &Dfa,
    q: u32,
    p: u32,
    seen: &mut HashSet<(u32, u32)>,
    stack: &mut Vec<(u32, u32)>,
) {
    for &(slo, shi, st) in &subject.states[q as usize].edges {
        for &(plo, phi, pt) in &pattern.states[p as usize].edges {
            if slo.max(plo) <= shi.min(phi) && seen.insert((st, pt)) {
                stack.push((st, pt));
            }
        }
    }
}

/// All `(q, q')` with a non-empty pattern member leading from `q` to `q'`.
fn occurrence_pairs(subject: &Dfa, pattern: &Dfa) -> Vec<(u32, u32)> {
    let mut out: HashSet<(u32, u32)> = HashSet::new();
    for q0 in 0..subject.states.len() as u32 {
        let mut seen: HashSet<(u32, u32)> = HashSet::new();
        let mut stack: Vec<(u32, u32)> = Vec::new();
        // Seed with one consumed byte so the empty occurrence never counts.
        push_moves(subject, pattern, q0, 0, &mut seen, &mut stack);
        while let Some((q, p)) = stack.pop() {
            if pattern.states[p as usize].accepting {
                out.insert((q0, q));
            }
            push_moves(subject, pattern, q, p, &mut seen, &mut stack);
        }
    }
    let mut pairs: Vec<(u32, u32)> = out.into_iter().collect();
    pairs.sort_unstable();
    if pairs.len() > 4096 {
        tracing::debug!(
            pairs = pairs.len(),
            "large occurrence-pair set in replace construction"
        );
    }
    pairs
}

impl StringAutomaton {
    /// Forward image of replacing every pattern occurrence in `self` with
    /// a member of `replacement`.
    pub fn replace_all(&self, pattern: &Self, replacement: &Self) -> Self {
        let pat = pattern.intersect(&sigma_plus());
        if pat.is_empty() || self.is_empty() {
            return self.clone();
        }
        let subject = &self.dfa;
        let pairs = occurrence_pairs(subject, &pat.dfa);
        let mut nfa = Nfa::new();
        let (base, _) = nfa.import_dfa(subject, true);
        nfa.set_start(base);
        for (q, q2) in pairs {
            let (rbase, racc) = nfa.import_dfa(&replacement.dfa, false);
            nfa.add_eps(base + q, rbase);
            for a in racc {
                nfa.add_eps(a, base + q2);
            }
        }
        StringAutomaton::from_dfa(nfa.into_dfa())
    }

    /// Pre-image of `replace_all`: inputs whose replaced form lies in
    /// `self`, for a literal replacement text.
    pub fn pre_replace_all(&self, pattern: &Self, replacement: &str) -> Self {
        let pat = pattern.intersect(&sigma_plus());
        if pat.is_empty() || self.is_empty() {
            return self.clone();
        }
        let result = &self.dfa;
        let rep = replacement.as_bytes();
        let mut nfa = Nfa::new();
        let (base, _) = nfa.import_dfa(result, true);
        nfa.set_start(base);
        for q in 0..result.states.len() as u32 {
            if let Some(q2) = result.walk(q, rep) {
                let (pbase, pacc) = nfa.import_dfa(&pat.dfa, false);
                nfa.add_eps(base + q, pbase);
                for a in pacc {
                    nfa.add_eps(a, base + q2);
                }
            }
        }
        StringAutomaton::from_dfa(nfa.into_dfa())
    }

    /// Like `replace_all` but at most one occurrence is rewritten.
    pub fn replace_once(&self, pattern: &Self, replacement: &Self) -> Self {
        let pat = pattern.intersect(&sigma_plus());
        if pat.is_empty() || self.is_empty() {
            return self.clone();
        }
        let subject = &self.dfa;
        let pairs = occurrence_pairs(subject, &pat.dfa);
        let mut nfa = Nfa::new();
        let (phase0, _) = nfa.import_dfa(subject, true);
        let (phase1, _) = nfa.import_dfa(subject, true);
        nfa.set_start(phase0);
        for (q, q2) in pairs {
            let (rbase, racc) = nfa.import_dfa(&replacement.dfa, false);
            nfa.add_eps(phase0 + q, rbase);
            for a in racc {
                nfa.add_eps(a, phase1 + q2);
            }
        }
        StringAutomaton::from_dfa(nfa.into_dfa())
    }

    /// Pre-image of `replace_once` for a literal replacement text.
    pub fn pre_replace_once(&self, pattern: &Self, replacement: &str) -> Self {
        let pat = pattern.intersect(&sigma_plus());
        if pat.is_empty() || self.is_empty() {
            return self.clone();
        }
        let result = &self.dfa;
        let rep = replacement.as_bytes();
        let mut nfa = Nfa::new();
        let (phase0, _) = nfa.import_dfa(result, true);
        let (phase1, _) = nfa.import_dfa(result, true);
        nfa.set_start(phase0);
        for q in 0..result.states.len() as u32 {
            if let Some(q2) = result.walk(q, rep) {
                let (pbase, pacc) = nfa.import_dfa(&pat.dfa, false);
                nfa.add_eps(phase0 + q, pbase);
                for a in pacc {
                    nfa.add_eps(a, phase1 + q2);
                }
            }
        }
        StringAutomaton::from_dfa(nfa.into_dfa())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_replace_is_covered() {
        let subject = StringAutomaton::literal("banana");
        let pattern = StringAutomaton::literal("a");
        let replacement = StringAutomaton::literal("o");
        let out = subject.replace_all(&pattern, &replacement);
        assert!(out.accepts("bonono"), "fully replaced form must be covered");
    }

    #[test]
    fn replace_with_empty_string_deletes() {
        let subject = StringAutomaton::literal("a-b-c");
        let pattern = StringAutomaton::literal("-");
        let out = subject.replace_all(&pattern, &StringAutomaton::empty_string());
        assert!(out.accepts("abc"));
    }

    #[test]
    fn replace_with_empty_pattern_is_identity() {
        let subject = StringAutomaton::literal("abc");
        let out = subject.replace_all(
            &StringAutomaton::empty_string(),
            &StringAutomaton::literal("x"),
        );
        assert!(out.equals(&subject));
    }

    #[test]
    fn regex_pattern_replace() {
        let subject = StringAutomaton::literal("a1b22c");
        let digits =
            StringAutomaton::compile_regex("[0-9]+", crate::RegexMode::Exact).unwrap();
        let out = subject.replace_all(&digits, &StringAutomaton::empty_string());
        assert!(out.accepts("abc"));
    }

    #[test]
    fn pre_replace_recovers_inputs() {
        // replace("<" -> "&lt;"): pre-image of {"&lt;"} must contain "<".
        let result = StringAutomaton::literal("&lt;");
        let pattern = StringAutomaton::literal("<");
        let pre = result.pre_replace_all(&pattern, "&lt;");
        assert!(pre.accepts("<"));
        assert!(pre.accepts("&lt;"), "unreplaced originals pass through");
    }

    #[test]
    fn pre_replace_roundtrip_on_language() {
        let subject = StringAutomaton::literal("x<y");
        let pattern = StringAutomaton::literal("<");
        let replacement = StringAutomaton::literal("[lt]");
        let fwd = subject.replace_all(&pattern, &replacement);
        let pre = fwd.pre_replace_all(&pattern, "[lt]");
        assert!(subject.is_subset_of(&pre), "pre-image must cover the input");
    }

    #[test]
    fn replace_once_keeps_single_rewrite() {
        let subject = StringAutomaton::literal("aa");
        let pattern = StringAutomaton::literal("a");
        let replacement = StringAutomaton::literal("b");
        let out = subject.replace_once(&pattern, &replacement);
        assert!(out.accepts("ba"), "first occurrence replaced");
        assert!(out.accepts("aa"), "zero-replacement form is covered");
        assert!(!out.accepts("bb"), "two rewrites are not replace-once");
    }

    #[test]
    fn escape_special_case_shape() {
        // Escaping a quote with a backslash: pattern ' -> \'.
        let subject = StringAutomaton::literal("it's");
        let pattern = StringAutomaton::literal("'");
        let replacement = StringAutomaton::literal("\\'");
        let out = subject.replace_all(&pattern, &replacement);
        assert!(out.accepts("it\\'s"));
        // Inverting by replacing the escape with the raw char again.
        let back = out.replace_all(&replacement, &pattern);
        assert!(back.accepts("it's"));
    }
}
