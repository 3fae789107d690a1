//! PHP-style whitespace trimming.
//!
//! Forward trims are exact: a left quotient by whitespace (the start
//! state's whitespace closure becomes the start set) intersected with
//! the trimmed shape. Pre-images pad the target language with `WS*` on
//! the trimmed side, which over-approximates exactly as the backward
//! analysis requires.

use crate::StringAutomaton;
use crate::nfa::Nfa;

use super::complement_ranges;

/// PHP's default trim set: " \t\n\r\0\x0B", kept sorted.
const WS: &[u8] = &[0x00, 0x09, 0x0A, 0x0B, 0x0D, 0x20];

fn ws_star() -> StringAutomaton {
    let mut nfa = Nfa::new();
    let s = nfa.add_state();
    nfa.set_start(s);
    nfa.mark_accepting(s);
    for &b in WS {
        nfa.add_edge(s, b, b, s);
    }
    StringAutomaton::from_dfa(nfa.into_dfa())
}

/// Strings that do not start with whitespace (the empty string included).
fn no_leading_ws() -> StringAutomaton {
    let mut nfa = Nfa::new();
    let s0 = nfa.add_state();
    let s1 = nfa.add_state();
    nfa.set_start(s0);
    nfa.mark_accepting(s0);
    nfa.mark_accepting(s1);
    for (lo, hi) in complement_ranges(WS) {
        nfa.add_edge(s0, lo, hi, s1);
    }
    nfa.add_edge(s1, 0, 255, s1);
    StringAutomaton::from_dfa(nfa.into_dfa())
}

/// Strings that do not end with whitespace (the empty string included).
fn no_trailing_ws() -> StringAutomaton {
    let mut nfa = Nfa::new();
    let s0 = nfa.add_state();
    let s1 = nfa.add_state();
    nfa.set_start(s0);
    nfa.mark_accepting(s0);
    nfa.mark_accepting(s1);
    nfa.add_edge(s0, 0, 255, s0);
    for (lo, hi) in complement_ranges(WS) {
        nfa.add_edge(s0, lo, hi, s1);
    }
    StringAutomaton::from_dfa(nfa.into_dfa())
}

impl StringAutomaton {
    pub fn trim_spaces_left(&self) -> Self {
        let d = &self.dfa;
        // Whitespace closure of the start state.
        let mut starts = vec![0u32];
        let mut i = 0;
        while i < starts.len() {
            let s = starts[i];
            for &b in WS {
                if let Some(t) = d.next(s, b) {
                    if !starts.contains(&t) {
                        starts.push(t);
                    }
                }
            }
            i += 1;
        }
        let mut nfa = Nfa::new();
        let (base, _) = nfa.import_dfa(d, true);
        for s in starts {
            nfa.add_start(base + s);
        }
        StringAutomaton::from_dfa(nfa.into_dfa()).intersect(&no_leading_ws())
    }

    pub fn trim_spaces_right(&self) -> Self {
        let d = &self.dfa;
        // States from which acceptance is reachable through whitespace only.
        let n = d.states.len();
        let mut acc: Vec<bool> = d.states.iter().map(|s| s.accepting).collect();
        let mut changed = true;
        while changed {
            changed = false;
            for s in 0..n as u32 {
                if acc[s as usize] {
                    continue;
                }
                for &b in WS {
                    if let Some(t) = d.next(s, b) {
                        if acc[t as usize] {
                            acc[s as usize] = true;
                            changed = true;
                            break;
                        }
                    }
                }
            }
        }
        let mut nfa = Nfa::new();
        let (base, _) = nfa.import_dfa(d, true);
        nfa.set_start(base);
        for s in 0..n as u32 {
            if acc[s as usize] {
                nfa.mark_accepting(base + s);
            }
        }
        StringAutomaton::from_dfa(nfa.into_dfa()).intersect(&no_trailing_ws())
    }

    pub fn trim_spaces(&self) -> Self {
        self.trim_spaces_left().trim_spaces_right()
    }

    pub fn pre_trim_spaces_left(&self) -> Self {
        ws_star().concat(self)
    }

    pub fn pre_trim_spaces_right(&self) -> Self {
        self.concat(&ws_star())
    }

    pub fn pre_trim_spaces(&self) -> Self {
        ws_star().concat(self).concat(&ws_star())
    }
}
