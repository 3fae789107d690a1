//! Regex-to-automaton compilation.
//!
//! Patterns are parsed with `regex-syntax` (byte-oriented, non-unicode
//! mode) and the HIR is lowered straight onto a construction NFA.
//! Lookaround has no automaton counterpart; plain anchors compile to
//! epsilon since anchoring is decided by the caller's `RegexMode`.

use regex_syntax::ParserBuilder;
use regex_syntax::hir::{Class, Hir, HirKind, Look};

use crate::nfa::Nfa;
use crate::{AutomatonError, StringAutomaton};

/// How a compiled pattern is matched against a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegexMode {
    /// The pattern must cover the whole string.
    Exact,
    /// The pattern may occur anywhere: the result is `.*(pattern).*`.
    Contains,
}

impl StringAutomaton {
    /// Compiles `pattern` into an automaton.
    pub fn compile_regex(pattern: &str, mode: RegexMode) -> Result<Self, AutomatonError> {
        let hir = ParserBuilder::new()
            .unicode(false)
            .utf8(false)
            .build()
            .parse(pattern)
            .map_err(|e| AutomatonError::RegexParse {
                pattern: pattern.to_string(),
                message: e.to_string(),
            })?;

        let mut nfa = Nfa::new();
        let start = nfa.add_state();
        nfa.set_start(start);
        let end = emit(&hir, &mut nfa, start)?;
        nfa.mark_accepting(end);
        let compiled = StringAutomaton::from_dfa(nfa.into_dfa());

        Ok(match mode {
            RegexMode::Exact => compiled,
            RegexMode::Contains => {
                let any = StringAutomaton::any_string();
                any.concat(&compiled).concat(&any)
            }
        })
    }
}

/// Lowers `hir` as a fragment starting at `from`; returns the end state.
fn emit(hir: &Hir, nfa: &mut Nfa, from: u32) -> Result<u32, AutomatonError> {
    match hir.kind() {
        HirKind::Empty => Ok(from),
        HirKind::Literal(lit) => Ok(nfa.add_literal_path(from, &lit.0)),
        HirKind::Class(class) => {
            let end = nfa.add_state();
            match class {
                Class::Bytes(cb) => {
                    for r in cb.ranges() {
                        nfa.add_edge(from, r.start(), r.end(), end);
                    }
                }
                Class::Unicode(cu) => {
                    // Byte alphabet: keep the 0..=0xFF slice of the class.
                    for r in cu.ranges() {
                        let lo = r.start() as u32;
                        if lo > 0xFF {
                            continue;
                        }
                        let hi = (r.end() as u32).min(0xFF);
                        nfa.add_edge(from, lo as u8, hi as u8, end);
                    }
                }
            }
            Ok(end)
        }
        HirKind::Look(look) => match look {
            Look::Start
            | Look::End
            | Look::StartLF
            | Look::EndLF
            | Look::StartCRLF
            | Look::EndCRLF => Ok(from),
            _ => Err(AutomatonError::UnsupportedRegex {
                feature: "word boundary",
            }),
        },
        HirKind::Repetition(rep) => {
            let mut cur = from;
            for _ in 0..rep.min {
                cur = emit(&rep.sub, nfa, cur)?;
            }
            match rep.max {
                Some(max) => {
                    for _ in rep.min..max {
                        let end = emit(&rep.sub, nfa, cur)?;
                        // Each extra copy is optional.
                        nfa.add_eps(cur, end);
                        cur = end;
                    }
                    Ok(cur)
                }
                None => {
                    let end = emit(&rep.sub, nfa, cur)?;
                    nfa.add_eps(cur, end);
                    nfa.add_eps(end, cur);
                    Ok(end)
                }
            }
        }
        HirKind::Capture(cap) => emit(&cap.sub, nfa, from),
        HirKind::Concat(parts) => {
            let mut cur = from;
            for part in parts {
                cur = emit(part, nfa, cur)?;
            }
            Ok(cur)
        }
        HirKind::Alternation(parts) => {
            let end = nfa.add_state();
            for part in parts {
                let part_end = emit(part, nfa, from)?;
                nfa.add_eps(part_end, end);
            }
            Ok(end)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digits_plus() {
        let a = StringAutomaton::compile_regex("[0-9]+", RegexMode::Exact).unwrap();
        assert!(a.accepts("7"));
        assert!(a.accepts("0123456789"));
        assert!(!a.accepts(""));
        assert!(!a.accepts("12a"));
    }

    #[test]
    fn alternation_and_repetition() {
        let a = StringAutomaton::compile_regex("(foo|ba+r){2}", RegexMode::Exact).unwrap();
        assert!(a.accepts("foofoo"));
        assert!(a.accepts("foobaaar"));
        assert!(a.accepts("barbar"));
        assert!(!a.accepts("foo"));
    }

    #[test]
    fn contains_mode_matches_anywhere() {
        let a = StringAutomaton::compile_regex("evil", RegexMode::Contains).unwrap();
        assert!(a.accepts("evil"));
        assert!(a.accepts("XXevilYY"));
        assert!(!a.accepts("good"));
    }

    #[test]
    fn exact_mode_is_anchored() {
        let a = StringAutomaton::compile_regex("evil", RegexMode::Exact).unwrap();
        assert!(a.accepts("evil"));
        assert!(!a.accepts("XXevilYY"));
    }

    #[test]
    fn md5_shape() {
        let a =
            StringAutomaton::compile_regex("[aAbBcCdDeEfF0-9]{32}", RegexMode::Exact).unwrap();
        assert!(a.accepts("d41d8cd98f00b204e9800998ecf8427e"));
        assert!(!a.accepts("d41d8cd98f00b204e9800998ecf8427"));
        assert!(!a.accepts("zzzz8cd98f00b204e9800998ecf8427e"));
        assert_eq!(a.min_len(), Some(32));
        assert_eq!(a.max_len(), Some(32));
    }

    #[test]
    fn bounded_repetition_range() {
        let a = StringAutomaton::compile_regex("a{2,4}", RegexMode::Exact).unwrap();
        assert!(!a.accepts("a"));
        assert!(a.accepts("aa"));
        assert!(a.accepts("aaaa"));
        assert!(!a.accepts("aaaaa"));
    }

    #[test]
    fn unsupported_lookaround_is_an_error() {
        let err = StringAutomaton::compile_regex(r"\bfoo\b", RegexMode::Exact);
        assert!(err.is_err());
    }

    #[test]
    fn allowed_html_chars_pattern() {
        // The HTML attack-pattern building block from the analyzer.
        let a = StringAutomaton::compile_regex(
            r#"([^<>'"&/]+|(&[a-zA-Z]+;|&#[xX][0-9a-zA-Z]+;|&#[0-9]+;)+)+"#,
            RegexMode::Exact,
        )
        .unwrap();
        assert!(a.accepts("hello world"));
        assert!(a.accepts("&lt;"));
        assert!(a.accepts("a&amp;b"));
        assert!(!a.accepts("<script>"));
        assert!(!a.accepts("a<b"));
    }
}
