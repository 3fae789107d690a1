//! Generic byte-homomorphism and sequence-rewrite machinery, plus the
//! escaping builtins defined in terms of it.
//!
//! A `ByteMap` is a function from single bytes to replacement strings
//! (identity where unmapped). Its forward image and inverse image are
//! both exact on regular languages, which covers every escaping-style
//! builtin: addslashes, the mysql escapes, nl2br, htmlspecialchars and
//! friends.
//!
//! A `SeqMap` rewrites fixed byte sequences and applies its rules
//! nondeterministically, so its image is a superset of the concrete
//! function's image. It backs the decoding directions (percent-decoding,
//! JSON unescaping) where the exact transform would have to commit to
//! one parse.

use crate::StringAutomaton;
use crate::nfa::Nfa;

pub(crate) struct ByteMap {
    /// Sorted by byte.
    rules: Vec<(u8, Vec<u8>)>,
}

impl ByteMap {
    pub(crate) fn new(rules: &[(u8, &[u8])]) -> Self {
        Self::from_rules(
            rules
                .iter()
                .map(|&(b, rep)| (b, rep.to_vec()))
                .collect(),
        )
    }

    pub(crate) fn from_rules(mut rules: Vec<(u8, Vec<u8>)>) -> Self {
        rules.sort_by_key(|&(b, _)| b);
        ByteMap { rules }
    }

    fn mapped_in(&self, lo: u8, hi: u8) -> impl Iterator<Item = &(u8, Vec<u8>)> {
        self.rules
            .iter()
            .filter(move |&&(b, _)| lo <= b && b <= hi)
    }

    /// Exact forward image: every occurrence of a mapped byte reads as its
    /// replacement in the output.
    pub(crate) fn image(&self, a: &StringAutomaton) -> StringAutomaton {
        let d = &a.dfa;
        let mut nfa = Nfa::new();
        for st in &d.states {
            let s = nfa.add_state();
            if st.accepting {
                nfa.mark_accepting(s);
            }
        }
        nfa.set_start(0);
        for (s, st) in d.states.iter().enumerate() {
            let s = s as u32;
            for &(lo, hi, t) in &st.edges {
                let mut cur = lo as u16;
                for (b, rep) in self.mapped_in(lo, hi) {
                    if (*b as u16) > cur {
                        nfa.add_edge(s, cur as u8, b - 1, t);
                    }
                    if rep.is_empty() {
                        nfa.add_eps(s, t);
                    } else {
                        let end = nfa.add_literal_path(s, rep);
                        nfa.add_eps(end, t);
                    }
                    cur = *b as u16 + 1;
                }
                if cur <= hi as u16 {
                    nfa.add_edge(s, cur as u8, hi, t);
                }
            }
        }
        StringAutomaton::from_dfa(nfa.into_dfa())
    }

    /// Exact inverse image: the set of inputs whose image lies in `a`.
    pub(crate) fn inverse(&self, a: &StringAutomaton) -> StringAutomaton {
        let d = &a.dfa;
        let mut nfa = Nfa::new();
        for st in &d.states {
            let s = nfa.add_state();
            if st.accepting {
                nfa.mark_accepting(s);
            }
        }
        nfa.set_start(0);
        for (s, st) in d.states.iter().enumerate() {
            let s = s as u32;
            // Unmapped bytes step as before; mapped bytes step wherever
            // their replacement string leads.
            for &(lo, hi, t) in &st.edges {
                let mut cur = lo as u16;
                for (b, _) in self.mapped_in(lo, hi) {
                    if (*b as u16) > cur {
                        nfa.add_edge(s, cur as u8, b - 1, t);
                    }
                    cur = *b as u16 + 1;
                }
                if cur <= hi as u16 {
                    nfa.add_edge(s, cur as u8, hi, t);
                }
            }
            for (b, rep) in &self.rules {
                if let Some(t) = d.walk(s, rep) {
                    nfa.add_edge(s, *b, *b, t);
                }
            }
        }
        StringAutomaton::from_dfa(nfa.into_dfa())
    }
}

pub(crate) struct SeqMap {
    rules: Vec<(Vec<u8>, Vec<u8>)>,
}

impl SeqMap {
    pub(crate) fn new(rules: Vec<(Vec<u8>, Vec<u8>)>) -> Self {
        SeqMap { rules }
    }

    /// Over-approximating image: each rule may fire wherever its sequence
    /// is readable, or not fire at all.
    pub(crate) fn image(&self, a: &StringAutomaton) -> StringAutomaton {
        let d = &a.dfa;
        let mut nfa = Nfa::new();
        for st in &d.states {
            let s = nfa.add_state();
            if st.accepting {
                nfa.mark_accepting(s);
            }
        }
        nfa.set_start(0);
        for (s, st) in d.states.iter().enumerate() {
            let s = s as u32;
            for &(lo, hi, t) in &st.edges {
                nfa.add_edge(s, lo, hi, t);
            }
            for (seq, rep) in &self.rules {
                if let Some(t) = d.walk(s, seq) {
                    if rep.is_empty() {
                        nfa.add_eps(s, t);
                    } else {
                        let end = nfa.add_literal_path(s, rep);
                        nfa.add_eps(end, t);
                    }
                }
            }
        }
        StringAutomaton::from_dfa(nfa.into_dfa())
    }
}

/// `htmlspecialchars` escaping mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HtmlFlag {
    /// Escape `&`, `<`, `>` and double quotes (PHP default).
    #[default]
    Compat,
    /// Escape single quotes as well.
    Quotes,
    /// Escape neither quote.
    NoQuotes,
    /// Like `Quotes`, plus forward slash.
    Slash,
}

impl HtmlFlag {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ENT_COMPAT" => Some(HtmlFlag::Compat),
            "ENT_QUOTES" => Some(HtmlFlag::Quotes),
            "ENT_NOQUOTES" => Some(HtmlFlag::NoQuotes),
            "ENT_SLASH" => Some(HtmlFlag::Slash),
            _ => None,
        }
    }

    fn table(self) -> ByteMap {
        let mut rules: Vec<(u8, &[u8])> = vec![
            (b'&', b"&amp;"),
            (b'<', b"&lt;"),
            (b'>', b"&gt;"),
        ];
        match self {
            HtmlFlag::Compat => rules.push((b'"', b"&quot;")),
            HtmlFlag::Quotes => {
                rules.push((b'"', b"&quot;"));
                rules.push((b'\'', b"&#039;"));
            }
            HtmlFlag::NoQuotes => {}
            HtmlFlag::Slash => {
                rules.push((b'"', b"&quot;"));
                rules.push((b'\'', b"&#039;"));
                rules.push((b'/', b"&#047;"));
            }
        }
        ByteMap::new(&rules)
    }
}

fn addslashes_table() -> ByteMap {
    ByteMap::new(&[
        (b'\'', b"\\'"),
        (b'"', b"\\\""),
        (b'\\', b"\\\\"),
        (0x00, b"\\0"),
    ])
}

fn mysql_escape_table() -> ByteMap {
    ByteMap::new(&[
        (0x00, b"\\0"),
        (b'\n', b"\\n"),
        (b'\r', b"\\r"),
        (b'\\', b"\\\\"),
        (b'\'', b"\\'"),
        (b'"', b"\\\""),
        (0x1A, b"\\Z"),
    ])
}

fn nl2br_table() -> ByteMap {
    ByteMap::new(&[(b'\n', b"<br />\n")])
}

impl StringAutomaton {
    pub fn html_special_chars(&self, flag: HtmlFlag) -> Self {
        flag.table().image(self)
    }

    pub fn pre_html_special_chars(&self, flag: HtmlFlag) -> Self {
        flag.table().inverse(self)
    }

    pub fn add_slashes(&self) -> Self {
        addslashes_table().image(self)
    }

    pub fn pre_add_slashes(&self) -> Self {
        addslashes_table().inverse(self)
    }

    pub fn mysql_escape(&self) -> Self {
        mysql_escape_table().image(self)
    }

    pub fn pre_mysql_escape(&self) -> Self {
        mysql_escape_table().inverse(self)
    }

    /// `mysql_real_escape_string` differs from `mysql_escape_string` only
    /// in connection-charset handling, which a byte alphabet cannot see.
    pub fn mysql_real_escape(&self) -> Self {
        self.mysql_escape()
    }

    pub fn pre_mysql_real_escape(&self) -> Self {
        self.pre_mysql_escape()
    }

    pub fn nl2br(&self) -> Self {
        nl2br_table().image(self)
    }

    pub fn pre_nl2br(&self) -> Self {
        nl2br_table().inverse(self)
    }

    /// HTML attribute-context encoder: quotes and angle brackets escaped.
    pub fn encode_attr_string(&self) -> Self {
        HtmlFlag::Quotes.table().image(self)
    }

    pub fn pre_encode_attr_string(&self) -> Self {
        HtmlFlag::Quotes.table().inverse(self)
    }

    /// Text-fragment encoder: angle brackets and ampersands only.
    pub fn encode_text_fragment(&self) -> Self {
        HtmlFlag::NoQuotes.table().image(self)
    }

    pub fn pre_encode_text_fragment(&self) -> Self {
        HtmlFlag::NoQuotes.table().inverse(self)
    }
}
