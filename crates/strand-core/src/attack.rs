//! Sink-context attack patterns.
//!
//! Each context is described by a regex over the strings *allowed* to
//! reach that sink; the attack pattern is the complement (after admitting
//! the empty string, which is harmless everywhere). A non-empty overlap
//! between a sink's post-image and a context's attack pattern means the
//! program can emit a dangerous string in that context.

use serde::Serialize;
use strand_automata::{AutomatonError, RegexMode, StringAutomaton};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackContext {
    HtmlBody,
    HtmlAttribute,
    JavaScript,
    Url,
}

impl AttackContext {
    pub fn all() -> [AttackContext; 4] {
        [
            AttackContext::HtmlBody,
            AttackContext::HtmlAttribute,
            AttackContext::JavaScript,
            AttackContext::Url,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            AttackContext::HtmlBody => "html",
            AttackContext::HtmlAttribute => "html_attr",
            AttackContext::JavaScript => "js",
            AttackContext::Url => "url",
        }
    }

    pub fn parse(s: &str) -> Option<AttackContext> {
        match s {
            "html" => Some(AttackContext::HtmlBody),
            "html_attr" => Some(AttackContext::HtmlAttribute),
            "js" => Some(AttackContext::JavaScript),
            "url" => Some(AttackContext::Url),
            _ => None,
        }
    }

    /// The strings that may safely reach this sink.
    fn allowed_regex(&self) -> &'static str {
        match self {
            // Raw angle brackets, quotes, slashes and unescaped
            // ampersands are dangerous in HTML bodies.
            AttackContext::HtmlBody => {
                r#"([^<>'"&/]+|(&[a-zA-Z]+;|&#[xX][0-9a-zA-Z]+;|&#[0-9]+;)+)+"#
            }
            // Attributes allow alphanumerics and entities only.
            AttackContext::HtmlAttribute => {
                r"([a-zA-Z0-9]+|((&[a-zA-Z]+;|&#[xX][0-9]+;|&#[0-9]+;)))+"
            }
            // JS strings: word characters and escape sequences.
            AttackContext::JavaScript => {
                r"([a-zA-Z0-9,._\s]+|((\\u[a-fA-F0-9]{4})|(\\x[a-fA-F0-9]{2})))+"
            }
            // URLs: unreserved characters and percent escapes.
            AttackContext::Url => r"([a-zA-Z0-9_.!~*'()-]+|((%[a-fA-F0-9]{2})))+",
        }
    }

    /// The automaton of dangerous strings for this context.
    pub fn attack_pattern(&self) -> Result<StringAutomaton, AutomatonError> {
        let allowed = StringAutomaton::compile_regex(self.allowed_regex(), RegexMode::Exact)?;
        Ok(allowed.union_with_empty_string().complement())
    }
}

/// A trivial pattern for exercising the pipeline in tests: anything
/// containing the marker string counts as an attack.
pub fn literal_test_pattern() -> Result<StringAutomaton, AutomatonError> {
    StringAutomaton::compile_regex("foobarz", RegexMode::Contains)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_pattern_flags_script_tags() {
        let p = AttackContext::HtmlBody.attack_pattern().unwrap();
        assert!(p.accepts("<script>alert(1)</script>"));
        assert!(p.accepts("a<b"));
        assert!(!p.accepts("plain text"));
        assert!(!p.accepts("&lt;script&gt;"));
        assert!(!p.accepts(""));
    }

    #[test]
    fn attribute_pattern_is_stricter_than_body() {
        let p = AttackContext::HtmlAttribute.attack_pattern().unwrap();
        assert!(p.accepts("a b"), "spaces break out of attributes");
        assert!(p.accepts("x\" onload=\"evil()"));
        assert!(!p.accepts("value123"));
        assert!(!p.accepts("&amp;"));
    }

    #[test]
    fn js_pattern_allows_escapes() {
        let p = AttackContext::JavaScript.attack_pattern().unwrap();
        assert!(!p.accepts("hello world"));
        assert!(!p.accepts(r"\x3c"));
        assert!(p.accepts("<"));
        assert!(p.accepts("';alert(1)//"));
    }

    #[test]
    fn url_pattern_allows_percent_encoding() {
        let p = AttackContext::Url.attack_pattern().unwrap();
        assert!(!p.accepts("a-b_c.d%2F"));
        assert!(p.accepts("javascript:alert(1)"));
    }

    #[test]
    fn context_names_round_trip() {
        for ctx in AttackContext::all() {
            assert_eq!(AttackContext::parse(ctx.name()), Some(ctx));
        }
        assert_eq!(AttackContext::parse("bogus"), None);
    }
}
