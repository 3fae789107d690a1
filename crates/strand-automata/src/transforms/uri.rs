//! URL percent-encoding family: encodeURIComponent/encodeURI and the
//! legacy JavaScript escape, with their decode directions.
//!
//! Encoders are exact byte homomorphisms. Decoders rewrite `%XX`
//! sequences nondeterministically, an over-approximation of the concrete
//! decoder (which always decodes); the analysis only needs the superset
//! direction.

use crate::StringAutomaton;

use super::charmap::{ByteMap, SeqMap};

fn uri_component_allowed(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"-_.!~*'()".contains(&b)
}

fn uri_allowed(b: u8) -> bool {
    uri_component_allowed(b) || b"#$&+,/:;=?@".contains(&b)
}

fn js_escape_allowed(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"@*_+-./".contains(&b)
}

fn percent_encode_table(allowed: fn(u8) -> bool) -> ByteMap {
    let mut rules = Vec::new();
    for b in 0..=255u8 {
        if !allowed(b) {
            rules.push((b, format!("%{b:02X}").into_bytes()));
        }
    }
    ByteMap::from_rules(rules)
}

fn hex_variants(nibble: u8) -> Vec<u8> {
    if nibble < 10 {
        vec![b'0' + nibble]
    } else {
        vec![b'A' + nibble - 10, b'a' + nibble - 10]
    }
}

/// `prefix` + two hex digits (either case) → the decoded byte.
fn percent_decode_rules(prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
    let mut rules = Vec::new();
    for v in 0..=255u8 {
        for &h in &hex_variants(v >> 4) {
            for &l in &hex_variants(v & 0x0F) {
                let mut seq = prefix.to_vec();
                seq.push(h);
                seq.push(l);
                rules.push((seq, vec![v]));
            }
        }
    }
    rules
}

impl StringAutomaton {
    pub fn encode_uri_component(&self) -> Self {
        percent_encode_table(uri_component_allowed).image(self)
    }

    pub fn decode_uri_component(&self) -> Self {
        SeqMap::new(percent_decode_rules(b"%")).image(self)
    }

    pub fn encode_uri(&self) -> Self {
        percent_encode_table(uri_allowed).image(self)
    }

    pub fn decode_uri(&self) -> Self {
        SeqMap::new(percent_decode_rules(b"%")).image(self)
    }

    pub fn escape_js(&self) -> Self {
        percent_encode_table(js_escape_allowed).image(self)
    }

    pub fn unescape_js(&self) -> Self {
        let mut rules = percent_decode_rules(b"%");
        rules.extend(percent_decode_rules(b"%u00"));
        SeqMap::new(rules).image(self)
    }
}
