//! `JSON.stringify` / `JSON.parse` for string values.
//!
//! Stringify wraps in double quotes and escapes specials (exact).
//! Parse strips the quotes by quotient and unescapes nondeterministically
//! (a sound superset; `\uXXXX` beyond the byte range is not modeled).

use crate::StringAutomaton;

use super::charmap::{ByteMap, SeqMap};

fn json_escape_table() -> ByteMap {
    let mut rules: Vec<(u8, Vec<u8>)> = vec![
        (b'"', b"\\\"".to_vec()),
        (b'\\', b"\\\\".to_vec()),
        (b'\n', b"\\n".to_vec()),
        (b'\r', b"\\r".to_vec()),
        (b'\t', b"\\t".to_vec()),
        (0x08, b"\\b".to_vec()),
        (0x0C, b"\\f".to_vec()),
    ];
    for b in 0x00..0x20u8 {
        if ![0x08, 0x09, 0x0A, 0x0C, 0x0D].contains(&b) {
            rules.push((b, format!("\\u{b:04x}").into_bytes()));
        }
    }
    ByteMap::from_rules(rules)
}

fn json_unescape_rules() -> Vec<(Vec<u8>, Vec<u8>)> {
    let mut rules: Vec<(Vec<u8>, Vec<u8>)> = vec![
        (b"\\\"".to_vec(), b"\"".to_vec()),
        (b"\\\\".to_vec(), b"\\".to_vec()),
        (b"\\/".to_vec(), b"/".to_vec()),
        (b"\\n".to_vec(), b"\n".to_vec()),
        (b"\\r".to_vec(), b"\r".to_vec()),
        (b"\\t".to_vec(), b"\t".to_vec()),
        (b"\\b".to_vec(), vec![0x08]),
        (b"\\f".to_vec(), vec![0x0C]),
    ];
    // \u00XX in either hex case.
    for v in 0..=255u8 {
        let hi = v >> 4;
        let lo = v & 0x0F;
        let hex = |n: u8| -> Vec<u8> {
            if n < 10 {
                vec![b'0' + n]
            } else {
                vec![b'a' + n - 10, b'A' + n - 10]
            }
        };
        for &h in &hex(hi) {
            for &l in &hex(lo) {
                rules.push((vec![b'\\', b'u', b'0', b'0', h, l], vec![v]));
            }
        }
    }
    rules
}

impl StringAutomaton {
    pub fn json_stringify(&self) -> Self {
        let quote = StringAutomaton::char(b'"');
        quote
            .concat(&json_escape_table().image(self))
            .concat(&quote)
    }

    pub fn json_parse(&self) -> Self {
        let inner = self
            .right_pre_concat_literal("\"")
            .left_pre_concat_literal("\"");
        SeqMap::new(json_unescape_rules()).image(&inner)
    }
}
