//! ASCII case conversion.

use crate::StringAutomaton;

use super::charmap::ByteMap;

fn upper_table() -> ByteMap {
    ByteMap::from_rules((b'a'..=b'z').map(|b| (b, vec![b - 32])).collect())
}

fn lower_table() -> ByteMap {
    ByteMap::from_rules((b'A'..=b'Z').map(|b| (b, vec![b + 32])).collect())
}

impl StringAutomaton {
    pub fn to_upper_case(&self) -> Self {
        upper_table().image(self)
    }

    pub fn to_lower_case(&self) -> Self {
        lower_table().image(self)
    }

    /// All strings whose uppercasing lies in `self`.
    pub fn pre_to_upper_case(&self) -> Self {
        upper_table().inverse(self)
    }

    /// All strings whose lowercasing lies in `self`.
    pub fn pre_to_lower_case(&self) -> Self {
        lower_table().inverse(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upper_maps_mixed_input() {
        let a = StringAutomaton::literal("aBc1");
        let up = a.to_upper_case();
        assert!(up.accepts("ABC1"));
        assert!(!up.accepts("aBc1"));
    }

    #[test]
    fn pre_upper_is_case_insensitive() {
        let target = StringAutomaton::literal("AB");
        let pre = target.pre_to_upper_case();
        assert!(pre.accepts("ab"));
        assert!(pre.accepts("aB"));
        assert!(pre.accepts("AB"));
        assert!(!pre.accepts("abc"));
    }

    #[test]
    fn lower_leaves_non_letters() {
        let a = StringAutomaton::literal("A-B");
        assert!(a.to_lower_case().accepts("a-b"));
    }
}
