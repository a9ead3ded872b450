//! IRC casemapping: the server-selected rule for comparing nicknames and channel
//! names. See RFC 2812 section 2.2 and the ISUPPORT `CASEMAPPING` token.

/// A casemapping rule. `Unset` behaves like `Rfc1459` for normalization purposes
/// (a server that never sends CASEMAPPING is assumed to be RFC1459) but is a
/// distinct variant so the session can tell whether the server has actually
/// sent one yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseMapping {
    Unset,
    Ascii,
    Rfc1459,
    Rfc1459Strict,
    Rfc7613,
}

impl Default for CaseMapping {
    fn default() -> Self {
        CaseMapping::Unset
    }
}

impl CaseMapping {
    /// Parse an ISUPPORT `CASEMAPPING` value. Unknown values are rejected (the
    /// caller keeps the previous mapping).
    pub fn parse(value: &str) -> Option<CaseMapping> {
        match value {
            "ascii" => Some(CaseMapping::Ascii),
            "rfc1459" => Some(CaseMapping::Rfc1459),
            "rfc1459-strict" => Some(CaseMapping::Rfc1459Strict),
            "rfc7613" => Some(CaseMapping::Rfc7613),
            _ => None,
        }
    }

    /// Normalize a nickname or channel name for use as a lookup key. Never
    /// cache the result on the entity itself — casemapping can change once,
    /// at session start, and cached keys would go stale.
    pub fn normalize(&self, s: &str) -> String {
        match self {
            CaseMapping::Unset | CaseMapping::Rfc1459 => s.chars().map(rfc1459_lower).collect(),
            CaseMapping::Rfc1459Strict => s.chars().map(rfc1459_strict_lower).collect(),
            CaseMapping::Ascii => s.chars().map(|c| c.to_ascii_lowercase()).collect(),
            // No full SASLprep implementation here (out of scope); Unicode
            // simple case folding is the closest stdlib-only approximation.
            CaseMapping::Rfc7613 => s.to_lowercase(),
        }
    }

    pub fn eq(&self, a: &str, b: &str) -> bool {
        self.normalize(a) == self.normalize(b)
    }
}

fn rfc1459_lower(c: char) -> char {
    match c {
        '[' => '{',
        ']' => '}',
        '\\' => '|',
        '~' => '^',
        _ => c.to_ascii_lowercase(),
    }
}

fn rfc1459_strict_lower(c: char) -> char {
    // rfc1459-strict omits the '~' <-> '^' mapping.
    match c {
        '[' => '{',
        ']' => '}',
        '\\' => '|',
        _ => c.to_ascii_lowercase(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_only_lowercases_az() {
        assert_eq!(CaseMapping::Ascii.normalize("Foo[Bar]"), "foo[bar]");
    }

    #[test]
    fn rfc1459_maps_brackets() {
        assert_eq!(CaseMapping::Rfc1459.normalize("Foo[Bar]~"), "foo{bar}^");
    }

    #[test]
    fn rfc1459_strict_leaves_tilde() {
        assert_eq!(CaseMapping::Rfc1459Strict.normalize("Foo~"), "foo~");
    }

    #[test]
    fn parse_rejects_unknown() {
        assert_eq!(CaseMapping::parse("bogus"), None);
        assert_eq!(CaseMapping::parse("ascii"), Some(CaseMapping::Ascii));
    }
}
