//! IRCv3 message-tag escaping (`@key=value;key2=value2 COMMAND ...`).
//!
//! Unescape table: `\:` -> `;`, `\s` -> space, `\\` -> `\`, `\r` -> CR,
//! `\n` -> LF. A trailing lone `\` passes through unchanged; unknown `\X`
//! becomes `\X` (the backslash is dropped, `X` kept, matching the IRCv3
//! message-tags spec's "MUST NOT fail to parse" guidance).

pub fn escape_tag_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            ';' => out.push_str("\\:"),
            ' ' => out.push_str("\\s"),
            '\\' => out.push_str("\\\\"),
            '\r' => out.push_str("\\r"),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out
}

pub fn unescape_tag_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(':') => out.push(';'),
            Some('s') => out.push(' '),
            Some('\\') => out.push('\\'),
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some(other) => out.push(other),
            None => {
                // Lone trailing backslash: drop it silently, nothing to unescape.
            }
        }
    }
    out
}

/// Parse the `@tag1=val1;tag2` segment (without the leading `@`) into an
/// order-preserving sequence of `(key, unescaped value)`.
pub fn parse_tags(raw: &str) -> Vec<(String, Option<String>)> {
    raw.split(';')
        .filter(|s| !s.is_empty())
        .map(|tag| match tag.split_once('=') {
            Some((k, v)) => (k.to_owned(), Some(unescape_tag_value(v))),
            None => (tag.to_owned(), None),
        })
        .collect()
}

pub fn render_tags(tags: &[(String, Option<String>)]) -> String {
    tags.iter()
        .map(|(k, v)| match v {
            Some(v) => format!("{}={}", k, escape_tag_value(v)),
            None => k.clone(),
        })
        .collect::<Vec<_>>()
        .join(";")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_unescape_roundtrip() {
        let original = "a;b c\\d\re\nf";
        let escaped = escape_tag_value(original);
        assert_eq!(unescape_tag_value(&escaped), original);
    }

    #[test]
    fn unknown_escape_keeps_char_drops_backslash() {
        assert_eq!(unescape_tag_value("\\x"), "x");
    }

    #[test]
    fn trailing_backslash_is_dropped() {
        assert_eq!(unescape_tag_value("foo\\"), "foo");
    }

    #[test]
    fn parse_tags_preserves_order_and_valueless_keys() {
        let tags = parse_tags("time=2021-01-01T00:00:00Z;msgid;account=alice");
        assert_eq!(
            tags,
            vec![
                ("time".to_owned(), Some("2021-01-01T00:00:00Z".to_owned())),
                ("msgid".to_owned(), None),
                ("account".to_owned(), Some("alice".to_owned())),
            ]
        );
    }

    #[test]
    fn render_tags_escapes_values() {
        let tags = vec![("note".to_owned(), Some("a;b c".to_owned()))];
        assert_eq!(render_tags(&tags), "note=a\\:b\\sc");
    }
}
