/// Escaped tuple encoding used inside persisted documents
///
/// Configuration entries (`key:type:value`), dynamic endpoint declarations
/// (`name:type`) and node locations (`x:y`) are flat strings joined with `:`.
/// A `:` inside a part is written as `\:` and a backslash as `\\`. A backslash
/// followed by anything else is kept as is, so documents written before
/// backslashes were escaped still load.

pub const SEPARATOR: char = ':';
pub const ESCAPE: char = '\\';

/// Escape separators and backslashes inside one part
pub fn escape(part: &str) -> String {
    let mut escaped = String::with_capacity(part.len());
    for c in part.chars() {
        if c == SEPARATOR || c == ESCAPE {
            escaped.push(ESCAPE);
        }
        escaped.push(c);
    }
    escaped
}

/// Undo `escape`
pub fn unescape(part: &str) -> String {
    let mut parts = split_escaped(part, false);
    parts.pop().unwrap_or_default()
}

/// Join parts with the separator, escaping each part
pub fn concat(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|part| escape(part))
        .collect::<Vec<_>>()
        .join(&SEPARATOR.to_string())
}

/// Split on unescaped separators and unescape each part
///
/// Trailing empty parts are dropped, so `key:type:` yields two parts.
pub fn split(text: &str) -> Vec<String> {
    let mut parts = split_escaped(text, true);
    while parts.last().is_some_and(String::is_empty) {
        parts.pop();
    }
    parts
}

fn split_escaped(text: &str, on_separator: bool) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            ESCAPE => match chars.peek().copied() {
                Some(next) if next == SEPARATOR || next == ESCAPE => {
                    current.push(next);
                    chars.next();
                }
                _ => current.push(c),
            },
            SEPARATOR if on_separator => parts.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    parts.push(current);
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separators_inside_values_survive() {
        let encoded = concat(&["url", "java.lang.String", "http://host:8080"]);
        assert_eq!(encoded, r"url:java.lang.String:http\://host\:8080");
        assert_eq!(split(&encoded), vec!["url", "java.lang.String", "http://host:8080"]);
    }

    #[test]
    fn trailing_backslash_does_not_swallow_the_separator() {
        let encoded = concat(&[r"out\", "java.lang.Double"]);
        assert_eq!(encoded, r"out\\:java.lang.Double");
        assert_eq!(split(&encoded), vec![r"out\", "java.lang.Double"]);

        let encoded = concat(&[r"dir\", "java.lang.String", r"C:\data\"]);
        assert_eq!(split(&encoded), vec![r"dir\", "java.lang.String", r"C:\data\"]);
        assert_eq!(unescape(&escape(r"a\:b\\")), r"a\:b\\");
    }

    #[test]
    fn empty_value_is_dropped() {
        assert_eq!(split("iterations:java.lang.Integer:"), vec!["iterations", "java.lang.Integer"]);
    }

    #[test]
    fn lone_backslash_is_kept() {
        assert_eq!(split(r"path:java.lang.String:C\dir"), vec!["path", "java.lang.String", r"C\dir"]);
    }
}
