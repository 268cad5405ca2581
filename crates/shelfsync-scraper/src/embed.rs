//! Cutting JSON values out of inline `<script>` source.

/// Returns the shortest prefix of `s` that forms a complete `{…}` object or
/// `[…]` array, or `None` if `s` does not start with one or it is unterminated.
///
/// Scans character-by-character tracking depth of the opening bracket type
/// only, respecting string literals and escape sequences. Only the matching
/// closer at depth 0 triggers a return, so `[42}` is never accepted.
pub(crate) fn extract_balanced(s: &str) -> Option<&str> {
    let (open, close) = match s.chars().next()? {
        '{' => ('{', '}'),
        '[' => ('[', ']'),
        _ => return None,
    };
    let mut depth: i32 = 0;
    let mut in_string = false;
    let mut escape = false;
    for (i, c) in s.char_indices() {
        if escape {
            escape = false;
            continue;
        }
        if in_string {
            match c {
                '\\' => escape = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            c if c == open => depth += 1,
            c if c == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_object_and_ignores_trailing_script() {
        let src = r#"{"a": {"b": 1}}; window.other = 2;"#;
        assert_eq!(extract_balanced(src), Some(r#"{"a": {"b": 1}}"#));
    }

    #[test]
    fn braces_inside_strings_do_not_count() {
        let src = r#"{"t": "close } here", "q": "esc \" }"} tail"#;
        assert_eq!(
            extract_balanced(src),
            Some(r#"{"t": "close } here", "q": "esc \" }"}"#)
        );
    }

    #[test]
    fn extracts_array() {
        assert_eq!(extract_balanced("[1, [2], 3] x"), Some("[1, [2], 3]"));
    }

    #[test]
    fn unterminated_returns_none() {
        assert_eq!(extract_balanced(r#"{"a": 1"#), None);
        assert_eq!(extract_balanced("[42}"), None);
    }

    #[test]
    fn non_json_start_returns_none() {
        assert_eq!(extract_balanced("JSON.parse('{}')"), None);
        assert_eq!(extract_balanced(""), None);
    }
}
