//! Defensive JSON extraction from generation-model responses (spec §9): the
//! Invalidator and the deep extractor both need to tolerate a reply wrapped
//! in prose or a fenced code block rather than bare JSON.

/// Strip a leading/trailing ` ``` ` or ` ```json ` fence, if present.
pub(crate) fn strip_code_fences(s: &str) -> &str {
    let trimmed = s.trim();
    if let Some(rest) = trimmed.strip_prefix("```") {
        let rest = rest.strip_prefix("json").unwrap_or(rest);
        rest.strip_suffix("```").unwrap_or(rest).trim()
    } else {
        trimmed
    }
}

/// Locate the first balanced `{...}` region in `s`.
pub(crate) fn first_json_object(s: &str) -> Option<&str> {
    let start = s.find('{')?;
    let mut depth = 0usize;
    for (offset, ch) in s[start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[start..start + offset + 1]);
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
    fn strips_json_fence() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
    }

    #[test]
    fn leaves_bare_json_unchanged() {
        assert_eq!(strip_code_fences(r#"{"a":1}"#), r#"{"a":1}"#);
    }

    #[test]
    fn finds_first_balanced_object_amid_prose() {
        let s = "here you go: {\"a\": {\"b\": 1}} thanks";
        assert_eq!(first_json_object(s), Some("{\"a\": {\"b\": 1}}"));
    }

    #[test]
    fn returns_none_when_no_object_present() {
        assert_eq!(first_json_object("no json here"), None);
    }
}
