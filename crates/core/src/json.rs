//! Helpers for decoding JSON out of provider completions.
//!
//! Models frequently wrap JSON answers in markdown code fences even when
//! told not to. Strip them before handing the payload to serde so that the
//! parse-failure branch only fires on genuinely malformed output.

/// Strip a leading ```` ```json ```` / ```` ``` ```` fence and its closing
/// fence from a completion, returning the inner payload trimmed.
pub fn strip_code_fences(response: &str) -> &str {
    let trimmed = response.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop an optional language tag on the opening fence line.
    let rest = match rest.split_once('\n') {
        Some((_lang, body)) => body,
        None => rest,
    };
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_through_bare_json() {
        assert_eq!(strip_code_fences("{\"a\": 1}"), "{\"a\": 1}");
    }

    #[test]
    fn strips_json_fence() {
        let fenced = "```json\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fences(fenced), "{\"a\": 1}");
    }

    #[test]
    fn strips_untagged_fence() {
        let fenced = "```\n[1, 2]\n```";
        assert_eq!(strip_code_fences(fenced), "[1, 2]");
    }

    #[test]
    fn trims_surrounding_whitespace() {
        assert_eq!(strip_code_fences("  \n {\"a\": 1} \n"), "{\"a\": 1}");
    }

    #[test]
    fn tolerates_missing_closing_fence() {
        assert_eq!(strip_code_fences("```json\n{\"a\": 1}"), "{\"a\": 1}");
    }
}
