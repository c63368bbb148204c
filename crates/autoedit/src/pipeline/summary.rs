pub const CAPTION_SUMMARY_LIMIT: usize = 160;
pub const PROMPT_SUMMARY_LIMIT: usize = 200;

/// Cuts `text` to at most `limit` characters, ending in "..." when shortened.
pub fn truncate_summary(text: &str, limit: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let keep = limit.saturating_sub(3);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_untouched() {
        assert_eq!(truncate_summary(" add sepia ", 160), "add sepia");
    }

    #[test]
    fn test_long_text_truncated_to_limit() {
        let text = "a".repeat(250);
        let out = truncate_summary(&text, CAPTION_SUMMARY_LIMIT);
        assert_eq!(out.chars().count(), 160);
        assert!(out.ends_with("..."));
        assert_eq!(&out[..157], &text[..157]);
    }

    #[test]
    fn test_multibyte_boundary() {
        let text = "é".repeat(210);
        let out = truncate_summary(&text, PROMPT_SUMMARY_LIMIT);
        assert_eq!(out.chars().count(), 200);
    }
}
