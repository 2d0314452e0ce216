/// Characters that end the first sentence of a message.
const SENTENCE_TERMINATORS: &[char] = &['.', ',', '。', '，', '?', '？', '\n'];

/// Derive a chat display name from the first sentence of a message.
///
/// Returns the text before the first terminator, trimmed. Empty leading
/// segments are skipped. Without a usable terminator the whole message is
/// returned, trimmed.
#[must_use]
pub fn first_sentence(text: &str) -> &str {
    if !text.contains(SENTENCE_TERMINATORS) {
        return text.trim();
    }
    text.split(SENTENCE_TERMINATORS)
        .map(str::trim)
        .find(|segment| !segment.is_empty())
        .unwrap_or_else(|| text.trim())
}

#[cfg(test)]
mod tests {
    use super::first_sentence;

    #[test]
    fn stops_at_first_terminator() {
        assert_eq!(first_sentence("Hello, world."), "Hello");
        assert_eq!(first_sentence("What is Rust? Tell me."), "What is Rust");
    }

    #[test]
    fn whole_message_without_terminator() {
        assert_eq!(first_sentence("no terminator here"), "no terminator here");
    }

    #[test]
    fn full_width_punctuation() {
        assert_eq!(first_sentence("你好，世界。"), "你好");
        assert_eq!(first_sentence("为什么？因为"), "为什么");
    }

    #[test]
    fn skips_empty_leading_segments() {
        assert_eq!(first_sentence("\n  Plan the trip\nthen pack"), "Plan the trip");
        assert_eq!(first_sentence("..."), "...");
    }
}
