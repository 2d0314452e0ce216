//! Token counting using tiktoken.
//!
//! Counts are **approximate**: they use the `o200k_base` encoding and a fixed
//! per-message overhead for role markers. They drive the statistics display
//! and limit enforcement, not billing.

use std::sync::OnceLock;
use tiktoken_rs::{CoreBPE, o200k_base};

use parley_types::Message;

/// Approximate tokens spent on role markers and delimiters per message.
pub const MESSAGE_OVERHEAD: u32 = 4;

/// The tiktoken encoder is expensive to initialize (loads vocabulary data),
/// so we create it once and reuse it across all `TokenCounter` instances.
static ENCODER: OnceLock<Option<CoreBPE>> = OnceLock::new();

fn get_encoder() -> Option<&'static CoreBPE> {
    ENCODER.get_or_init(|| o200k_base().ok()).as_ref()
}

/// Thread-safe approximate token counter.
///
/// Falls back to byte length when the encoder cannot be loaded.
#[derive(Clone, Copy)]
pub struct TokenCounter {
    encoder: Option<&'static CoreBPE>,
}

impl std::fmt::Debug for TokenCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCounter")
            .field("encoder", &self.encoder.as_ref().map(|_| "<CoreBPE>"))
            .finish()
    }
}

impl TokenCounter {
    #[must_use]
    pub fn new() -> Self {
        let encoder = get_encoder();
        if encoder.is_none() {
            tracing::error!(
                "Failed to initialize tiktoken o200k_base encoder. Falling back to byte-length estimates."
            );
        }

        Self { encoder }
    }

    #[must_use]
    pub fn count_str(&self, text: &str) -> u32 {
        let len = match self.encoder {
            Some(encoder) => encoder.encode_ordinary(text).len(),
            None => text.len(),
        };

        u32::try_from(len).unwrap_or(u32::MAX)
    }

    /// Tokens for one message including role overhead.
    #[must_use]
    pub fn count_message(&self, msg: &Message) -> u32 {
        self.count_str(&msg.text)
            .saturating_add(self.count_str(msg.sender.as_str()))
            .saturating_add(MESSAGE_OVERHEAD)
    }

    #[must_use]
    pub fn count_messages<'a>(&self, messages: impl IntoIterator<Item = &'a Message>) -> u32 {
        messages
            .into_iter()
            .fold(0u32, |acc, msg| acc.saturating_add(self.count_message(msg)))
    }
}

impl Default for TokenCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::{MESSAGE_OVERHEAD, TokenCounter};
    use parley_types::{ChatId, MessageId, NewMessage, NonEmptyString};

    #[test]
    fn count_str_empty_string() {
        let counter = TokenCounter::new();
        assert_eq!(counter.count_str(""), 0);
    }

    #[test]
    fn count_str_longer_text() {
        let counter = TokenCounter::new();

        let text = "The quick brown fox jumps over the lazy dog.";
        let tokens = counter.count_str(text);

        assert!(tokens >= 5);
        assert!(tokens <= 20);
    }

    #[test]
    fn count_message_includes_overhead() {
        let counter = TokenCounter::new();
        let text = NonEmptyString::new("Hello there").expect("non-empty");
        let msg = NewMessage::user(ChatId::new(1), text, SystemTime::UNIX_EPOCH)
            .persisted(MessageId::new(1));

        let tokens = counter.count_message(&msg);
        assert!(tokens > counter.count_str("Hello there") + MESSAGE_OVERHEAD);
        assert_eq!(counter.count_messages([&msg, &msg]), tokens * 2);
    }
}
