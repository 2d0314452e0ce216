use parley_types::Message;

/// A pinned message together with its position in the full transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinnedMessage<'a> {
    pub index: usize,
    pub message: &'a Message,
}

/// Exactly the messages with `fixed_in_prompt` set, in transcript order.
#[must_use]
pub fn pinned_messages(messages: &[Message]) -> Vec<PinnedMessage<'_>> {
    messages
        .iter()
        .enumerate()
        .filter(|(_, msg)| msg.fixed_in_prompt)
        .map(|(index, message)| PinnedMessage { index, message })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::pinned_messages;
    use parley_types::{ChatId, Message, MessageId, NewMessage, NonEmptyString};

    fn msg(id: i64, pinned: bool) -> Message {
        let text = NonEmptyString::new(format!("m{id}")).expect("non-empty");
        let mut msg = NewMessage::user(ChatId::new(1), text, SystemTime::UNIX_EPOCH)
            .persisted(MessageId::new(id));
        msg.fixed_in_prompt = pinned;
        msg
    }

    #[test]
    fn keeps_order_and_indices() {
        let messages = vec![msg(1, false), msg(2, true), msg(3, false), msg(4, true)];
        let pinned = pinned_messages(&messages);

        let ids: Vec<i64> = pinned.iter().map(|p| p.message.id.value()).collect();
        let indices: Vec<usize> = pinned.iter().map(|p| p.index).collect();
        assert_eq!(ids, vec![2, 4]);
        assert_eq!(indices, vec![1, 3]);
    }

    #[test]
    fn empty_when_nothing_pinned() {
        let messages = vec![msg(1, false), msg(2, false)];
        assert!(pinned_messages(&messages).is_empty());
        assert!(pinned_messages(&[]).is_empty());
    }
}
