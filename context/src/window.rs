//! Which messages of a chat go into the next request.

use parley_types::Message;

use crate::limits::EffectiveLimits;

/// Derived view of the request context for one chat.
///
/// `included[i]` mirrors `messages[i].in_prompts` after recalculation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContextWindow {
    included: Vec<bool>,
    prompt_tokens: u32,
    included_count: u32,
}

impl ContextWindow {
    /// Recompute the window from the limits, ignoring current flags.
    ///
    /// Pinned messages are always included and consume budget first. The
    /// remaining budget is filled from the newest message backwards; the first
    /// unpinned message that does not fit closes the window, so the included
    /// unpinned messages are always a contiguous tail.
    pub fn recalculate(
        messages: &[Message],
        limits: EffectiveLimits,
        cost: impl Fn(&Message) -> u32,
    ) -> Self {
        let mut window = Self {
            included: vec![false; messages.len()],
            ..Self::default()
        };

        for (index, msg) in messages.iter().enumerate() {
            if msg.fixed_in_prompt {
                window.include(index, cost(msg));
            }
        }

        for (index, msg) in messages.iter().enumerate().rev() {
            if msg.fixed_in_prompt {
                continue;
            }
            let tokens = cost(msg);
            let fits_count = window.included_count < limits.messages();
            let fits_tokens = window.prompt_tokens.saturating_add(tokens) <= limits.tokens();
            if !(fits_count && fits_tokens) {
                break;
            }
            window.include(index, tokens);
        }

        window
    }

    /// Shrink the current window until it fits the limits.
    ///
    /// Starts from the messages' flags and excludes the oldest included
    /// unpinned messages first. Messages that are already excluded stay
    /// excluded.
    pub fn trim(
        messages: &[Message],
        limits: EffectiveLimits,
        cost: impl Fn(&Message) -> u32,
    ) -> Self {
        let mut window = Self::measure(messages, &cost);

        for (index, msg) in messages.iter().enumerate() {
            let over_count = window.included_count > limits.messages();
            let over_tokens = window.prompt_tokens > limits.tokens();
            if !(over_count || over_tokens) {
                break;
            }
            if msg.fixed_in_prompt || !window.included[index] {
                continue;
            }
            window.exclude(index, cost(msg));
        }

        window
    }

    /// Measure the window described by the messages' current flags.
    pub fn measure(messages: &[Message], cost: impl Fn(&Message) -> u32) -> Self {
        let mut window = Self {
            included: vec![false; messages.len()],
            ..Self::default()
        };
        for (index, msg) in messages.iter().enumerate() {
            if msg.in_prompts || msg.fixed_in_prompt {
                window.include(index, cost(msg));
            }
        }
        window
    }

    fn include(&mut self, index: usize, tokens: u32) {
        self.included[index] = true;
        self.prompt_tokens = self.prompt_tokens.saturating_add(tokens);
        self.included_count = self.included_count.saturating_add(1);
    }

    fn exclude(&mut self, index: usize, tokens: u32) {
        self.included[index] = false;
        self.prompt_tokens = self.prompt_tokens.saturating_sub(tokens);
        self.included_count = self.included_count.saturating_sub(1);
    }

    #[must_use]
    pub fn is_included(&self, index: usize) -> bool {
        self.included.get(index).copied().unwrap_or(false)
    }

    #[must_use]
    pub const fn prompt_tokens(&self) -> u32 {
        self.prompt_tokens
    }

    #[must_use]
    pub const fn included_count(&self) -> u32 {
        self.included_count
    }

    /// Indices whose `in_prompts` flag disagrees with this window.
    #[must_use]
    pub fn changed_indices(&self, messages: &[Message]) -> Vec<usize> {
        messages
            .iter()
            .enumerate()
            .filter(|(index, msg)| msg.in_prompts != self.is_included(*index))
            .map(|(index, _)| index)
            .collect()
    }

    /// Write the window back into the messages' `in_prompts` flags.
    pub fn apply(&self, messages: &mut [Message]) {
        for (index, msg) in messages.iter_mut().enumerate() {
            msg.in_prompts = self.is_included(index);
        }
    }
}

/// The ordered request context: messages flagged `in_prompts`.
#[must_use]
pub fn prompt_messages(messages: &[Message]) -> Vec<Message> {
    messages.iter().filter(|msg| msg.in_prompts).cloned().collect()
}
