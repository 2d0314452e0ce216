//! Chat State Store: the selected chat, its transcript and prompt counters.

use std::time::Instant;

use parley_context::{ContextWindow, EffectiveLimits, LimitDefaults};
use parley_types::{Chat, ChatId, Message, MessageId, WarningState};

use crate::warning::WarningSurface;

#[derive(Debug, Default)]
pub struct ChatState {
    chats: Vec<Chat>,
    selected_chat: Option<Chat>,
    messages: Vec<Message>,
    input_box_tokens: u32,
    prompt_tokens: u32,
    included_count: u32,
    warning: WarningSurface,
}

impl ChatState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Known chats, newest first.
    #[must_use]
    pub fn chats(&self) -> &[Chat] {
        &self.chats
    }

    pub fn set_chats(&mut self, chats: Vec<Chat>) {
        self.chats = chats;
    }

    #[must_use]
    pub fn selected_chat(&self) -> Option<&Chat> {
        self.selected_chat.as_ref()
    }

    /// `None` while the selected chat has not been created yet.
    #[must_use]
    pub fn selected_id(&self) -> Option<ChatId> {
        self.selected_chat.as_ref().map(|chat| chat.id)
    }

    /// Replace the selection and its transcript.
    pub fn select(&mut self, chat: Option<Chat>, messages: Vec<Message>) {
        self.selected_chat = chat;
        self.messages = messages;
    }

    /// Refresh the selected chat after a field update, keeping the
    /// chat list in sync.
    pub fn update_chat(&mut self, chat: Chat) {
        if let Some(entry) = self.chats.iter_mut().find(|c| c.id == chat.id) {
            entry.clone_from(&chat);
        }
        if self.selected_id() == Some(chat.id) {
            self.selected_chat = Some(chat);
        }
    }

    /// Register a newly created chat and select it with an empty transcript.
    pub fn insert_chat(&mut self, chat: Chat) {
        self.chats.insert(0, chat.clone());
        self.select(Some(chat), Vec::new());
    }

    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Publish a persisted message if it belongs to the selected chat.
    ///
    /// Returns `false` when the message was for another chat.
    pub fn publish_message(&mut self, message: Message) -> bool {
        if self.selected_id() != Some(message.chat_id) {
            return false;
        }
        self.messages.push(message);
        true
    }

    /// Swap in the stored version of a message after a flag update.
    pub fn replace_message(&mut self, message: Message) -> bool {
        match self.messages.iter_mut().find(|m| m.id == message.id) {
            Some(slot) => {
                *slot = message;
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn message_index(&self, id: MessageId) -> Option<usize> {
        self.messages.iter().position(|m| m.id == id)
    }

    /// Limits in force for the selected chat.
    #[must_use]
    pub fn effective_limits(&self, defaults: LimitDefaults) -> EffectiveLimits {
        EffectiveLimits::resolve(
            self.selected_chat.as_ref().map(|chat| &chat.overrides),
            defaults,
        )
    }

    pub fn set_window(&mut self, window: &ContextWindow) {
        self.prompt_tokens = window.prompt_tokens();
        self.included_count = window.included_count();
    }

    #[must_use]
    pub fn prompt_tokens(&self) -> u32 {
        self.prompt_tokens
    }

    #[must_use]
    pub fn included_count(&self) -> u32 {
        self.included_count
    }

    #[must_use]
    pub fn input_box_tokens(&self) -> u32 {
        self.input_box_tokens
    }

    pub fn set_input_box_tokens(&mut self, tokens: u32) {
        self.input_box_tokens = tokens;
    }

    #[must_use]
    pub fn warning(&self) -> WarningState {
        self.warning.state()
    }

    #[must_use]
    pub fn warning_surface(&self) -> &WarningSurface {
        &self.warning
    }

    pub fn raise_warning(&mut self, state: WarningState, now: Instant) {
        self.warning.raise(state, now);
    }

    pub fn tick_warning(&mut self, now: Instant) -> bool {
        self.warning.tick(now)
    }
}
