//! Chat settings panel, message flags and chat selection.

use std::time::Instant;

use parley_context::{ContextWindow, check_limits};
use parley_types::{Chat, ChatField, ChatId, Message, MessageId};

use super::{App, EngineError, Notice, StoreError};

impl App {
    pub fn set_messages_limit(&mut self, limit: u32) -> Result<Chat, EngineError> {
        self.update_chat_field(ChatField::MessagesLimit(limit))
    }

    pub fn set_tokens_limit(&mut self, limit: u32) -> Result<Chat, EngineError> {
        self.update_chat_field(ChatField::TokensLimit(limit))
    }

    pub fn set_temperature(&mut self, temperature: f32) -> Result<Chat, EngineError> {
        self.update_chat_field(ChatField::Temperature(temperature))
    }

    pub fn set_model(&mut self, model: impl Into<String>) -> Result<Chat, EngineError> {
        self.update_chat_field(ChatField::Model(model.into()))
    }

    pub fn rename_chat(&mut self, name: impl Into<String>) -> Result<Chat, EngineError> {
        self.update_chat_field(ChatField::Name(name.into()))
    }

    /// Persist one field of the selected chat and re-select it. Limit
    /// changes move the context window.
    fn update_chat_field(&mut self, field: ChatField) -> Result<Chat, EngineError> {
        let id = self.chat.selected_id().ok_or(EngineError::NoChatSelected)?;
        let affects_window = field.affects_window();
        let column = field.column();

        let chat = match self.store.update_chat_field_by_id(id, field) {
            Ok(chat) => chat,
            Err(e) => {
                tracing::warn!(chat_id = %id, column, "Failed to update chat: {e}");
                self.push_notification(&Notice::SettingNotSaved {
                    detail: e.to_string(),
                });
                return Err(e.into());
            }
        };
        tracing::debug!(chat_id = %id, column, "Updated chat setting");

        self.chat.update_chat(chat.clone());
        if affects_window {
            self.recalculate_window();
        }
        Ok(chat)
    }

    /// Recompute which messages fit the effective limits and persist the
    /// `in_prompts` flags that changed.
    pub fn recalculate_window(&mut self) {
        let limits = self.effective_limits();
        let counter = self.counter;
        let window = ContextWindow::recalculate(self.chat.messages(), limits, |m| {
            counter.count_message(m)
        });
        self.persist_window(&window);
    }

    /// Exclude the oldest included messages until the window fits again.
    /// Excluded messages are never brought back.
    pub(crate) fn trim_window(&mut self) {
        let limits = self.effective_limits();
        let counter = self.counter;
        let window =
            ContextWindow::trim(self.chat.messages(), limits, |m| counter.count_message(m));
        self.persist_window(&window);
    }

    fn persist_window(&mut self, window: &ContextWindow) {
        for index in window.changed_indices(self.chat.messages()) {
            let Some(message) = self.chat.messages().get(index) else {
                continue;
            };
            let (id, pinned) = (message.id, message.fixed_in_prompt);
            let included = window.is_included(index);
            match self.store.update_message_flags(id, included, pinned) {
                Ok(updated) => {
                    self.chat.replace_message(updated);
                }
                Err(e) => {
                    tracing::warn!(message_id = %id, "Failed to persist window flag: {e}");
                    self.push_notification(&Notice::MessageNotSaved {
                        detail: e.to_string(),
                    });
                }
            }
        }

        self.remeasure();
    }

    /// Refresh prompt tokens and the included count from the current flags.
    pub fn remeasure(&mut self) {
        let counter = self.counter;
        let window = ContextWindow::measure(self.chat.messages(), |m| counter.count_message(m));
        self.chat.set_window(&window);
    }

    /// Include or exclude a message from the request context.
    ///
    /// Including runs the limit check on the counts the inclusion would
    /// produce; when it fails the matching warning is raised, nothing is
    /// persisted and `Ok(false)` is returned. Excluding a pinned message
    /// also unpins it.
    pub fn set_in_prompts(&mut self, id: MessageId, include: bool) -> Result<bool, EngineError> {
        let message = self.find_message(id)?;
        if message.in_prompts == include {
            return Ok(true);
        }

        if include && !self.admits(self.counter.count_message(&message)) {
            return Ok(false);
        }

        let pinned = include && message.fixed_in_prompt;
        self.write_flags(id, include, pinned)?;
        Ok(true)
    }

    /// Flip the pinned flag. Pinning an excluded message includes it, under
    /// the same limit check as [`App::set_in_prompts`].
    pub fn toggle_pinned(&mut self, id: MessageId) -> Result<bool, EngineError> {
        let message = self.find_message(id)?;
        let pinned = !message.fixed_in_prompt;
        let include = message.in_prompts || pinned;

        if include && !message.in_prompts && !self.admits(self.counter.count_message(&message)) {
            return Ok(false);
        }

        self.write_flags(id, include, pinned)?;
        Ok(true)
    }

    /// Load a chat and its transcript; `None` starts a new unsaved chat.
    pub fn select_chat(&mut self, id: Option<ChatId>) -> Result<(), EngineError> {
        match id {
            Some(id) => {
                let chat = self.store.get_chat_by_id(id)?;
                let messages = self.store.get_messages(id)?;
                tracing::debug!(chat_id = %id, messages = messages.len(), "Selected chat");
                self.chat.select(Some(chat), messages);
            }
            None => self.chat.select(None, Vec::new()),
        }
        self.remeasure();
        Ok(())
    }

    pub fn refresh_chats(&mut self) -> Result<(), StoreError> {
        let chats = self.store.list_chats()?;
        self.chat.set_chats(chats);
        Ok(())
    }

    fn find_message(&self, id: MessageId) -> Result<Message, EngineError> {
        self.chat
            .messages()
            .iter()
            .find(|m| m.id == id)
            .cloned()
            .ok_or(EngineError::Store(StoreError::MessageNotFound(id)))
    }

    /// Limit check for adding one message of `tokens` to the context.
    fn admits(&mut self, tokens: u32) -> bool {
        let check = check_limits(
            self.chat.prompt_tokens().saturating_add(tokens),
            self.chat.included_count().saturating_add(1),
            self.effective_limits(),
        );
        if check.is_within() {
            return true;
        }
        tracing::debug!(?check, "Inclusion rejected by limits");
        self.chat.raise_warning(check.warning(), Instant::now());
        false
    }

    fn write_flags(&mut self, id: MessageId, in_prompts: bool, pinned: bool) -> Result<(), EngineError> {
        match self.store.update_message_flags(id, in_prompts, pinned) {
            Ok(updated) => {
                self.chat.replace_message(updated);
                self.remeasure();
                Ok(())
            }
            Err(e) => {
                tracing::warn!(message_id = %id, "Failed to update message flags: {e}");
                self.push_notification(&Notice::MessageNotSaved {
                    detail: e.to_string(),
                });
                Err(e.into())
            }
        }
    }
}
