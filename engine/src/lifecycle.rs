//! Input Lifecycle Controller: one confirmed submission to one request.

use std::time::{Instant, SystemTime};

use parley_context::{check_limits, first_sentence, prompt_messages};
use parley_types::{ChatId, Message, NewChat, NewMessage, NonEmptyString, PromptId, Surface};

use super::{
    App, ChatRequest, InputSession, KeyAction, KeyInput, Notice, PromptRequest, SendOutcome,
    StoreError, WarningState,
};

impl App {
    /// Whether a response owned by the main input is in flight.
    #[must_use]
    pub fn main_input_busy(&self) -> bool {
        self.turn.is_responding()
            && self
                .turn
                .action_id()
                .is_some_and(Surface::uses_main_input)
    }

    /// Whether the main input refuses edits while a prompt action rewrites it.
    #[must_use]
    pub fn main_input_locked(&self) -> bool {
        self.turn.is_responding_for(Surface::ChatAction)
    }

    /// Feed a key to the main input. Enter submits.
    ///
    /// Returns the send outcome when the key submitted the draft.
    pub fn handle_main_key(&mut self, key: KeyInput) -> Option<SendOutcome> {
        if self.main_input_locked() {
            return None;
        }
        match self.main_input.handle_key(key) {
            KeyAction::None => None,
            KeyAction::Edited => {
                self.update_input_tokens();
                None
            }
            KeyAction::Submit => Some(self.handle_send_message()),
        }
    }

    /// Replace the main draft. Ignored while the input is locked.
    pub fn set_draft(&mut self, text: impl Into<String>) -> bool {
        if self.main_input_locked() {
            return false;
        }
        self.main_input.set_text(text);
        self.update_input_tokens();
        true
    }

    /// Mutable access to the main input for front ends that drive it
    /// directly. Call [`App::set_draft`] to keep token counts in sync.
    pub fn main_input_mut(&mut self) -> &mut InputSession {
        &mut self.main_input
    }

    /// Submit the main draft.
    ///
    /// Guards run before any mutation: empty input or a busy main input is a
    /// silent no-op, and a prompt over the effective token limit raises the
    /// `tokens_limit` warning. Otherwise the chat is created if needed, the
    /// message is persisted and published, and the `in_prompts` context is
    /// dispatched to the producer.
    pub fn handle_send_message(&mut self) -> SendOutcome {
        let Ok(text) = NonEmptyString::trimmed(self.main_input.text()) else {
            tracing::debug!("Ignoring send of empty input");
            return SendOutcome::Ignored;
        };
        if self.main_input_busy() {
            tracing::debug!("Ignoring send while a response is in progress");
            return SendOutcome::Ignored;
        }

        let limits = self.effective_limits();
        let tokens = self
            .chat
            .prompt_tokens()
            .saturating_add(self.chat.input_box_tokens());
        if check_limits(tokens, self.chat.included_count(), limits).exceeded_tokens {
            tracing::debug!(tokens, limit = limits.tokens(), "Send rejected by token limit");
            self.chat
                .raise_warning(WarningState::TokensLimit, Instant::now());
            return SendOutcome::TokensLimitExceeded;
        }

        let chat_id = match self.chat.selected_id() {
            Some(id) => id,
            None => match self.create_chat_for(text.as_str()) {
                Some(id) => id,
                None => return SendOutcome::PersistFailed,
            },
        };

        let message = NewMessage::user(chat_id, text, SystemTime::now());
        let message = match self.store.create_message(message) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(chat_id = %chat_id, "Failed to persist message: {e}");
                self.push_notification(&Notice::MessageNotSaved {
                    detail: e.to_string(),
                });
                return SendOutcome::PersistFailed;
            }
        };
        self.chat.publish_message(message);
        self.main_input.clear();
        self.update_input_tokens();

        let context = prompt_messages(self.chat.messages());
        self.dispatch_chat_request(chat_id, context);
        self.trim_window();
        SendOutcome::Sent
    }

    /// Apply a saved prompt to the main draft.
    ///
    /// The draft is snapshotted for [`App::undo_prompt_action`]; the answer
    /// replaces the draft when the response ends.
    pub fn handle_prompt_action(&mut self, prompt_id: PromptId) -> Result<bool, StoreError> {
        if self.main_input_busy() {
            tracing::debug!("Ignoring prompt action while a response is in progress");
            return Ok(false);
        }
        let prompt = self.store.get_prompt_by_id(prompt_id)?;

        self.main_input.snapshot_history();
        let request = PromptRequest {
            prompt: prompt.prompt,
            input: self.main_input.text().to_string(),
        };
        tracing::debug!(prompt_id = %prompt_id, "Applying prompt to draft");
        let sink = self.begin_turn(Surface::ChatAction, None);
        self.producer.send_prompt_request(request, sink);
        Ok(true)
    }

    /// Restore the draft captured by the last prompt action.
    pub fn undo_prompt_action(&mut self) -> bool {
        if self.main_input_locked() {
            return false;
        }
        let restored = self.main_input.restore_history();
        if restored {
            self.update_input_tokens();
        }
        restored
    }

    fn create_chat_for(&mut self, text: &str) -> Option<ChatId> {
        let chat = NewChat {
            name: first_sentence(text).to_string(),
            timestamp: SystemTime::now(),
        };
        match self.store.create_chat(chat.clone()) {
            Ok(id) => {
                tracing::info!(chat_id = %id, name = %chat.name, "Created chat");
                self.chat.insert_chat(chat.persisted(id));
                Some(id)
            }
            Err(e) => {
                tracing::warn!("Failed to create chat: {e}");
                self.push_notification(&Notice::ChatNotCreated {
                    detail: e.to_string(),
                });
                None
            }
        }
    }

    fn dispatch_chat_request(&mut self, chat_id: ChatId, messages: Vec<Message>) {
        let (model, temperature) = match self.chat.selected_chat() {
            Some(chat) => (
                chat.overrides.model_or_default().to_string(),
                chat.overrides.temperature_or_default(),
            ),
            None => (
                parley_types::DEFAULT_MODEL.to_string(),
                parley_types::DEFAULT_TEMPERATURE,
            ),
        };
        let request = ChatRequest {
            chat_id,
            messages,
            model,
            temperature,
        };
        tracing::debug!(
            chat_id = %chat_id,
            messages = request.messages.len(),
            model = %request.model,
            "Dispatching chat request"
        );
        let sink = self.begin_turn(Surface::MainChat, Some(chat_id));
        self.producer.send_chat_request(request, sink);
    }

    pub(crate) fn update_input_tokens(&mut self) {
        let tokens = self.counter.count_str(self.main_input.text().trim());
        self.chat.set_input_box_tokens(tokens);
    }
}
