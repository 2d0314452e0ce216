use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use parley_types::{
    Chat, ChatField, ChatId, Message, MessageId, NewChat, NewMessage, NewPrompt, Prompt, PromptId,
};

use crate::{ChatStore, StoreError};

/// Store operations that can be made to fail on purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    CreateChat,
    UpdateChat,
    CreateMessage,
    UpdateMessage,
}

#[derive(Debug, Default)]
struct Inner {
    chats: Vec<Chat>,
    messages: Vec<Message>,
    prompts: Vec<Prompt>,
    next_id: i64,
    failing: HashSet<StoreOp>,
}

impl Inner {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn check(&self, op: StoreOp) -> Result<(), StoreError> {
        if self.failing.contains(&op) {
            return Err(StoreError::Unavailable(format!("{op:?} disabled")));
        }
        Ok(())
    }
}

/// In-process [`ChatStore`].
///
/// Clones share the same data, so a test can keep a handle after moving the
/// store into the engine.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make `op` fail with [`StoreError::Unavailable`] until re-enabled.
    pub fn set_failing(&self, op: StoreOp, failing: bool) {
        let mut inner = self.lock();
        if failing {
            inner.failing.insert(op);
        } else {
            inner.failing.remove(&op);
        }
    }

    #[must_use]
    pub fn chat_count(&self) -> usize {
        self.lock().chats.len()
    }

    #[must_use]
    pub fn message_count(&self) -> usize {
        self.lock().messages.len()
    }
}

impl ChatStore for MemoryStore {
    fn create_chat(&mut self, chat: NewChat) -> Result<ChatId, StoreError> {
        let mut inner = self.lock();
        inner.check(StoreOp::CreateChat)?;
        let id = ChatId::new(inner.next_id());
        inner.chats.push(chat.persisted(id));
        Ok(id)
    }

    fn get_chat_by_id(&self, id: ChatId) -> Result<Chat, StoreError> {
        self.lock()
            .chats
            .iter()
            .find(|chat| chat.id == id)
            .cloned()
            .ok_or(StoreError::ChatNotFound(id))
    }

    fn list_chats(&self) -> Result<Vec<Chat>, StoreError> {
        let mut chats = self.lock().chats.clone();
        chats.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        Ok(chats)
    }

    fn update_chat_field_by_id(
        &mut self,
        id: ChatId,
        field: ChatField,
    ) -> Result<Chat, StoreError> {
        let mut inner = self.lock();
        inner.check(StoreOp::UpdateChat)?;
        let chat = inner
            .chats
            .iter_mut()
            .find(|chat| chat.id == id)
            .ok_or(StoreError::ChatNotFound(id))?;
        field.apply(chat);
        Ok(chat.clone())
    }

    fn create_message(&mut self, message: NewMessage) -> Result<Message, StoreError> {
        let mut inner = self.lock();
        inner.check(StoreOp::CreateMessage)?;
        let id = MessageId::new(inner.next_id());
        let message = message.persisted(id);
        inner.messages.push(message.clone());
        Ok(message)
    }

    fn get_messages(&self, chat_id: ChatId) -> Result<Vec<Message>, StoreError> {
        Ok(self
            .lock()
            .messages
            .iter()
            .filter(|msg| msg.chat_id == chat_id)
            .cloned()
            .collect())
    }

    fn update_message_flags(
        &mut self,
        id: MessageId,
        in_prompts: bool,
        fixed_in_prompt: bool,
    ) -> Result<Message, StoreError> {
        let mut inner = self.lock();
        inner.check(StoreOp::UpdateMessage)?;
        let message = inner
            .messages
            .iter_mut()
            .find(|msg| msg.id == id)
            .ok_or(StoreError::MessageNotFound(id))?;
        message.in_prompts = in_prompts;
        message.fixed_in_prompt = fixed_in_prompt;
        Ok(message.clone())
    }

    fn create_prompt(&mut self, prompt: NewPrompt) -> Result<Prompt, StoreError> {
        let mut inner = self.lock();
        let id = PromptId::new(inner.next_id());
        let prompt = prompt.persisted(id);
        inner.prompts.push(prompt.clone());
        Ok(prompt)
    }

    fn get_all_prompts(&self) -> Result<Vec<Prompt>, StoreError> {
        Ok(self.lock().prompts.clone())
    }

    fn get_prompt_by_id(&self, id: PromptId) -> Result<Prompt, StoreError> {
        self.lock()
            .prompts
            .iter()
            .find(|prompt| prompt.id == id)
            .cloned()
            .ok_or(StoreError::PromptNotFound(id))
    }
}
