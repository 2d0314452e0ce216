//! Persistent storage for chats, messages and prompt templates.
//!
//! The [`ChatStore`] trait is the contract the engine depends on.
//! [`SqliteStore`] is the durable implementation; [`MemoryStore`] keeps
//! everything in process and supports failure injection for tests.

mod error;
mod memory;
mod sqlite;
mod sqlite_util;

pub use error::StoreError;
pub use memory::{MemoryStore, StoreOp};
pub use sqlite::SqliteStore;

use parley_types::{
    Chat, ChatField, ChatId, Message, MessageId, NewChat, NewMessage, NewPrompt, Prompt, PromptId,
};

/// Storage operations used by the chat lifecycle.
///
/// Calls are synchronous: implementations are local and complete before the
/// caller processes its next event.
pub trait ChatStore {
    fn create_chat(&mut self, chat: NewChat) -> Result<ChatId, StoreError>;

    fn get_chat_by_id(&self, id: ChatId) -> Result<Chat, StoreError>;

    /// All chats, newest first.
    fn list_chats(&self) -> Result<Vec<Chat>, StoreError>;

    /// Update one field and return the updated chat.
    fn update_chat_field_by_id(&mut self, id: ChatId, field: ChatField)
    -> Result<Chat, StoreError>;

    fn create_message(&mut self, message: NewMessage) -> Result<Message, StoreError>;

    /// Messages of a chat in creation order.
    fn get_messages(&self, chat_id: ChatId) -> Result<Vec<Message>, StoreError>;

    fn update_message_flags(
        &mut self,
        id: MessageId,
        in_prompts: bool,
        fixed_in_prompt: bool,
    ) -> Result<Message, StoreError>;

    fn create_prompt(&mut self, prompt: NewPrompt) -> Result<Prompt, StoreError>;

    fn get_all_prompts(&self) -> Result<Vec<Prompt>, StoreError>;

    fn get_prompt_by_id(&self, id: PromptId) -> Result<Prompt, StoreError>;
}
