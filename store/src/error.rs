use std::path::PathBuf;

use parley_types::{ChatId, MessageId, PromptId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("failed to prepare {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("chat {0} not found")]
    ChatNotFound(ChatId),
    #[error("message {0} not found")]
    MessageNotFound(MessageId),
    #[error("prompt {0} not found")]
    PromptNotFound(PromptId),
    #[error("corrupt row: {0}")]
    Corrupt(String),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}
