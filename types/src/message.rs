//! Chat message domain model.
//!
//! Constructors take `SystemTime` explicitly; callers own the clock.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::ids::{ChatId, MessageId};
use crate::proofs::NonEmptyString;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

impl Sender {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }
}

/// A message that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub chat_id: ChatId,
    pub text: NonEmptyString,
    pub sender: Sender,
    pub timestamp: SystemTime,
    pub in_prompts: bool,
}

impl NewMessage {
    /// A user message, included in the next request context.
    #[must_use]
    pub fn user(chat_id: ChatId, text: NonEmptyString, timestamp: SystemTime) -> Self {
        Self {
            chat_id,
            text,
            sender: Sender::User,
            timestamp,
            in_prompts: true,
        }
    }

    #[must_use]
    pub fn assistant(chat_id: ChatId, text: NonEmptyString, timestamp: SystemTime) -> Self {
        Self {
            chat_id,
            text,
            sender: Sender::Assistant,
            timestamp,
            in_prompts: true,
        }
    }

    #[must_use]
    pub fn persisted(self, id: MessageId) -> Message {
        Message {
            id,
            chat_id: self.chat_id,
            text: self.text.into_inner(),
            sender: self.sender,
            timestamp: self.timestamp,
            in_prompts: self.in_prompts,
            fixed_in_prompt: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub chat_id: ChatId,
    pub text: String,
    pub sender: Sender,
    pub timestamp: SystemTime,
    /// Included in the next request context.
    pub in_prompts: bool,
    /// Pinned: kept in the context regardless of window trimming.
    #[serde(default)]
    pub fixed_in_prompt: bool,
}

impl Message {
    #[must_use]
    pub fn is_pinned(&self) -> bool {
        self.fixed_in_prompt
    }
}
