//! Chat records and their per-chat setting overrides.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::ids::ChatId;

/// Model used when a chat carries no override.
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Sampling temperature used when a chat carries no override.
pub const DEFAULT_TEMPERATURE: f32 = 1.0;

/// Per-chat settings that shadow the global defaults.
///
/// `None` means "unset, use the global default". `Some(0)` is a real limit of
/// zero and must never be collapsed into `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages_limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl ChatOverrides {
    #[must_use]
    pub fn temperature_or_default(&self) -> f32 {
        self.temperature.unwrap_or(DEFAULT_TEMPERATURE)
    }

    #[must_use]
    pub fn model_or_default(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: ChatId,
    pub name: String,
    pub timestamp: SystemTime,
    #[serde(flatten)]
    pub overrides: ChatOverrides,
}

/// Fields needed to create a chat; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewChat {
    pub name: String,
    pub timestamp: SystemTime,
}

impl NewChat {
    #[must_use]
    pub fn persisted(self, id: ChatId) -> Chat {
        Chat {
            id,
            name: self.name,
            timestamp: self.timestamp,
            overrides: ChatOverrides::default(),
        }
    }
}

/// A single mutable chat column, as edited from the chat settings panel.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatField {
    Name(String),
    MessagesLimit(u32),
    TokensLimit(u32),
    Temperature(f32),
    Model(String),
}

impl ChatField {
    /// Column name in persisted storage.
    #[must_use]
    pub const fn column(&self) -> &'static str {
        match self {
            Self::Name(_) => "name",
            Self::MessagesLimit(_) => "messages_limit",
            Self::TokensLimit(_) => "tokens_limit",
            Self::Temperature(_) => "temperature",
            Self::Model(_) => "model",
        }
    }

    /// Whether changing this field moves the context window.
    #[must_use]
    pub const fn affects_window(&self) -> bool {
        matches!(self, Self::MessagesLimit(_) | Self::TokensLimit(_))
    }

    pub fn apply(&self, chat: &mut Chat) {
        match self {
            Self::Name(name) => chat.name.clone_from(name),
            Self::MessagesLimit(limit) => chat.overrides.messages_limit = Some(*limit),
            Self::TokensLimit(limit) => chat.overrides.tokens_limit = Some(*limit),
            Self::Temperature(value) => chat.overrides.temperature = Some(*value),
            Self::Model(model) => chat.overrides.model = Some(model.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chat() -> Chat {
        NewChat {
            name: "Hello".to_string(),
            timestamp: SystemTime::UNIX_EPOCH,
        }
        .persisted(ChatId::new(1))
    }

    #[test]
    fn zero_limit_is_an_override() {
        let mut chat = chat();
        ChatField::TokensLimit(0).apply(&mut chat);
        assert_eq!(chat.overrides.tokens_limit, Some(0));
        assert_eq!(chat.overrides.messages_limit, None);
    }

    #[test]
    fn defaults_apply_without_overrides() {
        let chat = chat();
        assert_eq!(chat.overrides.model_or_default(), DEFAULT_MODEL);
        assert!((chat.overrides.temperature_or_default() - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn only_limits_affect_window() {
        assert!(ChatField::MessagesLimit(3).affects_window());
        assert!(ChatField::TokensLimit(3).affects_window());
        assert!(!ChatField::Temperature(0.5).affects_window());
        assert!(!ChatField::Model("x".into()).affects_window());
    }
}
