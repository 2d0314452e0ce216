//! Identifiers for UI surfaces and the limit warning flag.

use serde::{Deserialize, Serialize};

/// The UI surface that owns an in-flight response (the "action id").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Surface {
    /// The main chat transcript.
    MainChat,
    /// A saved prompt applied to the main chat input box.
    ChatAction,
    /// The standalone prompt panel.
    PromptPanel,
}

impl Surface {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MainChat => "main-chat",
            Self::ChatAction => "chat-action",
            Self::PromptPanel => "prompt-panel",
        }
    }

    /// Surfaces driven from the main chat input box.
    #[must_use]
    pub const fn uses_main_input(self) -> bool {
        matches!(self, Self::MainChat | Self::ChatAction)
    }
}

/// Three-state limit warning shown next to the chat statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum WarningState {
    #[default]
    None,
    TokensLimit,
    MessagesLimit,
}

impl WarningState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "",
            Self::TokensLimit => "tokens_limit",
            Self::MessagesLimit => "messages_limit",
        }
    }

    #[must_use]
    pub const fn is_active(self) -> bool {
        !matches!(self, Self::None)
    }
}
