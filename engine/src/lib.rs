//! Core engine for Parley - chat-turn state and orchestration.
//!
//! [`App`] is the Input Lifecycle Controller. It owns the Turn State Store,
//! the Chat State Store and one [`InputSession`] per input surface, and talks
//! to storage and the model only through [`ChatStore`] and
//! [`ResponseProducer`].

use std::time::Instant;

use thiserror::Error;
use tokio::sync::mpsc;

pub use parley_config::{CodeScope, Language, Settings};
pub use parley_context::{EffectiveLimits, LimitDefaults, TokenCounter};
pub use parley_store::{ChatStore, StoreError};
pub use parley_types::{
    Chat, ChatId, Message, MessageId, NewPrompt, Prompt, PromptId, Surface, WarningState,
};

mod chat_settings;
mod chat_state;
mod i18n;
mod input;
mod lifecycle;
mod notifications;
mod producer;
mod prompts;
mod streaming;
mod turn;
mod warning;

pub use chat_state::ChatState;
pub use i18n::{Catalog, Notice};
pub use input::{DraftInput, InputSession, KeyAction, KeyInput};
pub use notifications::{MAX_PENDING_NOTIFICATIONS, NotificationQueue};
pub use producer::{
    ApiMessage, ChatRequest, PromptRequest, RESPONSE_CHANNEL_CAPACITY, ResponseEvent,
    ResponseProducer, ResponseSink, Role,
};
pub use prompts::PromptPanel;
pub use turn::{AnswerBuffer, TurnPhase, TurnState};
pub use warning::{WARNING_DISPLAY, WarningSurface};

/// Maximum response events applied per [`App::process_response_events`] call.
pub const DEFAULT_RESPONSE_EVENT_BUDGET: usize = 512;

/// Which guard, if any, stopped a send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Empty input, or the main input is waiting on a response.
    Ignored,
    /// Prompt plus input tokens are over the effective limit.
    TokensLimitExceeded,
    /// The message was persisted and the request dispatched.
    Sent,
    /// The chat or message could not be persisted; nothing was dispatched.
    PersistFailed,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no chat is selected")]
    NoChatSelected,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Numbers shown in the chat statistics box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatStatistics {
    pub prompt_tokens: u32,
    pub input_box_tokens: u32,
    pub tokens_limit: u32,
    pub messages_limit: u32,
    pub included_count: u32,
    pub warning: WarningState,
}

impl ChatStatistics {
    /// Tokens the next request would carry.
    #[must_use]
    pub const fn total_tokens(&self) -> u32 {
        self.prompt_tokens.saturating_add(self.input_box_tokens)
    }
}

/// The response currently wired to the turn.
///
/// Exists exactly while [`TurnState`] is responding; dropping it drops the
/// receiver, so a producer that ignores the abort still cannot deliver.
#[derive(Debug)]
struct ActiveResponse {
    rx: mpsc::Receiver<ResponseEvent>,
    surface: Surface,
    /// Chat the answer belongs to, for the main chat surface.
    chat_id: Option<ChatId>,
}

pub struct App {
    settings: Settings,
    catalog: Catalog,
    code_scope: CodeScope,
    store: Box<dyn ChatStore>,
    producer: Box<dyn ResponseProducer>,
    counter: TokenCounter,
    turn: TurnState,
    chat: ChatState,
    main_input: InputSession,
    prompt_panel: PromptPanel,
    active: Option<ActiveResponse>,
    notifications: NotificationQueue,
}

impl App {
    /// Build the engine and load the chat list.
    ///
    /// An invalid code scope is reported as a notification and degrades to
    /// automatic highlighting.
    pub fn new(
        settings: Settings,
        store: Box<dyn ChatStore>,
        producer: Box<dyn ResponseProducer>,
    ) -> Self {
        let catalog = Catalog::new(settings.language);
        let (code_scope, scope_error) = settings.code_scope();
        let turn = TurnState::new(settings.stream_enable);

        let mut app = Self {
            settings,
            catalog,
            code_scope,
            store,
            producer,
            counter: TokenCounter::new(),
            turn,
            chat: ChatState::new(),
            main_input: InputSession::new(),
            prompt_panel: PromptPanel::default(),
            active: None,
            notifications: NotificationQueue::new(),
        };

        if let Some(err) = scope_error {
            app.push_notification(&Notice::InvalidCodeScope {
                unknown: err.unknown,
            });
        }
        if let Err(e) = app.refresh_chats() {
            tracing::warn!("Failed to load chats: {e}");
        }
        app.remeasure();
        app
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    #[must_use]
    pub fn code_scope(&self) -> &CodeScope {
        &self.code_scope
    }

    #[must_use]
    pub fn turn(&self) -> &TurnState {
        &self.turn
    }

    #[must_use]
    pub fn chat(&self) -> &ChatState {
        &self.chat
    }

    #[must_use]
    pub fn main_input(&self) -> &InputSession {
        &self.main_input
    }

    #[must_use]
    pub fn prompt_panel(&self) -> &PromptPanel {
        &self.prompt_panel
    }

    #[must_use]
    pub fn is_responding(&self) -> bool {
        self.turn.is_responding()
    }

    #[must_use]
    pub fn limit_defaults(&self) -> LimitDefaults {
        LimitDefaults {
            max_tokens: self.settings.max_tokens,
            max_messages: self.settings.max_messages_num,
        }
    }

    #[must_use]
    pub fn effective_limits(&self) -> EffectiveLimits {
        self.chat.effective_limits(self.limit_defaults())
    }

    #[must_use]
    pub fn statistics(&self) -> ChatStatistics {
        let limits = self.effective_limits();
        ChatStatistics {
            prompt_tokens: self.chat.prompt_tokens(),
            input_box_tokens: self.chat.input_box_tokens(),
            tokens_limit: limits.tokens(),
            messages_limit: limits.messages(),
            included_count: self.chat.included_count(),
            warning: self.chat.warning(),
        }
    }

    /// Localized banner for the active warning, if any.
    #[must_use]
    pub fn warning_text(&self) -> Option<String> {
        self.chat
            .warning()
            .is_active()
            .then(|| self.catalog.render(&Notice::LimitExceeded))
    }

    pub fn push_notification(&mut self, notice: &Notice) {
        self.notifications.push(self.catalog.render(notice));
    }

    pub fn take_notifications(&mut self) -> Vec<String> {
        self.notifications.take()
    }

    /// Advance timers: drain response events, expire the warning and stop a
    /// response that has gone quiet for longer than the configured timeout.
    pub fn tick(&mut self, now: Instant) {
        self.process_response_events();
        self.check_response_timeout(now);
        if self.chat.tick_warning(now) {
            tracing::trace!("Limit warning cleared");
        }
    }
}
