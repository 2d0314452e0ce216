//! Limit Enforcer: effective limit resolution and checks.

use parley_types::{ChatOverrides, WarningState};

/// Global ceilings used when a chat has no override.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitDefaults {
    pub max_tokens: u32,
    pub max_messages: u32,
}

/// Where an effective limit came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitSource {
    ChatOverride,
    GlobalDefault,
}

/// Limits after applying chat overrides over the global defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectiveLimits {
    tokens: u32,
    messages: u32,
    tokens_source: LimitSource,
    messages_source: LimitSource,
}

impl EffectiveLimits {
    /// Resolve limits for a chat. `None` overrides fall back to defaults;
    /// `Some(0)` stays zero.
    #[must_use]
    pub fn resolve(overrides: Option<&ChatOverrides>, defaults: LimitDefaults) -> Self {
        let (tokens, tokens_source) = pick(
            overrides.and_then(|o| o.tokens_limit),
            defaults.max_tokens,
        );
        let (messages, messages_source) = pick(
            overrides.and_then(|o| o.messages_limit),
            defaults.max_messages,
        );
        Self {
            tokens,
            messages,
            tokens_source,
            messages_source,
        }
    }

    #[must_use]
    pub const fn tokens(self) -> u32 {
        self.tokens
    }

    #[must_use]
    pub const fn messages(self) -> u32 {
        self.messages
    }

    #[must_use]
    pub const fn tokens_source(self) -> LimitSource {
        self.tokens_source
    }

    #[must_use]
    pub const fn messages_source(self) -> LimitSource {
        self.messages_source
    }
}

fn pick(value: Option<u32>, default: u32) -> (u32, LimitSource) {
    match value {
        Some(value) => (value, LimitSource::ChatOverride),
        None => (default, LimitSource::GlobalDefault),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LimitCheck {
    pub exceeded_tokens: bool,
    pub exceeded_messages: bool,
}

impl LimitCheck {
    #[must_use]
    pub const fn is_within(self) -> bool {
        !self.exceeded_tokens && !self.exceeded_messages
    }

    /// Warning to raise for this check. Tokens take precedence.
    #[must_use]
    pub const fn warning(self) -> WarningState {
        if self.exceeded_tokens {
            WarningState::TokensLimit
        } else if self.exceeded_messages {
            WarningState::MessagesLimit
        } else {
            WarningState::None
        }
    }
}

/// A count exceeds its limit only when strictly greater.
#[must_use]
pub const fn check_limits(
    current_tokens: u32,
    current_messages: u32,
    limits: EffectiveLimits,
) -> LimitCheck {
    LimitCheck {
        exceeded_tokens: current_tokens > limits.tokens,
        exceeded_messages: current_messages > limits.messages,
    }
}
