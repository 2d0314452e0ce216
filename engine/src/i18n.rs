//! Localized user-visible notices.

use parley_config::Language;

/// Something the engine tells the user outside the message list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// A send or inclusion was refused by the limit check.
    LimitExceeded,
    /// `markdown_code_scope` named languages the highlighter does not know.
    InvalidCodeScope { unknown: Vec<String> },
    /// The chat could not be created.
    ChatNotCreated { detail: String },
    /// A message could not be written to the store.
    MessageNotSaved { detail: String },
    /// A chat setting could not be written to the store.
    SettingNotSaved { detail: String },
    /// No event arrived from the producer within the watchdog window.
    ResponseTimedOut { secs: u64 },
    /// The producer reported an error or went away.
    ResponseFailed { detail: String },
}

/// Renders notices in the configured language.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Catalog {
    language: Language,
}

impl Catalog {
    #[must_use]
    pub const fn new(language: Language) -> Self {
        Self { language }
    }

    #[must_use]
    pub const fn language(&self) -> Language {
        self.language
    }

    #[must_use]
    pub fn render(&self, notice: &Notice) -> String {
        match self.language {
            Language::En => render_en(notice),
            Language::Zh => render_zh(notice),
        }
    }
}

fn render_en(notice: &Notice) -> String {
    match notice {
        Notice::LimitExceeded => "Operation failed: Exceeding limit!".to_string(),
        Notice::InvalidCodeScope { unknown } => format!(
            "Settings error: unknown code highlight language(s) {}; using automatic detection",
            unknown.join(", ")
        ),
        Notice::ChatNotCreated { detail } => format!("Could not create chat: {detail}"),
        Notice::MessageNotSaved { detail } => format!("Message could not be saved: {detail}"),
        Notice::SettingNotSaved { detail } => format!("Setting could not be saved: {detail}"),
        Notice::ResponseTimedOut { secs } => {
            format!("No response for {secs}s; the request was stopped")
        }
        Notice::ResponseFailed { detail } => format!("Response failed: {detail}"),
    }
}

fn render_zh(notice: &Notice) -> String {
    match notice {
        Notice::LimitExceeded => "操作失败：超出限制！".to_string(),
        Notice::InvalidCodeScope { unknown } => format!(
            "设置错误：未知的代码高亮语言 {}，已改为自动检测",
            unknown.join(", ")
        ),
        Notice::ChatNotCreated { detail } => format!("无法创建对话：{detail}"),
        Notice::MessageNotSaved { detail } => format!("消息保存失败：{detail}"),
        Notice::SettingNotSaved { detail } => format!("设置保存失败：{detail}"),
        Notice::ResponseTimedOut { secs } => format!("{secs} 秒内没有响应，请求已停止"),
        Notice::ResponseFailed { detail } => format!("响应失败：{detail}"),
    }
}
