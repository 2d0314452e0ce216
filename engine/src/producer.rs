//! Response Producer contract.
//!
//! The model call and its transport live outside the engine. A producer is
//! handed a [`ResponseSink`] per request and reports back through it; the
//! engine drains the other end of the channel on each tick.

use futures_util::future::AbortRegistration;
use parley_types::{ChatId, Message, Sender};
use serde::Serialize;
use tokio::sync::mpsc;

/// Capacity of the per-response event channel.
pub const RESPONSE_CHANNEL_CAPACITY: usize = 1024;

/// Events a producer emits for one response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseEvent {
    /// Incremental text in streaming mode, or the full text so far otherwise.
    Delta(String),
    /// Natural completion.
    Done,
    /// The producer gave up. Content already delivered is kept.
    Error(String),
}

/// Where a producer delivers one response.
///
/// Producers must stop once the registration is aborted; wrapping their task
/// in `futures_util::future::Abortable` is enough.
#[derive(Debug)]
pub struct ResponseSink {
    tx: mpsc::Sender<ResponseEvent>,
    abort: AbortRegistration,
}

impl ResponseSink {
    pub(crate) fn new(tx: mpsc::Sender<ResponseEvent>, abort: AbortRegistration) -> Self {
        Self { tx, abort }
    }

    #[must_use]
    pub fn sender(&self) -> &mpsc::Sender<ResponseEvent> {
        &self.tx
    }

    #[must_use]
    pub fn into_parts(self) -> (mpsc::Sender<ResponseEvent>, AbortRegistration) {
        (self.tx, self.abort)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl From<Sender> for Role {
    fn from(sender: Sender) -> Self {
        match sender {
            Sender::User => Self::User,
            Sender::Assistant => Self::Assistant,
        }
    }
}

/// One entry of the outgoing request context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiMessage {
    pub role: Role,
    pub content: String,
}

impl ApiMessage {
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// A chat completion request for the main chat surface.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub chat_id: ChatId,
    /// Messages with `in_prompts` set, oldest first.
    pub messages: Vec<Message>,
    pub model: String,
    pub temperature: f32,
}

impl ChatRequest {
    #[must_use]
    pub fn api_messages(&self) -> Vec<ApiMessage> {
        self.messages
            .iter()
            .map(|m| ApiMessage::new(m.sender.into(), m.text.clone()))
            .collect()
    }
}

/// A one-shot request applying a saved prompt template to some input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptRequest {
    pub prompt: String,
    pub input: String,
}

impl PromptRequest {
    #[must_use]
    pub fn api_messages(&self) -> Vec<ApiMessage> {
        vec![
            ApiMessage::new(Role::System, self.prompt.clone()),
            ApiMessage::new(Role::User, self.input.clone()),
        ]
    }
}

/// Fire-and-forget response source.
///
/// Both calls return immediately. Completion is reported as
/// [`ResponseEvent::Done`] or [`ResponseEvent::Error`]; dropping the sender
/// without either is treated as an error by the engine.
pub trait ResponseProducer {
    fn send_chat_request(&mut self, request: ChatRequest, sink: ResponseSink);

    fn send_prompt_request(&mut self, request: PromptRequest, sink: ResponseSink);
}
