//! Offline response producer.
//!
//! Stands in for a model API: chat requests echo the latest user message
//! back word by word, prompt requests echo the input tagged with the prompt.

use std::time::Duration;

use futures_util::future::Abortable;
use parley_engine::{ChatRequest, PromptRequest, ResponseEvent, ResponseProducer, ResponseSink};
use parley_types::Sender;
use tokio::sync::mpsc;

const WORD_DELAY: Duration = Duration::from_millis(60);

#[derive(Debug, Clone)]
pub struct LoopbackProducer {
    stream: bool,
    delay: Duration,
}

impl LoopbackProducer {
    pub fn new(stream: bool) -> Self {
        Self {
            stream,
            delay: WORD_DELAY,
        }
    }

    fn spawn(&self, reply: String, sink: ResponseSink) {
        let (tx, registration) = sink.into_parts();
        let stream = self.stream;
        let delay = self.delay;

        let task = async move {
            if let Err(e) = emit(&tx, &reply, stream, delay).await {
                tracing::debug!("Loopback receiver went away: {e}");
            }
        };
        tokio::spawn(async move {
            let _ = Abortable::new(task, registration).await;
        });
    }
}

async fn emit(
    tx: &mpsc::Sender<ResponseEvent>,
    reply: &str,
    stream: bool,
    delay: Duration,
) -> Result<(), mpsc::error::SendError<ResponseEvent>> {
    let mut so_far = String::new();
    for word in reply.split_inclusive(' ') {
        tokio::time::sleep(delay).await;
        so_far.push_str(word);
        // Without streaming each update carries the full text.
        let chunk = if stream { word.to_string() } else { so_far.clone() };
        tx.send(ResponseEvent::Delta(chunk)).await?;
    }
    tx.send(ResponseEvent::Done).await
}

impl ResponseProducer for LoopbackProducer {
    fn send_chat_request(&mut self, request: ChatRequest, sink: ResponseSink) {
        let last_user = request
            .messages
            .iter()
            .rev()
            .find(|m| m.sender == Sender::User)
            .map_or("", |m| m.text.as_str());
        let reply = format!("You said: {last_user}");
        tracing::debug!(
            chat_id = %request.chat_id,
            context = request.api_messages().len(),
            "Loopback chat request"
        );
        self.spawn(reply, sink);
    }

    fn send_prompt_request(&mut self, request: PromptRequest, sink: ResponseSink) {
        let reply = format!("[{}] {}", request.prompt, request.input);
        self.spawn(reply, sink);
    }
}
