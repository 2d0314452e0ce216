//! Response handling for the App: start, drain, finish, cancel, timeout.

use std::time::{Instant, SystemTime};

use tokio::sync::mpsc;

use parley_types::{ChatId, NewMessage, NonEmptyString, Surface};

use super::{
    ActiveResponse, App, DEFAULT_RESPONSE_EVENT_BUDGET, Notice, RESPONSE_CHANNEL_CAPACITY,
    ResponseEvent, ResponseSink,
};

impl App {
    /// Start a response owned by `surface` and wire a fresh channel to it.
    ///
    /// A response already in flight is aborted and dropped without running
    /// its completion.
    pub(crate) fn begin_turn(&mut self, surface: Surface, chat_id: Option<ChatId>) -> ResponseSink {
        if let Some(previous) = self.active.take() {
            tracing::debug!(
                previous = previous.surface.as_str(),
                "Discarding preempted response"
            );
        }
        let registration = self.turn.begin_response(surface, Instant::now());
        let (tx, rx) = mpsc::channel(RESPONSE_CHANNEL_CAPACITY);
        self.active = Some(ActiveResponse {
            rx,
            surface,
            chat_id,
        });
        tracing::debug!(surface = surface.as_str(), "Response started");
        ResponseSink::new(tx, registration)
    }

    /// Apply pending response events, at most
    /// [`DEFAULT_RESPONSE_EVENT_BUDGET`] per call.
    pub fn process_response_events(&mut self) {
        let Some(active) = self.active.as_mut() else {
            return;
        };

        let mut processed = 0usize;
        let mut finished: Option<Option<String>> = None;

        while processed < DEFAULT_RESPONSE_EVENT_BUDGET {
            let event = match active.rx.try_recv() {
                Ok(event) => event,
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    tracing::warn!("Response channel disconnected");
                    ResponseEvent::Error("response stream disconnected".to_string())
                }
            };
            processed += 1;

            match event {
                ResponseEvent::Delta(chunk) => {
                    self.turn.append_or_replace(&chunk, Instant::now());
                }
                ResponseEvent::Done => {
                    finished = Some(None);
                    break;
                }
                ResponseEvent::Error(err) => {
                    finished = Some(Some(err));
                    break;
                }
            }
        }

        if processed > 0 && self.turn.action_id() == Some(Surface::ChatAction) {
            self.mirror_answer_into_main_input();
        }

        if let Some(error) = finished {
            self.finish_response(error);
        }
    }

    /// Stop the in-flight response. Content received so far is kept and the
    /// owning surface completes as if the response had ended.
    pub fn cancel_response(&mut self) -> bool {
        let Some(active) = self.active.take() else {
            return false;
        };
        self.turn.cancel();
        tracing::info!(
            surface = active.surface.as_str(),
            received = self.turn.answer().len(),
            "Response cancelled"
        );
        self.complete_turn(&active);
        true
    }

    fn finish_response(&mut self, error: Option<String>) {
        let Some(active) = self.active.take() else {
            return;
        };
        self.turn.end_response();

        match error {
            Some(detail) => {
                tracing::warn!(surface = active.surface.as_str(), "Response failed: {detail}");
                self.push_notification(&Notice::ResponseFailed { detail });
            }
            None => tracing::debug!(surface = active.surface.as_str(), "Response completed"),
        }
        self.complete_turn(&active);
    }

    pub(crate) fn check_response_timeout(&mut self, now: Instant) {
        let timeout = self.settings.response_timeout;
        let Some(idle) = self.turn.idle_for(now) else {
            return;
        };
        if idle < timeout {
            return;
        }
        let Some(active) = self.active.take() else {
            return;
        };

        self.turn.cancel();
        tracing::warn!(
            surface = active.surface.as_str(),
            idle_secs = idle.as_secs(),
            "Response timed out"
        );
        self.push_notification(&Notice::ResponseTimedOut {
            secs: timeout.as_secs(),
        });
        self.complete_turn(&active);
    }

    /// Per-surface completion once the turn is idle again.
    fn complete_turn(&mut self, active: &ActiveResponse) {
        match active.surface {
            Surface::MainChat => {
                if let Some(chat_id) = active.chat_id {
                    self.commit_answer(chat_id);
                }
            }
            Surface::ChatAction => {
                self.mirror_answer_into_main_input();
                self.turn.clear_action_id();
                self.main_input.request_focus();
            }
            Surface::PromptPanel => {}
        }
    }

    fn mirror_answer_into_main_input(&mut self) {
        self.main_input.set_text(self.turn.answer());
        self.update_input_tokens();
    }

    /// Persist the finished answer to the chat the request was sent from.
    fn commit_answer(&mut self, chat_id: ChatId) {
        let Ok(text) = NonEmptyString::new(self.turn.answer()) else {
            tracing::debug!(chat_id = %chat_id, "Empty answer, nothing to commit");
            return;
        };

        let message = NewMessage::assistant(chat_id, text, SystemTime::now());
        match self.store.create_message(message) {
            Ok(message) => {
                if self.chat.publish_message(message) {
                    self.trim_window();
                }
            }
            Err(e) => {
                tracing::warn!(chat_id = %chat_id, "Failed to persist answer: {e}");
                self.push_notification(&Notice::MessageNotSaved {
                    detail: e.to_string(),
                });
            }
        }
    }
}
