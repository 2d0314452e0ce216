//! Turn State Store: whether a response is streaming and what has arrived.

use std::time::{Duration, Instant};

use futures_util::future::{AbortHandle, AbortRegistration};
use parley_types::Surface;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurnPhase {
    #[default]
    Idle,
    Responding,
}

/// Append-only text buffer for the answer of the current turn.
///
/// Only [`TurnState`] mutates it; everything else sees `&str`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswerBuffer(String);

impl AnswerBuffer {
    fn push(&mut self, chunk: &str) {
        self.0.push_str(chunk);
    }

    fn replace(&mut self, text: &str) {
        self.0.clear();
        self.0.push_str(text);
    }

    fn clear(&mut self) {
        self.0.clear();
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Transitions: `Idle -> Responding -> Idle`. Beginning while already
/// responding aborts the previous producer and starts fresh.
#[derive(Debug)]
pub struct TurnState {
    phase: TurnPhase,
    answer: AnswerBuffer,
    action_id: Option<Surface>,
    stream_enabled: bool,
    abort: Option<AbortHandle>,
    last_event: Option<Instant>,
}

impl TurnState {
    #[must_use]
    pub fn new(stream_enabled: bool) -> Self {
        Self {
            phase: TurnPhase::Idle,
            answer: AnswerBuffer::default(),
            action_id: None,
            stream_enabled,
            abort: None,
            last_event: None,
        }
    }

    /// Start a response owned by `surface`.
    ///
    /// Clears the answer and returns the registration the producer must
    /// honour so that [`TurnState::cancel`] can stop it.
    pub fn begin_response(&mut self, surface: Surface, now: Instant) -> AbortRegistration {
        if let Some(previous) = self.action_id
            && self.is_responding()
        {
            tracing::debug!(
                previous = previous.as_str(),
                next = surface.as_str(),
                "Preempting in-flight response"
            );
        }
        if let Some(handle) = self.abort.take() {
            handle.abort();
        }

        let (handle, registration) = AbortHandle::new_pair();
        self.phase = TurnPhase::Responding;
        self.answer.clear();
        self.action_id = Some(surface);
        self.abort = Some(handle);
        self.last_event = Some(now);
        registration
    }

    /// Apply a chunk: appended in streaming mode, replacing otherwise.
    ///
    /// Returns `false` and leaves the answer untouched when idle, so chunks
    /// that race a cancellation are dropped.
    pub fn append_or_replace(&mut self, chunk: &str, now: Instant) -> bool {
        if !self.is_responding() {
            tracing::trace!(len = chunk.len(), "Dropping chunk received while idle");
            return false;
        }
        if self.stream_enabled {
            self.answer.push(chunk);
        } else {
            self.answer.replace(chunk);
        }
        self.last_event = Some(now);
        true
    }

    /// Natural completion. The answer stays visible.
    ///
    /// Returns whether a response was in flight.
    pub fn end_response(&mut self) -> bool {
        let was_responding = self.is_responding();
        self.phase = TurnPhase::Idle;
        self.abort = None;
        self.last_event = None;
        was_responding
    }

    /// Stop locally and signal the producer. Content so far is kept.
    pub fn cancel(&mut self) -> bool {
        if let Some(handle) = self.abort.take() {
            handle.abort();
        }
        self.end_response()
    }

    #[must_use]
    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    #[must_use]
    pub fn is_responding(&self) -> bool {
        self.phase == TurnPhase::Responding
    }

    #[must_use]
    pub fn is_responding_for(&self, surface: Surface) -> bool {
        self.is_responding() && self.action_id == Some(surface)
    }

    #[must_use]
    pub fn answer(&self) -> &str {
        self.answer.as_str()
    }

    pub fn clear_answer(&mut self) {
        self.answer.clear();
    }

    #[must_use]
    pub fn action_id(&self) -> Option<Surface> {
        self.action_id
    }

    pub fn clear_action_id(&mut self) {
        self.action_id = None;
    }

    #[must_use]
    pub fn stream_enabled(&self) -> bool {
        self.stream_enabled
    }

    /// Time since the last event of the in-flight response.
    #[must_use]
    pub fn idle_for(&self, now: Instant) -> Option<Duration> {
        if !self.is_responding() {
            return None;
        }
        self.last_event.map(|at| now.saturating_duration_since(at))
    }
}

#[cfg(test)]
mod tests {
    use futures_util::future::Abortable;

    use super::*;

    #[test]
    fn streaming_appends_in_order() {
        let now = Instant::now();
        let mut turn = TurnState::new(true);
        let _reg = turn.begin_response(Surface::MainChat, now);

        for chunk in ["Hel", "lo, ", "world"] {
            assert!(turn.append_or_replace(chunk, now));
        }
        assert_eq!(turn.answer(), "Hello, world");
    }

    #[test]
    fn non_streaming_replaces() {
        let now = Instant::now();
        let mut turn = TurnState::new(false);
        let _reg = turn.begin_response(Surface::PromptPanel, now);

        turn.append_or_replace("draft", now);
        turn.append_or_replace("final answer", now);
        assert_eq!(turn.answer(), "final answer");
    }

    #[test]
    fn begin_clears_previous_answer() {
        let now = Instant::now();
        let mut turn = TurnState::new(true);
        let _reg = turn.begin_response(Surface::MainChat, now);
        turn.append_or_replace("old", now);
        turn.end_response();
        assert_eq!(turn.answer(), "old");

        let _reg = turn.begin_response(Surface::ChatAction, now);
        assert_eq!(turn.answer(), "");
        assert_eq!(turn.action_id(), Some(Surface::ChatAction));
    }

    #[test]
    fn chunk_after_cancel_is_dropped() {
        let now = Instant::now();
        let mut turn = TurnState::new(true);
        let _reg = turn.begin_response(Surface::MainChat, now);
        turn.append_or_replace("partial", now);

        assert!(turn.cancel());
        assert!(!turn.append_or_replace(" late", now));
        assert_eq!(turn.answer(), "partial");
        assert_eq!(turn.phase(), TurnPhase::Idle);
    }

    #[test]
    fn end_when_idle_reports_false() {
        let mut turn = TurnState::new(true);
        assert!(!turn.end_response());
        assert!(!turn.cancel());
    }

    #[tokio::test]
    async fn cancel_aborts_the_producer() {
        let mut turn = TurnState::new(true);
        let registration = turn.begin_response(Surface::MainChat, Instant::now());
        let producer = Abortable::new(std::future::pending::<()>(), registration);

        turn.cancel();
        assert!(producer.await.is_err());
    }

    #[tokio::test]
    async fn restart_aborts_the_previous_producer() {
        let now = Instant::now();
        let mut turn = TurnState::new(true);
        let first = turn.begin_response(Surface::PromptPanel, now);
        let first = Abortable::new(std::future::pending::<()>(), first);

        let _second = turn.begin_response(Surface::MainChat, now);
        assert!(first.await.is_err());
        assert!(turn.is_responding_for(Surface::MainChat));
        assert!(!turn.is_responding_for(Surface::PromptPanel));
    }

    #[test]
    fn idle_for_tracks_last_event() {
        let start = Instant::now();
        let mut turn = TurnState::new(true);
        assert_eq!(turn.idle_for(start), None);

        let _reg = turn.begin_response(Surface::MainChat, start);
        let later = start + Duration::from_secs(3);
        assert_eq!(turn.idle_for(later), Some(Duration::from_secs(3)));

        turn.append_or_replace("x", later);
        assert_eq!(
            turn.idle_for(later + Duration::from_secs(1)),
            Some(Duration::from_secs(1))
        );
    }
}
