//! End-to-end turn lifecycle against the in-memory store.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use parley_context::pinned_messages;
use parley_engine::{
    App, ChatRequest, ChatStore, KeyInput, NewPrompt, PromptRequest, ResponseEvent,
    ResponseProducer, ResponseSink, SendOutcome, Settings, Surface, WARNING_DISPLAY, WarningState,
};
use parley_store::{MemoryStore, StoreOp};
use parley_types::{ChatId, Sender};
use tokio::sync::mpsc;

#[derive(Debug, Default)]
struct Recorded {
    chat_requests: Vec<ChatRequest>,
    prompt_requests: Vec<PromptRequest>,
    senders: Vec<mpsc::Sender<ResponseEvent>>,
}

#[derive(Debug, Clone, Default)]
struct RecordingProducer {
    recorded: Arc<Mutex<Recorded>>,
}

impl RecordingProducer {
    fn sender(&self) -> mpsc::Sender<ResponseEvent> {
        self.recorded
            .lock()
            .unwrap()
            .senders
            .last()
            .cloned()
            .expect("a request was dispatched")
    }

    fn last_chat_request(&self) -> ChatRequest {
        self.recorded
            .lock()
            .unwrap()
            .chat_requests
            .last()
            .cloned()
            .expect("a chat request was dispatched")
    }

    fn last_prompt_request(&self) -> PromptRequest {
        self.recorded
            .lock()
            .unwrap()
            .prompt_requests
            .last()
            .cloned()
            .expect("a prompt request was dispatched")
    }

    fn request_count(&self) -> usize {
        let recorded = self.recorded.lock().unwrap();
        recorded.chat_requests.len() + recorded.prompt_requests.len()
    }
}

impl ResponseProducer for RecordingProducer {
    fn send_chat_request(&mut self, request: ChatRequest, sink: ResponseSink) {
        let (tx, _registration) = sink.into_parts();
        let mut recorded = self.recorded.lock().unwrap();
        recorded.chat_requests.push(request);
        recorded.senders.push(tx);
    }

    fn send_prompt_request(&mut self, request: PromptRequest, sink: ResponseSink) {
        let (tx, _registration) = sink.into_parts();
        let mut recorded = self.recorded.lock().unwrap();
        recorded.prompt_requests.push(request);
        recorded.senders.push(tx);
    }
}

struct Harness {
    app: App,
    store: MemoryStore,
    producer: RecordingProducer,
}

impl Harness {
    fn new() -> Self {
        Self::with_settings(Settings::default())
    }

    fn with_settings(settings: Settings) -> Self {
        let store = MemoryStore::new();
        let producer = RecordingProducer::default();
        let app = App::new(
            settings,
            Box::new(store.clone()),
            Box::new(producer.clone()),
        );
        Self {
            app,
            store,
            producer,
        }
    }

    fn send(&mut self, text: &str) -> SendOutcome {
        self.app.set_draft(text);
        self.app.handle_send_message()
    }

    fn stream(&mut self, chunks: &[&str]) {
        let tx = self.producer.sender();
        for chunk in chunks {
            tx.try_send(ResponseEvent::Delta((*chunk).to_string()))
                .unwrap();
        }
        self.app.process_response_events();
    }

    fn finish(&mut self) {
        self.producer.sender().try_send(ResponseEvent::Done).unwrap();
        self.app.process_response_events();
    }

    /// One full user turn with an answer.
    fn exchange(&mut self, text: &str, answer: &str) {
        assert_eq!(self.send(text), SendOutcome::Sent);
        self.stream(&[answer]);
        self.finish();
    }

    fn selected(&self) -> ChatId {
        self.app.chat().selected_id().expect("a chat is selected")
    }
}

#[test]
fn send_persists_one_included_message_and_clears_input() {
    let mut h = Harness::new();

    assert_eq!(h.send("  What is Rust?  "), SendOutcome::Sent);

    assert_eq!(h.store.message_count(), 1);
    let messages = h.app.chat().messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].text, "What is Rust?");
    assert_eq!(messages[0].sender, Sender::User);
    assert!(messages[0].in_prompts);
    assert_eq!(h.app.main_input().text(), "");
    assert_eq!(h.app.chat().input_box_tokens(), 0);
    assert!(h.app.turn().is_responding_for(Surface::MainChat));
}

#[test]
fn empty_input_is_silently_ignored() {
    let mut h = Harness::new();

    assert_eq!(h.send(" \n\t "), SendOutcome::Ignored);

    assert_eq!(h.store.chat_count(), 0);
    assert_eq!(h.producer.request_count(), 0);
    assert_eq!(h.app.chat().warning(), WarningState::None);
}

#[test]
fn over_token_limit_raises_warning_without_side_effects() {
    let mut h = Harness::with_settings(Settings {
        max_tokens: 0,
        ..Settings::default()
    });

    assert_eq!(h.send("hello there"), SendOutcome::TokensLimitExceeded);

    assert_eq!(h.store.chat_count(), 0);
    assert_eq!(h.store.message_count(), 0);
    assert_eq!(h.producer.request_count(), 0);
    assert_eq!(h.app.chat().warning(), WarningState::TokensLimit);
    assert_eq!(h.app.main_input().text(), "hello there");
    assert_eq!(
        h.app.warning_text().as_deref(),
        Some("Operation failed: Exceeding limit!")
    );
}

#[test]
fn warning_clears_after_display_window() {
    let mut h = Harness::with_settings(Settings {
        max_tokens: 0,
        ..Settings::default()
    });
    h.send("hello");
    let raised = Instant::now();

    h.app.tick(raised + WARNING_DISPLAY / 2);
    assert_eq!(h.app.chat().warning(), WarningState::TokensLimit);

    h.app.tick(raised + WARNING_DISPLAY + Duration::from_millis(10));
    assert_eq!(h.app.chat().warning(), WarningState::None);
    assert_eq!(h.app.warning_text(), None);
}

#[test]
fn sending_while_responding_is_a_no_op() {
    let mut h = Harness::new();
    assert_eq!(h.send("first"), SendOutcome::Sent);

    assert_eq!(h.send("second"), SendOutcome::Ignored);

    assert_eq!(h.store.message_count(), 1);
    assert_eq!(h.producer.request_count(), 1);
    assert_eq!(h.app.main_input().text(), "second");
}

#[test]
fn new_chat_is_named_after_first_sentence() {
    let mut h = Harness::new();

    assert_eq!(h.send("Hello, world."), SendOutcome::Sent);

    let chat = h.app.chat().selected_chat().unwrap();
    assert_eq!(chat.name, "Hello");
    assert_eq!(h.app.chat().chats().len(), 1);
    assert_eq!(h.store.chat_count(), 1);

    h.finish();
    h.app.select_chat(None).unwrap();
    assert_eq!(h.send("no terminator here"), SendOutcome::Sent);
    assert_eq!(
        h.app.chat().selected_chat().unwrap().name,
        "no terminator here"
    );
}

#[test]
fn context_contains_new_message_exactly_once() {
    let mut h = Harness::new();
    h.exchange("first question", "first answer");

    assert_eq!(h.send("second question"), SendOutcome::Sent);

    let request = h.producer.last_chat_request();
    let texts: Vec<&str> = request.messages.iter().map(|m| m.text.as_str()).collect();
    assert_eq!(
        texts,
        vec!["first question", "first answer", "second question"]
    );
    assert_eq!(request.chat_id, h.selected());
}

#[test]
fn excluded_messages_are_left_out_of_context() {
    let mut h = Harness::new();
    h.exchange("keep out", "also out");
    let excluded: Vec<_> = h.app.chat().messages().iter().map(|m| m.id).collect();
    for id in excluded {
        assert!(h.app.set_in_prompts(id, false).unwrap());
    }

    assert_eq!(h.send("only me"), SendOutcome::Sent);

    let request = h.producer.last_chat_request();
    assert_eq!(request.messages.len(), 1);
    assert_eq!(request.messages[0].text, "only me");
}

#[test]
fn exclusions_survive_later_turns() {
    let mut h = Harness::new();
    h.exchange("keep out", "also out");
    let excluded: Vec<_> = h.app.chat().messages().iter().map(|m| m.id).collect();
    for id in &excluded {
        assert!(h.app.set_in_prompts(*id, false).unwrap());
    }

    h.exchange("only me", "ok");
    assert_eq!(h.send("third"), SendOutcome::Sent);

    let texts: Vec<String> = h
        .producer
        .last_chat_request()
        .messages
        .iter()
        .map(|m| m.text.clone())
        .collect();
    assert_eq!(texts, vec!["only me", "ok", "third"]);

    let stored = h.store.get_messages(h.selected()).unwrap();
    for message in stored.iter().filter(|m| excluded.contains(&m.id)) {
        assert!(!message.in_prompts, "{} came back", message.text);
    }
}

#[test]
fn committed_messages_trim_oldest_past_limit() {
    let mut h = Harness::new();
    h.exchange("one", "two");
    h.app.set_messages_limit(3).unwrap();

    h.exchange("three", "four");

    let flags: Vec<bool> = h.app.chat().messages().iter().map(|m| m.in_prompts).collect();
    assert_eq!(flags, vec![false, true, true, true]);
    assert_eq!(h.app.statistics().included_count, 3);
}

#[test]
fn streamed_answer_is_committed_as_assistant_message() {
    let mut h = Harness::new();
    assert_eq!(h.send("hi"), SendOutcome::Sent);

    h.stream(&["Hel", "lo", "!"]);
    assert_eq!(h.app.turn().answer(), "Hello!");
    assert!(h.app.is_responding());

    h.finish();
    assert!(!h.app.is_responding());
    assert_eq!(h.app.turn().answer(), "Hello!");

    let last = h.app.chat().messages().last().unwrap();
    assert_eq!(last.sender, Sender::Assistant);
    assert_eq!(last.text, "Hello!");
    assert!(last.in_prompts);
    assert_eq!(h.store.message_count(), 2);
}

#[test]
fn non_streaming_mode_replaces_answer() {
    let mut h = Harness::with_settings(Settings {
        stream_enable: false,
        ..Settings::default()
    });
    assert_eq!(h.send("hi"), SendOutcome::Sent);

    h.stream(&["Hel", "Hello", "Hello!"]);

    assert_eq!(h.app.turn().answer(), "Hello!");
}

#[test]
fn chunks_after_cancel_are_dropped() {
    let mut h = Harness::new();
    assert_eq!(h.send("hi"), SendOutcome::Sent);
    h.stream(&["partial"]);
    let tx = h.producer.sender();

    assert!(h.app.cancel_response());
    assert!(!h.app.is_responding());
    assert!(!h.app.cancel_response());

    assert!(tx.try_send(ResponseEvent::Delta(" more".to_string())).is_err());
    h.app.process_response_events();
    assert_eq!(h.app.turn().answer(), "partial");

    // The partial answer is kept in the transcript.
    let last = h.app.chat().messages().last().unwrap();
    assert_eq!(last.text, "partial");
    assert_eq!(h.send("next"), SendOutcome::Sent);
}

#[test]
fn answer_is_committed_to_originating_chat_after_switch() {
    let mut h = Harness::new();
    h.exchange("chat one", "reply one");
    let first = h.selected();

    h.app.select_chat(None).unwrap();
    assert_eq!(h.send("chat two"), SendOutcome::Sent);
    let second = h.selected();
    h.app.select_chat(Some(first)).unwrap();

    h.stream(&["reply two"]);
    h.finish();

    assert_eq!(h.app.chat().messages().len(), 2);
    let stored = h.store.get_messages(second).unwrap();
    assert_eq!(stored.last().unwrap().text, "reply two");
}

#[test]
fn persistence_failure_keeps_created_chat_and_draft() {
    let mut h = Harness::new();
    h.store.set_failing(StoreOp::CreateMessage, true);

    assert_eq!(h.send("Hello, world."), SendOutcome::PersistFailed);

    assert_eq!(h.store.chat_count(), 1);
    assert_eq!(h.store.message_count(), 0);
    assert!(h.app.chat().selected_id().is_some());
    assert_eq!(h.app.main_input().text(), "Hello, world.");
    assert_eq!(h.producer.request_count(), 0);
    assert!(!h.app.is_responding());
    let notices = h.app.take_notifications();
    assert!(notices[0].starts_with("Message could not be saved"));

    h.store.set_failing(StoreOp::CreateMessage, false);
    assert_eq!(h.app.handle_send_message(), SendOutcome::Sent);
    assert_eq!(h.store.chat_count(), 1);
}

#[test]
fn chat_creation_failure_persists_nothing() {
    let mut h = Harness::new();
    h.store.set_failing(StoreOp::CreateChat, true);

    assert_eq!(h.send("hello"), SendOutcome::PersistFailed);

    assert_eq!(h.store.message_count(), 0);
    assert_eq!(h.app.chat().selected_id(), None);
    assert_eq!(h.producer.request_count(), 0);
}

#[test]
fn zero_token_override_is_distinct_from_unset() {
    let mut h = Harness::new();
    h.exchange("hello", "hi");
    assert_eq!(h.app.effective_limits().tokens(), 4000);

    let chat = h.app.set_tokens_limit(0).unwrap();
    assert_eq!(chat.overrides.tokens_limit, Some(0));
    assert_eq!(h.app.effective_limits().tokens(), 0);
    assert_eq!(h.app.statistics().tokens_limit, 0);

    // Nothing fits in a zero budget.
    assert_eq!(h.app.chat().included_count(), 0);
    assert_eq!(h.send("again"), SendOutcome::TokensLimitExceeded);
}

#[test]
fn messages_limit_change_recalculates_window() {
    let mut h = Harness::new();
    h.exchange("one", "two");
    h.exchange("three", "four");
    assert_eq!(h.app.chat().included_count(), 4);

    h.app.set_messages_limit(2).unwrap();

    let flags: Vec<bool> = h.app.chat().messages().iter().map(|m| m.in_prompts).collect();
    assert_eq!(flags, vec![false, false, true, true]);
    assert_eq!(h.app.statistics().included_count, 2);
    let stored = h.store.get_messages(h.selected()).unwrap();
    assert!(!stored[0].in_prompts);
}

#[test]
fn including_past_messages_limit_warns() {
    let mut h = Harness::new();
    h.exchange("one", "two");
    h.app.set_messages_limit(1).unwrap();
    let first = h.app.chat().messages()[0].id;

    assert!(!h.app.set_in_prompts(first, true).unwrap());

    assert_eq!(h.app.chat().warning(), WarningState::MessagesLimit);
    assert!(!h.app.chat().messages()[0].in_prompts);
}

#[test]
fn pinned_messages_survive_window_and_keep_order() {
    let mut h = Harness::new();
    h.exchange("alpha", "beta");
    h.exchange("gamma", "delta");
    let ids: Vec<_> = h.app.chat().messages().iter().map(|m| m.id).collect();
    assert!(h.app.toggle_pinned(ids[2]).unwrap());
    assert!(h.app.toggle_pinned(ids[0]).unwrap());

    // Both pinned messages count against the limit, leaving room for one more.
    h.app.set_messages_limit(3).unwrap();

    let messages = h.app.chat().messages();
    let pinned: Vec<&str> = pinned_messages(messages)
        .iter()
        .map(|p| p.message.text.as_str())
        .collect();
    assert_eq!(pinned, vec!["alpha", "gamma"]);
    let flags: Vec<bool> = messages.iter().map(|m| m.in_prompts).collect();
    assert_eq!(flags, vec![true, false, true, true]);
}

#[test]
fn prompt_action_rewrites_draft_and_undo_restores_it() {
    let mut h = Harness::new();
    let prompt = h
        .store
        .create_prompt(NewPrompt {
            name: "Translate".to_string(),
            declare: "To French".to_string(),
            prompt: "Translate into French".to_string(),
        })
        .unwrap();
    h.app.set_draft("good morning");

    assert!(h.app.handle_prompt_action(prompt.id).unwrap());
    let request = h.producer.last_prompt_request();
    assert_eq!(request.prompt, "Translate into French");
    assert_eq!(request.input, "good morning");
    assert!(h.app.turn().is_responding_for(Surface::ChatAction));
    assert_eq!(h.send("ignored"), SendOutcome::Ignored);

    h.stream(&["bonjour"]);
    h.finish();

    assert_eq!(h.app.main_input().text(), "bonjour");
    assert_eq!(h.store.message_count(), 0);

    assert!(h.app.undo_prompt_action());
    assert_eq!(h.app.main_input().text(), "good morning");
}

#[test]
fn cancelled_prompt_action_keeps_partial_answer_in_draft() {
    let mut h = Harness::new();
    let prompt = h
        .store
        .create_prompt(NewPrompt {
            name: "Expand".to_string(),
            declare: String::new(),
            prompt: "Expand".to_string(),
        })
        .unwrap();
    h.app.set_draft("short");
    h.app.handle_prompt_action(prompt.id).unwrap();
    h.stream(&["a longer"]);

    h.app.cancel_response();

    assert_eq!(h.app.main_input().text(), "a longer");
    assert_eq!(h.app.turn().action_id(), None);
}

#[test]
fn prompt_panel_selection_and_send() {
    let mut h = Harness::new();
    let first = h
        .app
        .create_prompt(NewPrompt {
            name: "Summarize".to_string(),
            declare: String::new(),
            prompt: "Summarize the input".to_string(),
        })
        .unwrap();
    let second = h
        .app
        .create_prompt(NewPrompt {
            name: "Explain".to_string(),
            declare: String::new(),
            prompt: "Explain the input".to_string(),
        })
        .unwrap();
    assert_eq!(h.app.prompt_panel().prompts().len(), 2);
    assert!(!h.app.send_prompt_panel());

    assert!(h.app.select_prompt(first.id).unwrap());
    assert!(!h.app.select_prompt(first.id).unwrap());
    for c in "long text".chars() {
        h.app.handle_prompt_key(KeyInput::Char(c));
    }
    assert!(h.app.prompt_panel_tokens() > 8);
    assert!(h.app.handle_prompt_key(KeyInput::Enter { shift: false }));
    assert_eq!(h.producer.last_prompt_request().input, "long text");
    h.stream(&["short"]);

    assert!(h.app.select_prompt(second.id).unwrap());
    assert!(!h.app.is_responding());
    assert_eq!(h.app.turn().answer(), "");
    assert_eq!(h.app.prompt_panel().input().text(), "");
}

#[test]
fn main_keys_drive_send() {
    let mut h = Harness::new();
    for c in "hey".chars() {
        assert_eq!(h.app.handle_main_key(KeyInput::Char(c)), None);
    }
    assert!(h.app.chat().input_box_tokens() > 0);

    assert_eq!(h.app.handle_main_key(KeyInput::CompositionStart), None);
    assert_eq!(
        h.app.handle_main_key(KeyInput::Enter { shift: false }),
        None
    );
    h.app.handle_main_key(KeyInput::CompositionEnd);
    h.app.handle_main_key(KeyInput::Backspace);

    assert_eq!(
        h.app.handle_main_key(KeyInput::Enter { shift: false }),
        Some(SendOutcome::Sent)
    );
    assert_eq!(h.app.chat().messages()[0].text, "hey");
}

#[test]
fn settings_panel_updates_selected_chat() {
    let mut h = Harness::new();
    assert!(h.app.set_temperature(0.5).is_err());
    h.exchange("hello", "hi");

    h.app.set_model("gpt-4").unwrap();
    h.app.set_temperature(0.2).unwrap();
    let chat = h.app.chat().selected_chat().unwrap();
    assert_eq!(chat.overrides.model.as_deref(), Some("gpt-4"));

    assert_eq!(h.send("next"), SendOutcome::Sent);
    let request = h.producer.last_chat_request();
    assert_eq!(request.model, "gpt-4");
    assert!((request.temperature - 0.2).abs() < f32::EPSILON);
}
