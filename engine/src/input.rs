//! Input surfaces: draft editing, IME composition and the undo snapshot.

use unicode_segmentation::UnicodeSegmentation;

/// Handles text editing with proper Unicode grapheme cluster support.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DraftInput {
    text: String,
    cursor: usize,
}

impl DraftInput {
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn move_cursor_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_cursor_right(&mut self) {
        let cursor_moved_right = self.cursor.saturating_add(1);
        self.cursor = self.clamp_cursor(cursor_moved_right);
    }

    pub fn enter_char(&mut self, new_char: char) {
        let index = self.byte_index();
        self.text.insert(index, new_char);
        self.move_cursor_right();
    }

    pub fn enter_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let index = self.byte_index();
        self.text.insert_str(index, text);
        let inserted = text.graphemes(true).count();
        self.cursor = self.clamp_cursor(self.cursor.saturating_add(inserted));
    }

    pub fn delete_char(&mut self) {
        if self.cursor == 0 {
            return;
        }

        let start = self.byte_index_at(self.cursor - 1);
        let end = self.byte_index_at(self.cursor);
        self.text.replace_range(start..end, "");
        self.move_cursor_left();
    }

    pub fn delete_char_forward(&mut self) {
        if self.cursor >= self.grapheme_count() {
            return;
        }

        let start = self.byte_index_at(self.cursor);
        let end = self.byte_index_at(self.cursor + 1);
        self.text.replace_range(start..end, "");
    }

    pub fn reset_cursor(&mut self) {
        self.cursor = 0;
    }

    pub fn move_cursor_end(&mut self) {
        self.cursor = self.grapheme_count();
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.cursor = 0;
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.cursor = self.grapheme_count();
    }

    #[must_use]
    pub fn grapheme_count(&self) -> usize {
        self.text.graphemes(true).count()
    }

    fn byte_index(&self) -> usize {
        self.byte_index_at(self.cursor)
    }

    fn byte_index_at(&self, grapheme_index: usize) -> usize {
        self.text
            .grapheme_indices(true)
            .nth(grapheme_index)
            .map_or(self.text.len(), |(i, _)| i)
    }

    fn clamp_cursor(&self, new_cursor_pos: usize) -> usize {
        new_cursor_pos.min(self.grapheme_count())
    }
}

/// A key event delivered to an input surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyInput {
    Char(char),
    Enter { shift: bool },
    Backspace,
    Delete,
    Left,
    Right,
    Home,
    End,
    Paste(String),
    CompositionStart,
    CompositionEnd,
}

/// What the key did to the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    /// Nothing visible changed.
    None,
    /// The draft text changed.
    Edited,
    /// Enter confirmed the draft; the owner should submit it.
    Submit,
}

/// State owned by one input box.
///
/// Each surface gets its own session so composition state and the undo
/// snapshot never leak between simultaneous inputs.
#[derive(Debug, Default, Clone)]
pub struct InputSession {
    draft: DraftInput,
    composing: bool,
    history: Option<String>,
    focus_requested: bool,
}

impl InputSession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle_key(&mut self, key: KeyInput) -> KeyAction {
        match key {
            KeyInput::CompositionStart => {
                self.composing = true;
                KeyAction::None
            }
            KeyInput::CompositionEnd => {
                self.composing = false;
                KeyAction::None
            }
            // While an IME is composing, Enter commits the candidate rather
            // than the message.
            KeyInput::Enter { shift: false } if !self.composing => KeyAction::Submit,
            KeyInput::Enter { .. } => {
                self.draft.enter_char('\n');
                KeyAction::Edited
            }
            KeyInput::Char(c) => {
                self.draft.enter_char(c);
                KeyAction::Edited
            }
            KeyInput::Paste(text) => {
                self.draft.enter_text(&text);
                KeyAction::Edited
            }
            KeyInput::Backspace => {
                let before = self.draft.grapheme_count();
                self.draft.delete_char();
                edited_if(self.draft.grapheme_count() != before)
            }
            KeyInput::Delete => {
                let before = self.draft.grapheme_count();
                self.draft.delete_char_forward();
                edited_if(self.draft.grapheme_count() != before)
            }
            KeyInput::Left => {
                self.draft.move_cursor_left();
                KeyAction::None
            }
            KeyInput::Right => {
                self.draft.move_cursor_right();
                KeyAction::None
            }
            KeyInput::Home => {
                self.draft.reset_cursor();
                KeyAction::None
            }
            KeyInput::End => {
                self.draft.move_cursor_end();
                KeyAction::None
            }
        }
    }

    #[must_use]
    pub fn text(&self) -> &str {
        self.draft.text()
    }

    #[must_use]
    pub fn draft(&self) -> &DraftInput {
        &self.draft
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.draft.set_text(text);
    }

    pub fn clear(&mut self) {
        self.draft.clear();
    }

    #[must_use]
    pub fn is_composing(&self) -> bool {
        self.composing
    }

    /// Remember the current draft so it can be restored later.
    /// Only the most recent snapshot is kept.
    pub fn snapshot_history(&mut self) {
        self.history = Some(self.draft.text().to_string());
    }

    #[must_use]
    pub fn history(&self) -> Option<&str> {
        self.history.as_deref()
    }

    /// Put the snapshot back into the draft. The snapshot stays available.
    pub fn restore_history(&mut self) -> bool {
        match &self.history {
            Some(text) => {
                self.draft.set_text(text.clone());
                true
            }
            None => false,
        }
    }

    pub fn request_focus(&mut self) {
        self.focus_requested = true;
    }

    /// Consume a pending focus request.
    pub fn take_focus_request(&mut self) -> bool {
        std::mem::take(&mut self.focus_requested)
    }
}

fn edited_if(changed: bool) -> KeyAction {
    if changed {
        KeyAction::Edited
    } else {
        KeyAction::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn type_text(session: &mut InputSession, text: &str) {
        for c in text.chars() {
            session.handle_key(KeyInput::Char(c));
        }
    }

    #[test]
    fn enter_submits_and_shift_enter_breaks_line() {
        let mut session = InputSession::new();
        type_text(&mut session, "hi");
        assert_eq!(
            session.handle_key(KeyInput::Enter { shift: true }),
            KeyAction::Edited
        );
        assert_eq!(session.text(), "hi\n");
        assert_eq!(
            session.handle_key(KeyInput::Enter { shift: false }),
            KeyAction::Submit
        );
        assert_eq!(session.text(), "hi\n");
    }

    #[test]
    fn enter_during_composition_does_not_submit() {
        let mut session = InputSession::new();
        session.handle_key(KeyInput::CompositionStart);
        assert!(session.is_composing());
        assert_ne!(
            session.handle_key(KeyInput::Enter { shift: false }),
            KeyAction::Submit
        );
        session.handle_key(KeyInput::CompositionEnd);
        assert_eq!(
            session.handle_key(KeyInput::Enter { shift: false }),
            KeyAction::Submit
        );
    }

    #[test]
    fn sessions_do_not_share_composition_state() {
        let mut main = InputSession::new();
        let mut panel = InputSession::new();
        main.handle_key(KeyInput::CompositionStart);
        assert_eq!(
            panel.handle_key(KeyInput::Enter { shift: false }),
            KeyAction::Submit
        );
    }

    #[test]
    fn history_keeps_single_latest_snapshot() {
        let mut session = InputSession::new();
        assert!(!session.restore_history());

        session.set_text("first");
        session.snapshot_history();
        session.set_text("second");
        session.snapshot_history();
        session.set_text("answer");

        assert!(session.restore_history());
        assert_eq!(session.text(), "second");
        assert_eq!(session.history(), Some("second"));
    }

    #[test]
    fn backspace_handles_graphemes() {
        let mut session = InputSession::new();
        session.handle_key(KeyInput::Paste("ae\u{301}".to_string()));
        assert_eq!(session.draft().grapheme_count(), 2);
        assert_eq!(session.handle_key(KeyInput::Backspace), KeyAction::Edited);
        assert_eq!(session.text(), "a");

        session.handle_key(KeyInput::Home);
        assert_eq!(session.handle_key(KeyInput::Backspace), KeyAction::None);
    }

    #[test]
    fn focus_request_is_consumed_once() {
        let mut session = InputSession::new();
        session.request_focus();
        assert!(session.take_focus_request());
        assert!(!session.take_focus_request());
    }
}
