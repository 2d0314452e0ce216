//! Prompt panel: saved prompt templates applied to their own input box.

use parley_context::MESSAGE_OVERHEAD;
use parley_types::{NewPrompt, Prompt, PromptId, Surface};

use super::{App, InputSession, KeyAction, KeyInput, PromptRequest, StoreError};

#[derive(Debug, Default)]
pub struct PromptPanel {
    prompts: Vec<Prompt>,
    selected: Option<Prompt>,
    input: InputSession,
}

impl PromptPanel {
    #[must_use]
    pub fn prompts(&self) -> &[Prompt] {
        &self.prompts
    }

    #[must_use]
    pub fn selected(&self) -> Option<&Prompt> {
        self.selected.as_ref()
    }

    #[must_use]
    pub fn input(&self) -> &InputSession {
        &self.input
    }
}

impl App {
    pub fn refresh_prompts(&mut self) -> Result<(), StoreError> {
        self.prompt_panel.prompts = self.store.get_all_prompts()?;
        Ok(())
    }

    pub fn create_prompt(&mut self, prompt: NewPrompt) -> Result<Prompt, StoreError> {
        let prompt = self.store.create_prompt(prompt)?;
        tracing::info!(prompt_id = %prompt.id, name = %prompt.name, "Created prompt");
        self.refresh_prompts()?;
        Ok(prompt)
    }

    /// Open a prompt in the panel.
    ///
    /// Re-selecting the open prompt does nothing. Switching stops a panel
    /// response, clears its answer and empties the panel input.
    pub fn select_prompt(&mut self, id: PromptId) -> Result<bool, StoreError> {
        if self.prompt_panel.selected.as_ref().is_some_and(|p| p.id == id) {
            return Ok(false);
        }
        let prompt = self.store.get_prompt_by_id(id)?;

        if self.turn.action_id() == Some(Surface::PromptPanel) {
            self.cancel_response();
            self.turn.clear_answer();
        }
        self.prompt_panel.selected = Some(prompt);
        self.prompt_panel.input.clear();
        self.prompt_panel.input.request_focus();
        Ok(true)
    }

    pub fn prompt_input_mut(&mut self) -> &mut InputSession {
        &mut self.prompt_panel.input
    }

    /// Feed a key to the panel input. Enter sends.
    pub fn handle_prompt_key(&mut self, key: KeyInput) -> bool {
        match self.prompt_panel.input.handle_key(key) {
            KeyAction::Submit => self.send_prompt_panel(),
            KeyAction::None | KeyAction::Edited => false,
        }
    }

    /// Send the panel input with the selected prompt as system message.
    /// The answer stays in the turn for the panel to show.
    pub fn send_prompt_panel(&mut self) -> bool {
        let Some(prompt) = self.prompt_panel.selected.as_ref() else {
            tracing::debug!("Ignoring prompt panel send without a selected prompt");
            return false;
        };
        let request = PromptRequest {
            prompt: prompt.prompt.clone(),
            input: self.prompt_panel.input.text().to_string(),
        };
        let sink = self.begin_turn(Surface::PromptPanel, None);
        self.producer.send_prompt_request(request, sink);
        true
    }

    /// Tokens of the request the panel would send now.
    #[must_use]
    pub fn prompt_panel_tokens(&self) -> u32 {
        let Some(prompt) = self.prompt_panel.selected.as_ref() else {
            return 0;
        };
        self.counter
            .count_str(&prompt.prompt)
            .saturating_add(self.counter.count_str(self.prompt_panel.input.text()))
            .saturating_add(MESSAGE_OVERHEAD * 2)
    }
}
