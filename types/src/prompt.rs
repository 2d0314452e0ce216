//! Saved prompt templates.

use serde::{Deserialize, Serialize};

use crate::ids::PromptId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    pub id: PromptId,
    pub name: String,
    /// Short description shown under the prompt name.
    pub declare: String,
    /// System instruction sent ahead of the user's input.
    pub prompt: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPrompt {
    pub name: String,
    pub declare: String,
    pub prompt: String,
}

impl NewPrompt {
    #[must_use]
    pub fn persisted(self, id: PromptId) -> Prompt {
        Prompt {
            id,
            name: self.name,
            declare: self.declare,
            prompt: self.prompt,
        }
    }
}
