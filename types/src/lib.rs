//! Core domain types for Parley.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the application.

mod chat;
mod ids;
mod message;
mod prompt;
mod proofs;
mod surface;

pub use chat::{Chat, ChatField, ChatOverrides, DEFAULT_MODEL, DEFAULT_TEMPERATURE, NewChat};
pub use ids::{ChatId, MessageId, PromptId};
pub use message::{Message, NewMessage, Sender};
pub use prompt::{NewPrompt, Prompt};
pub use proofs::{EmptyStringError, NonEmptyString};
pub use surface::{Surface, WarningState};
