//! Context window management for chat requests.
//!
//! This crate provides:
//! - Approximate token counting via tiktoken
//! - Effective limit resolution and the Limit Enforcer
//! - Context window recalculation (which trailing messages go into a request)
//! - Pinned-message filtering and chat naming helpers
//!
//! Everything here is synchronous and free of IO.

mod limits;
mod naming;
mod pinned;
mod token_counter;
mod window;

pub use limits::{EffectiveLimits, LimitCheck, LimitDefaults, LimitSource, check_limits};
pub use naming::first_sentence;
pub use pinned::{PinnedMessage, pinned_messages};
pub use token_counter::{MESSAGE_OVERHEAD, TokenCounter};
pub use window::{ContextWindow, prompt_messages};
