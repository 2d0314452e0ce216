//! Limit warning flag with a self-clearing display window.

use std::time::{Duration, Instant};

use parley_types::WarningState;

/// How long a raised warning stays visible.
pub const WARNING_DISPLAY: Duration = Duration::from_millis(2500);

/// The warning shown next to the chat statistics.
///
/// At most one clear is pending at a time: raising again replaces the
/// deadline instead of scheduling a second one.
#[derive(Debug, Default)]
pub struct WarningSurface {
    state: WarningState,
    clear_at: Option<Instant>,
}

impl WarningSurface {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Show `state` and restart the display window. Raising
    /// [`WarningState::None`] clears immediately.
    pub fn raise(&mut self, state: WarningState, now: Instant) {
        self.state = state;
        self.clear_at = state.is_active().then(|| now + WARNING_DISPLAY);
    }

    /// Clear the warning once its window has elapsed.
    ///
    /// Returns `true` if this call cleared it.
    pub fn tick(&mut self, now: Instant) -> bool {
        match self.clear_at {
            Some(deadline) if now >= deadline => {
                self.state = WarningState::None;
                self.clear_at = None;
                true
            }
            _ => false,
        }
    }

    #[must_use]
    pub fn state(&self) -> WarningState {
        self.state
    }

    #[must_use]
    pub fn pending_clear(&self) -> Option<Instant> {
        self.clear_at
    }
}
