//! User-visible notifications.
//!
//! The engine never prints. Anything the user should see outside the message
//! list is queued here and drained by the front end.

use std::collections::VecDeque;

/// Upper bound on undrained notifications; the oldest are dropped first.
pub const MAX_PENDING_NOTIFICATIONS: usize = 32;

/// Queue for pending notifications.
#[derive(Debug, Default)]
pub struct NotificationQueue {
    pending: VecDeque<String>,
}

impl NotificationQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a notification to the queue.
    ///
    /// A notification identical to one still pending is dropped.
    pub fn push(&mut self, notification: String) {
        if self.pending.contains(&notification) {
            return;
        }
        if self.pending.len() == MAX_PENDING_NOTIFICATIONS {
            self.pending.pop_front();
        }
        self.pending.push_back(notification);
    }

    /// Take all pending notifications, clearing the queue.
    ///
    /// Returns the notifications in the order they were added.
    pub fn take(&mut self) -> Vec<String> {
        self.pending.drain(..).collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }
}
