//! Consume-once pending command state.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// A command whose argument arrives in the user's next message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PendingCommand {
    /// Nothing armed; the next message is ordinary chat.
    #[default]
    None,
    /// The next message is an API token to register.
    AwaitingToken,
    /// The next message replaces the user's system prompt.
    AwaitingSystemPrompt,
    /// The next message is an image generation prompt.
    AwaitingImagePrompt,
    /// The next message is a URL to summarize.
    AwaitingSummarizeUrl,
}

/// Per-user pending command flags.
///
/// Reading pops: the flag is returned and reset in one locked step, so
/// an armed command can never trigger twice.
#[derive(Default)]
pub struct CommandState {
    pending: Mutex<HashMap<String, PendingCommand>>,
}

impl CommandState {
    /// Creates an empty state store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_pending(&self) -> MutexGuard<'_, HashMap<String, PendingCommand>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Arms a pending command for the user, replacing any previous one.
    pub fn arm(&self, user_id: &str, command: PendingCommand) {
        self.lock_pending().insert(user_id.to_string(), command);
    }

    /// Returns the user's pending command and atomically resets it.
    pub fn pop(&self, user_id: &str) -> PendingCommand {
        self.lock_pending()
            .get_mut(user_id)
            .map_or(PendingCommand::None, std::mem::take)
    }
}
