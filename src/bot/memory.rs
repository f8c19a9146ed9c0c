//! Bounded per-user conversation memory.

use crate::llm::{Message, Role};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct UserMemory {
    system: Option<String>,
    history: VecDeque<Message>,
}

/// Per-user message history with a fixed context window.
///
/// The materialized context is the system prompt followed by the last
/// `window` turn pairs. Older turns are dropped, never summarized.
pub struct ConversationMemory {
    default_system: String,
    window: usize,
    users: Mutex<HashMap<String, UserMemory>>,
}

impl ConversationMemory {
    /// Creates a memory with the given default system prompt and
    /// window size in turn pairs.
    #[must_use]
    pub fn new(default_system: impl Into<String>, window: usize) -> Self {
        Self {
            default_system: default_system.into(),
            window,
            users: Mutex::new(HashMap::new()),
        }
    }

    fn lock_users(&self) -> MutexGuard<'_, HashMap<String, UserMemory>> {
        self.users.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends one turn and trims the history to the window.
    pub fn append(&self, user_id: &str, role: Role, content: impl Into<String>) {
        let mut users = self.lock_users();
        let entry = users.entry(user_id.to_string()).or_default();
        entry.history.push_back(Message::new(role, content));
        while entry.history.len() > self.window * 2 {
            entry.history.pop_front();
        }
    }

    /// Materializes the context to send upstream. Never mutates.
    #[must_use]
    pub fn get(&self, user_id: &str) -> Vec<Message> {
        let users = self.lock_users();
        let entry = users.get(user_id);
        let system = entry
            .and_then(|memory| memory.system.clone())
            .unwrap_or_else(|| self.default_system.clone());

        let mut context = vec![Message::system(system)];
        if let Some(memory) = entry {
            context.extend(memory.history.iter().cloned());
        }
        context
    }

    /// Replaces the user's system prompt.
    pub fn change_system_message(&self, user_id: &str, text: impl Into<String>) {
        let mut users = self.lock_users();
        users.entry(user_id.to_string()).or_default().system = Some(text.into());
    }

    /// Restores the global default system prompt for the user.
    pub fn reset_system_message(&self, user_id: &str) {
        let mut users = self.lock_users();
        users.entry(user_id.to_string()).or_default().system = None;
    }

    /// Clears the user's history. The system prompt is kept.
    pub fn remove(&self, user_id: &str) {
        let mut users = self.lock_users();
        if let Some(memory) = users.get_mut(user_id) {
            memory.history.clear();
        }
    }
}
