//! Conversation engine: memory, command state, routing and reply
//! composition.

/// Fixed command keywords and parsing
pub mod commands;
/// Outbound payload composition
pub mod composer;
/// Error taxonomy and user-facing failure messages
pub mod error;
/// Message routing and action execution
pub mod handlers;
/// Bounded per-user conversation memory
pub mod memory;
/// Per-user model clients and credential onboarding
pub mod sessions;
/// Consume-once pending command state
pub mod state;
