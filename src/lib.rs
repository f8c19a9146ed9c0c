//! LINE Messaging API bot backed by the OpenAI API.
//!
//! The crate wires a signed LINE webhook into a per-user conversation
//! engine: bounded chat memory, a consume-once command state machine,
//! per-user OpenAI credentials persisted to file or R2 storage, and
//! content summarization for web pages and YouTube videos.

/// Conversation engine: memory, command state, routing and reply composition
pub mod bot;
/// Application settings loaded from config files and environment
pub mod config;
/// Content fetchers for website and YouTube summarization
pub mod fetch;
/// LINE Messaging API integration: signature check, events, reply client
pub mod line;
/// OpenAI provider trait and HTTP implementation
pub mod llm;
/// Axum webhook server wiring
pub mod server;
/// Credential persistence backends (local file and Cloudflare R2)
pub mod storage;
/// Small parsing helpers shared across modules
pub mod utils;
