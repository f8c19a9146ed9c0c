//! LINE Messaging API integration.

/// Reply API client
pub mod client;
/// Webhook event envelope and classification
pub mod events;
/// Webhook signature verification
pub mod signature;
