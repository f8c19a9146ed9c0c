//! OpenAI provider trait and HTTP implementation.

/// OpenAI v1 REST implementation
pub mod openai;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced by completion providers.
#[derive(Error, Debug)]
pub enum LlmError {
    /// The API answered with an error payload or status.
    #[error("API error: {0}")]
    ApiError(String),
    /// The request never completed.
    #[error("Network error: {0}")]
    NetworkError(String),
    /// The response body could not be parsed.
    #[error("JSON parsing error: {0}")]
    JsonError(String),
}

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Conversation-level instructions.
    System,
    /// The human side of the conversation.
    User,
    /// The model side of the conversation.
    Assistant,
}

/// A single chat message in OpenAI wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Message author.
    pub role: Role,
    /// Message text.
    pub content: String,
}

impl Message {
    /// Creates a message with the given role.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Creates a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Creates a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Creates an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Chat, image and transcription operations backed by one API credential.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Requests a chat completion over the given message window.
    async fn chat_completion(
        &self,
        messages: &[Message],
        model_engine: &str,
    ) -> Result<String, LlmError>;

    /// Generates a single image and returns its URL.
    async fn image_generation(&self, prompt: &str) -> Result<String, LlmError>;

    /// Transcribes an audio clip.
    async fn transcribe_audio(
        &self,
        audio: Vec<u8>,
        filename: &str,
        model_engine: &str,
    ) -> Result<String, LlmError>;

    /// Cheap request that checks whether the credential is accepted.
    async fn validate_credential(&self) -> Result<(), LlmError>;
}
