//! Bot error taxonomy and user-facing messages.

use thiserror::Error;

use crate::fetch::FetchError;
use crate::llm::LlmError;
use crate::storage::StorageError;

/// Reply when no token is registered and no default is configured.
pub const MSG_MISSING_TOKEN: &str =
    "トークンを先に登録してください。/token コマンドから登録できます。";

/// Reply when a submitted token fails validation.
pub const MSG_INVALID_TOKEN: &str = "Token が無効です。/token コマンドからやり直してください。";

/// Reply when a stored token is rejected mid-conversation.
pub const MSG_BAD_API_KEY: &str =
    "OpenAI API Token が正しくありません。/token コマンドから登録し直してください。";

/// Reply when the model is overloaded.
pub const MSG_OVERLOADED: &str = "同時使用人数を超えました。しばらく待ってからお試しください。";

/// Reply when a page or transcript yields no text.
pub const MSG_EMPTY_CONTENT: &str = "このサイトからテキストを取得できませんでした。";

/// Reply for transport-level failures against the API.
pub const MSG_API_UNSTABLE: &str =
    "OpenAI API システムが不安定なため、後で再試行してください。";

/// Upstream message prefix for rejected API keys.
pub const PREFIX_BAD_API_KEY: &str = "Incorrect API key provided";

/// Upstream message prefix for capacity errors.
pub const PREFIX_OVERLOADED: &str = "That model is currently overloaded with other requests.";

/// Failures a message-handling turn can end in.
#[derive(Error, Debug)]
pub enum BotError {
    /// The user has no credential and no default token exists.
    #[error("no API token registered")]
    MissingCredential,
    /// A submitted token failed validation.
    #[error("API token failed validation")]
    InvalidCredential,
    /// The upstream API answered with an error.
    #[error("upstream API error: {0}")]
    Upstream(String),
    /// Content extraction produced no text.
    #[error("no text content extracted")]
    EmptyContent,
}

impl BotError {
    /// The reply text shown to the user for this error.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::MissingCredential => MSG_MISSING_TOKEN.to_string(),
            Self::InvalidCredential => MSG_INVALID_TOKEN.to_string(),
            Self::EmptyContent => MSG_EMPTY_CONTENT.to_string(),
            Self::Upstream(message) => {
                if message.starts_with(PREFIX_BAD_API_KEY) {
                    MSG_BAD_API_KEY.to_string()
                } else if message.starts_with(PREFIX_OVERLOADED) {
                    MSG_OVERLOADED.to_string()
                } else {
                    message.clone()
                }
            }
        }
    }

    /// Whether this failure invalidates the user's conversation window.
    #[must_use]
    pub fn clears_memory(&self) -> bool {
        matches!(self, Self::Upstream(_))
    }
}

impl From<LlmError> for BotError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::ApiError(message) => Self::Upstream(message),
            LlmError::NetworkError(_) | LlmError::JsonError(_) => {
                Self::Upstream(MSG_API_UNSTABLE.to_string())
            }
        }
    }
}

impl From<FetchError> for BotError {
    fn from(_: FetchError) -> Self {
        Self::EmptyContent
    }
}

impl From<StorageError> for BotError {
    fn from(err: StorageError) -> Self {
        Self::Upstream(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_errors_have_fixed_messages() {
        assert_eq!(BotError::MissingCredential.user_message(), MSG_MISSING_TOKEN);
        assert_eq!(BotError::InvalidCredential.user_message(), MSG_INVALID_TOKEN);
        assert_eq!(BotError::EmptyContent.user_message(), MSG_EMPTY_CONTENT);
    }

    #[test]
    fn test_bad_api_key_prefix_maps_to_token_help() {
        let err = BotError::Upstream(format!("{PREFIX_BAD_API_KEY}: sk-aaaa. You can find..."));
        assert_eq!(err.user_message(), MSG_BAD_API_KEY);
    }

    #[test]
    fn test_overloaded_prefix_maps_to_wait_message() {
        let err = BotError::Upstream(format!("{PREFIX_OVERLOADED} Please retry."));
        assert_eq!(err.user_message(), MSG_OVERLOADED);
    }

    #[test]
    fn test_other_upstream_messages_pass_through() {
        let err = BotError::Upstream("Rate limit reached for requests".to_string());
        assert_eq!(err.user_message(), "Rate limit reached for requests");
    }

    #[test]
    fn test_only_upstream_clears_memory() {
        assert!(BotError::Upstream(String::new()).clears_memory());
        assert!(!BotError::MissingCredential.clears_memory());
        assert!(!BotError::InvalidCredential.clears_memory());
        assert!(!BotError::EmptyContent.clears_memory());
    }

    #[test]
    fn test_network_failure_becomes_unstable_message() {
        let err = BotError::from(LlmError::NetworkError("connection reset".to_string()));
        assert_eq!(err.user_message(), MSG_API_UNSTABLE);
        assert!(err.clears_memory());
    }

    #[test]
    fn test_fetch_failure_becomes_empty_content() {
        let err = BotError::from(FetchError::Http("503".to_string()));
        assert_eq!(err.user_message(), MSG_EMPTY_CONTENT);
        assert!(!err.clears_memory());
    }
}
