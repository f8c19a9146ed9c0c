//! LINE reply API client.

use crate::bot::composer::{Chip, Outbound};
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

const LINE_API_BASE: &str = "https://api.line.me";
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors from the LINE Messaging API.
#[derive(Error, Debug)]
pub enum LineError {
    /// The request never completed.
    #[error("LINE request failed: {0}")]
    Network(String),
    /// The API rejected the reply.
    #[error("LINE API error {status}: {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body text.
        body: String,
    },
}

/// Reply API client bound to one channel access token.
pub struct LineClient {
    http: reqwest::Client,
    access_token: String,
}

impl LineClient {
    /// Creates a client for the given channel access token.
    #[must_use]
    pub fn new(access_token: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http,
            access_token: access_token.into(),
        }
    }

    /// Sends reply messages for one reply token.
    ///
    /// Reply tokens are single use, so a failed reply is reported but
    /// never retried.
    ///
    /// # Errors
    ///
    /// Returns `LineError` when the request fails or the API answers
    /// with a non-success status.
    pub async fn reply(&self, reply_token: &str, messages: &[Outbound]) -> Result<(), LineError> {
        let body = json!({
            "replyToken": reply_token,
            "messages": messages.iter().map(to_line_message).collect::<Vec<_>>(),
        });
        debug!("Replying with {} message(s)", messages.len());

        let response = self
            .http
            .post(format!("{LINE_API_BASE}/v2/bot/message/reply"))
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| LineError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LineError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

/// Converts an outbound payload to LINE message JSON.
#[must_use]
pub fn to_line_message(message: &Outbound) -> Value {
    let (mut value, chips) = match message {
        Outbound::Text { text, chips } => (json!({ "type": "text", "text": text }), chips),
        Outbound::Image {
            original_url,
            preview_url,
            chips,
        } => (
            json!({
                "type": "image",
                "originalContentUrl": original_url,
                "previewImageUrl": preview_url,
            }),
            chips,
        ),
    };

    if !chips.is_empty() {
        let items = chips.iter().map(quick_reply_item).collect::<Vec<_>>();
        value["quickReply"] = json!({ "items": items });
    }
    value
}

fn quick_reply_item(chip: &Chip) -> Value {
    json!({
        "type": "action",
        "action": {
            "type": "message",
            "label": chip.label,
            "text": chip.text,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::composer;

    #[test]
    fn test_text_message_without_chips() {
        let value = to_line_message(&composer::text("hello"));
        assert_eq!(value["type"], "text");
        assert_eq!(value["text"], "hello");
        assert!(value.get("quickReply").is_none());
    }

    #[test]
    fn test_text_message_with_chips() {
        let suggestions = vec!["続きを教えて".to_string()];
        let value = to_line_message(&composer::text_with_chips("hello", &suggestions));

        let items = value["quickReply"]["items"]
            .as_array()
            .expect("Items should be an array");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["type"], "action");
        assert_eq!(items[0]["action"]["type"], "message");
        assert_eq!(items[0]["action"]["label"], "続きを教えて");
        assert_eq!(items[0]["action"]["text"], "続きを教えて");
    }

    #[test]
    fn test_image_message_shape() {
        let value = to_line_message(&composer::image("https://example.com/cat.png", Vec::new()));
        assert_eq!(value["type"], "image");
        assert_eq!(value["originalContentUrl"], "https://example.com/cat.png");
        assert_eq!(value["previewImageUrl"], "https://example.com/cat.png");
    }
}
