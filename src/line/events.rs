//! Webhook event envelope and classification.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Top-level webhook request body.
#[derive(Debug, Deserialize)]
pub struct WebhookEnvelope {
    /// Bot user id the webhook was delivered to.
    #[serde(default)]
    pub destination: String,
    /// Events bundled into this delivery.
    #[serde(default)]
    pub events: Vec<Event>,
}

/// One webhook event.
#[derive(Debug, Deserialize)]
pub struct Event {
    /// Event type, `message` for everything this bot handles.
    #[serde(rename = "type")]
    pub kind: String,
    /// Token for the one-shot reply API.
    #[serde(default, rename = "replyToken")]
    pub reply_token: Option<String>,
    /// Who sent the event.
    #[serde(default)]
    pub source: Option<Source>,
    /// Message payload, present on message events.
    #[serde(default)]
    pub message: Option<MessagePayload>,
    /// Delivery timestamp in epoch milliseconds.
    #[serde(default)]
    pub timestamp: i64,
}

impl Event {
    /// Delivery time of the event.
    #[must_use]
    pub fn occurred_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp)
    }
}

/// Event source.
#[derive(Debug, Deserialize)]
pub struct Source {
    /// Source type: `user`, `group` or `room`.
    #[serde(rename = "type")]
    pub kind: String,
    /// LINE user id, absent on some group events.
    #[serde(default, rename = "userId")]
    pub user_id: Option<String>,
}

/// Message payload of a message event.
#[derive(Debug, Deserialize)]
pub struct MessagePayload {
    /// Message type: `text`, `audio`, `image`, `sticker` and so on.
    #[serde(rename = "type")]
    pub kind: String,
    /// Message id.
    #[serde(default)]
    pub id: String,
    /// Text body, present on text messages.
    #[serde(default)]
    pub text: Option<String>,
}

/// A webhook event reduced to what the router consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A text message from a user.
    Text {
        /// LINE user id.
        user_id: String,
        /// One-shot reply token.
        reply_token: String,
        /// Message text.
        text: String,
    },
    /// A message in a format the bot does not handle.
    Unsupported {
        /// LINE user id.
        user_id: String,
        /// One-shot reply token.
        reply_token: String,
        /// The unsupported message type.
        kind: String,
    },
    /// Events with nothing to reply to, such as follows and unfollows.
    Ignored,
}

/// Reduces a raw event to an [`Inbound`] the router can dispatch.
#[must_use]
pub fn classify(event: &Event) -> Inbound {
    if event.kind != "message" {
        return Inbound::Ignored;
    }
    let (Some(reply_token), Some(source), Some(message)) = (
        event.reply_token.as_ref(),
        event.source.as_ref(),
        event.message.as_ref(),
    ) else {
        return Inbound::Ignored;
    };
    let Some(user_id) = source.user_id.as_ref() else {
        return Inbound::Ignored;
    };

    match message.text.as_ref() {
        Some(text) if message.kind == "text" => Inbound::Text {
            user_id: user_id.clone(),
            reply_token: reply_token.clone(),
            text: text.clone(),
        },
        _ => Inbound::Unsupported {
            user_id: user_id.clone(),
            reply_token: reply_token.clone(),
            kind: message.kind.clone(),
        },
    }
}
