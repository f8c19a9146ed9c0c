//! Axum webhook server.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::bot::handlers::SessionRouter;
use crate::line::client::LineClient;
use crate::line::events::{self, WebhookEnvelope};
use crate::line::signature;

/// Shared state behind the webhook routes.
pub struct AppState {
    /// Message router.
    pub router: SessionRouter,
    /// LINE reply client.
    pub line: LineClient,
    /// Channel secret for signature verification.
    pub channel_secret: String,
}

/// Builds the HTTP application: `GET /` health probe and
/// `POST /callback` webhook endpoint.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/callback", post(callback))
        .with_state(state)
}

async fn home() -> &'static str {
    "Hello World"
}

async fn callback(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, &'static str) {
    let signature = headers
        .get("x-line-signature")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    if !signature::verify(&state.channel_secret, &body, signature) {
        error!("Invalid webhook signature");
        return (StatusCode::BAD_REQUEST, "invalid signature");
    }

    let Ok(envelope) = serde_json::from_slice::<WebhookEnvelope>(&body) else {
        error!("Malformed webhook body");
        return (StatusCode::BAD_REQUEST, "malformed body");
    };

    let request_id = Uuid::new_v4();
    info!(
        "[{request_id}] {} webhook event(s) for {}",
        envelope.events.len(),
        envelope.destination
    );

    for event in &envelope.events {
        if let Some(at) = event.occurred_at() {
            debug!("[{request_id}] {} event at {at}", event.kind);
        }
        let Some((reply_token, outbound)) =
            state.router.handle_inbound(events::classify(event)).await
        else {
            continue;
        };
        if let Err(e) = state.line.reply(&reply_token, &[outbound]).await {
            error!("[{request_id}] Reply delivery failed: {e}");
        }
    }

    (StatusCode::OK, "OK")
}
