//! OpenAI v1 REST client.
//!
//! Talks to the API directly with a per-user bearer token. Error
//! payloads surface their `error.message` text verbatim so callers can
//! key user-facing messages off well-known prefixes.

use super::{CompletionProvider, LlmError, Message};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
const IMAGE_COUNT: u32 = 1;
const IMAGE_SIZE: &str = "512x512";
const HTTP_TIMEOUT: Duration = Duration::from_secs(60);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// OpenAI API client bound to a single bearer token.
pub struct OpenAiProvider {
    http: reqwest::Client,
    api_key: String,
}

impl OpenAiProvider {
    /// Creates a provider for one API token.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http,
            api_key: api_key.into(),
        }
    }

    async fn get_json(&self, endpoint: &str) -> Result<Value, LlmError> {
        let response = self
            .http
            .get(format!("{OPENAI_API_BASE}{endpoint}"))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| LlmError::NetworkError(e.to_string()))?;
        Self::into_checked_json(response).await
    }

    async fn post_json(&self, endpoint: &str, body: &Value) -> Result<Value, LlmError> {
        let response = self
            .http
            .post(format!("{OPENAI_API_BASE}{endpoint}"))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| LlmError::NetworkError(e.to_string()))?;
        Self::into_checked_json(response).await
    }

    async fn post_form(&self, endpoint: &str, form: Form) -> Result<Value, LlmError> {
        let response = self
            .http
            .post(format!("{OPENAI_API_BASE}{endpoint}"))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| LlmError::NetworkError(e.to_string()))?;
        Self::into_checked_json(response).await
    }

    /// The API reports failures inside the body, so `error.message` is
    /// checked before the bare HTTP status.
    async fn into_checked_json(response: reqwest::Response) -> Result<Value, LlmError> {
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| LlmError::NetworkError(e.to_string()))?;

        let value: Value = match serde_json::from_str(&text) {
            Ok(value) => value,
            Err(e) if status.is_success() => return Err(LlmError::JsonError(e.to_string())),
            Err(_) => return Err(LlmError::ApiError(format!("API error: {status}"))),
        };

        if let Some(message) = value["error"]["message"].as_str() {
            return Err(LlmError::ApiError(message.to_string()));
        }
        if !status.is_success() {
            return Err(LlmError::ApiError(format!("API error: {status}")));
        }
        Ok(value)
    }
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    async fn chat_completion(
        &self,
        messages: &[Message],
        model_engine: &str,
    ) -> Result<String, LlmError> {
        debug!(
            "Requesting chat completion: model={model_engine} messages={}",
            messages.len()
        );
        let body = json!({
            "model": model_engine,
            "messages": messages,
        });
        let response = self.post_json("/chat/completions", &body).await?;
        response["choices"][0]["message"]["content"]
            .as_str()
            .map(|content| content.trim().to_string())
            .ok_or_else(|| LlmError::ApiError("Empty response from OpenAI".to_string()))
    }

    async fn image_generation(&self, prompt: &str) -> Result<String, LlmError> {
        debug!("Requesting image generation");
        let body = json!({
            "prompt": prompt,
            "n": IMAGE_COUNT,
            "size": IMAGE_SIZE,
        });
        let response = self.post_json("/images/generations", &body).await?;
        response["data"][0]["url"]
            .as_str()
            .map(ToString::to_string)
            .ok_or_else(|| LlmError::ApiError("No image URL in response".to_string()))
    }

    async fn transcribe_audio(
        &self,
        audio: Vec<u8>,
        filename: &str,
        model_engine: &str,
    ) -> Result<String, LlmError> {
        debug!("Requesting transcription of {} bytes", audio.len());
        let form = Form::new()
            .part("file", Part::bytes(audio).file_name(filename.to_string()))
            .text("model", model_engine.to_string());
        let response = self.post_form("/audio/transcriptions", form).await?;
        response["text"]
            .as_str()
            .map(ToString::to_string)
            .ok_or_else(|| LlmError::ApiError("No transcription in response".to_string()))
    }

    async fn validate_credential(&self) -> Result<(), LlmError> {
        self.get_json("/models").await.map(|_| ())
    }
}
