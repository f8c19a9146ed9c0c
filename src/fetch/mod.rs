//! Content retrieval for the URL summarization flow.

/// Web page text extraction and its reader template
pub mod website;
/// Video id and caption transcript retrieval
pub mod youtube;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Character cap applied to fetched content before summarization.
pub const CONTENT_CHAR_LIMIT: usize = 1800;

/// Caption cues grouped per transcript chunk.
pub const DEFAULT_CAPTION_STEP: usize = 4;

const HTTP_TIMEOUT: Duration = Duration::from_secs(60);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

// Some sites answer plain library user agents with an empty shell page.
const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36";

/// Errors raised while retrieving remote content.
#[derive(Error, Debug)]
pub enum FetchError {
    /// The HTTP request failed or returned a non-success status.
    #[error("HTTP error: {0}")]
    Http(String),
    /// The resource was fetched but held no usable text.
    #[error("no usable text in fetched content")]
    Empty,
    /// The expected structure was missing from the fetched content.
    #[error("parse error: {0}")]
    Parse(String),
}

/// URL recognition and content retrieval for summarization.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    /// Extracts a leading URL from free text.
    fn resolve_url(&self, text: &str) -> Option<String>;

    /// Extracts the video id when the URL points at a known video platform.
    fn video_id(&self, url: &str) -> Option<String>;

    /// Fetches caption transcript chunks for a video.
    async fn fetch_transcript(&self, video_id: &str) -> Result<Vec<String>, FetchError>;

    /// Fetches readable text chunks from a web page.
    async fn fetch_page(&self, url: &str) -> Result<Vec<String>, FetchError>;
}

/// Production fetcher backed by one shared HTTP client.
pub struct WebFetcher {
    http: reqwest::Client,
    caption_step: usize,
}

impl WebFetcher {
    /// Creates a fetcher with production timeouts.
    #[must_use]
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http,
            caption_step: DEFAULT_CAPTION_STEP,
        }
    }
}

impl Default for WebFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentFetcher for WebFetcher {
    fn resolve_url(&self, text: &str) -> Option<String> {
        website::url_from_text(text)
    }

    fn video_id(&self, url: &str) -> Option<String> {
        youtube::video_id(url)
    }

    async fn fetch_transcript(&self, video_id: &str) -> Result<Vec<String>, FetchError> {
        youtube::transcript_chunks(&self.http, video_id, self.caption_step).await
    }

    async fn fetch_page(&self, url: &str) -> Result<Vec<String>, FetchError> {
        website::page_chunks(&self.http, url).await
    }
}

pub(crate) async fn fetch_text(http: &reqwest::Client, url: &str) -> Result<String, FetchError> {
    let response = http
        .get(url)
        .header(reqwest::header::USER_AGENT, BROWSER_USER_AGENT)
        .send()
        .await
        .map_err(|e| FetchError::Http(e.to_string()))?;
    if !response.status().is_success() {
        return Err(FetchError::Http(format!(
            "GET {url} returned {}",
            response.status()
        )));
    }
    Ok(response.text().await.unwrap_or_default())
}

/// Joins fetched chunks and clips the result to `limit` characters.
#[must_use]
pub fn join_and_clip(chunks: &[String], limit: usize) -> String {
    chunks.join("\n").chars().take(limit).collect()
}
