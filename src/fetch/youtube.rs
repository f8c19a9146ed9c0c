//! YouTube caption transcript retrieval and the video reader template.
//!
//! Captions are pulled without an API key: the watch page embeds a
//! player response whose `captionTracks` array points at a timedtext
//! XML document. Cue text arrives HTML-escaped, sometimes twice.

use super::FetchError;
use crate::llm::Message;

static RE_VIDEO_ID: lazy_regex::Lazy<regex::Regex> = lazy_regex::lazy_regex!(
    r"(?:youtube\.com/(?:watch\?v=|shorts/)|youtu\.be/)([A-Za-z0-9_-]{11})"
);

static RE_CAPTION_URL: lazy_regex::Lazy<regex::Regex> =
    lazy_regex::lazy_regex!(r#""baseUrl"\s*:\s*"([^"]+)""#);

static RE_CUE: lazy_regex::Lazy<regex::Regex> =
    lazy_regex::lazy_regex!(r"(?s)<text[^>]*>(.*?)</text>");

/// System message for transcript summarization requests.
pub const SYSTEM_MESSAGE: &str =
    "あなたは今、動画の内容の整理、要約、まとめ、集約が得意で、細部に着目してポイントを押さえることができます。";

/// User-message template wrapped around the caption transcript.
pub const MESSAGE_FORMAT: &str = r#"
    動画の字幕の内容:
    """
    {}
    """

    いくつかのポイントに着目してください：
    1.動画の主要な目的は何か？
    2.動画の要約は何か？
    3.動画に含まれる情報の中で、最も重要な視点は何ですか？

    この形式で回答してください:
    - 目的： '...'
    - 要約： '...'
    - 重要な視点： '...'
"#;

/// Extracts the 11-character video id from a watch, shorts or short-form URL.
#[must_use]
pub fn video_id(url: &str) -> Option<String> {
    RE_VIDEO_ID
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

pub(crate) async fn transcript_chunks(
    http: &reqwest::Client,
    video_id: &str,
    step: usize,
) -> Result<Vec<String>, FetchError> {
    let watch_url = format!("https://www.youtube.com/watch?v={video_id}");
    let page = super::fetch_text(http, &watch_url).await?;
    let caption_url = caption_track_url(&page)
        .ok_or_else(|| FetchError::Parse("no caption track found".to_string()))?;
    let xml = super::fetch_text(http, &caption_url).await?;
    let cues = cue_texts(&xml);
    if cues.is_empty() {
        return Err(FetchError::Empty);
    }
    Ok(group_cues(&cues, step))
}

/// First caption track URL embedded in the watch page, if any.
fn caption_track_url(page: &str) -> Option<String> {
    let start = page.find("\"captionTracks\"")?;
    let caps = RE_CAPTION_URL.captures(&page[start..])?;
    Some(caps.get(1)?.as_str().replace("\\u0026", "&"))
}

fn cue_texts(xml: &str) -> Vec<String> {
    RE_CUE
        .captures_iter(xml)
        .filter_map(|caps| caps.get(1))
        .map(|m| {
            // Cues are frequently escaped twice (&amp;#39; for an apostrophe).
            let once = html_escape::decode_html_entities(m.as_str()).into_owned();
            html_escape::decode_html_entities(&once).trim().to_string()
        })
        .filter(|text| !text.is_empty())
        .collect()
}

fn group_cues(cues: &[String], step: usize) -> Vec<String> {
    cues.chunks(step.max(1))
        .map(|group| group.join(" "))
        .collect()
}

/// Builds the two-message summarization request for a caption transcript.
#[must_use]
pub fn summary_request(content: &str) -> Vec<Message> {
    vec![
        Message::system(SYSTEM_MESSAGE),
        Message::user(MESSAGE_FORMAT.replace("{}", content)),
    ]
}
