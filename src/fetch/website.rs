//! Web page text extraction and the page reader template.

use scraper::{Html, Selector};

use super::FetchError;
use crate::llm::Message;

static RE_URL: lazy_regex::Lazy<regex::Regex> = lazy_regex::lazy_regex!(r"^https?://\S+");

/// System message for page summarization requests.
pub const SYSTEM_MESSAGE: &str =
    "あなたは今、データの整理、要約、まとめ、集約が得意で、細部に着目してポイントを押さえることができます。";

/// User-message template wrapped around extracted page text.
pub const MESSAGE_FORMAT: &str = r#"
    リンク先の内容:
    """
    {}
    """

    いくつかのポイントに着目してください：
    1.サイトの主要な目的は何か？
    2.サイトの要約は何か？
    3.サイトに含まれる情報の中で、最も重要な視点は点は何ですか？

    この形式で回答してください:
    - 目的： '...'
    - 要約： '...'
    - 重要な視点： '...'
"#;

/// Extracts a URL from the start of user text.
#[must_use]
pub fn url_from_text(text: &str) -> Option<String> {
    RE_URL.find(text.trim()).map(|m| m.as_str().to_string())
}

pub(crate) async fn page_chunks(
    http: &reqwest::Client,
    url: &str,
) -> Result<Vec<String>, FetchError> {
    let body = super::fetch_text(http, url).await?;
    Ok(extract_chunks(&body))
}

/// Collects readable text from `<article>` elements, falling back to
/// `div.content` when the page has none.
fn extract_chunks(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let chunks = select_text(&document, "article");
    if !chunks.is_empty() {
        return chunks;
    }
    select_text(&document, "div.content")
}

fn select_text(document: &Html, selector: &str) -> Vec<String> {
    let Ok(selector) = Selector::parse(selector) else {
        return Vec::new();
    };
    document
        .select(&selector)
        .map(|element| {
            element
                .text()
                .collect::<Vec<_>>()
                .join(" ")
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|text| !text.is_empty())
        .collect()
}

/// Builds the two-message summarization request for extracted page text.
#[must_use]
pub fn summary_request(content: &str) -> Vec<Message> {
    vec![
        Message::system(SYSTEM_MESSAGE),
        Message::user(MESSAGE_FORMAT.replace("{}", content)),
    ]
}
