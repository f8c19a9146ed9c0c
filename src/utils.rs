//! Small parsing helpers shared across modules.

use unicode_segmentation::UnicodeSegmentation;

/// Match the widest `{...}` span so prose around a JSON object is ignored
static RE_JSON_OBJECT: lazy_regex::Lazy<regex::Regex> = lazy_regex::lazy_regex!(r"(?s)\{.*\}");

/// A model reply split into the answer text and follow-up suggestions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuredReply {
    /// The answer shown to the user.
    pub reply: String,
    /// Suggested follow-up messages, in the order the model produced them.
    pub samples: Vec<String>,
}

/// Extracts a structured reply from raw model output.
///
/// The model is asked to answer as a JSON object with a `reply` key and
/// optional `reply sample*` keys. Models drift, so every parse failure
/// falls back to treating the whole output as the reply. Empty samples
/// are dropped.
#[must_use]
pub fn extract_structured_reply(raw: &str) -> StructuredReply {
    let fallback = || StructuredReply {
        reply: raw.trim().to_string(),
        samples: Vec::new(),
    };

    let Some(found) = RE_JSON_OBJECT.find(raw) else {
        return fallback();
    };
    let Ok(value) = serde_json::from_str::<serde_json::Value>(found.as_str()) else {
        return fallback();
    };
    let Some(object) = value.as_object() else {
        return fallback();
    };
    let Some(reply) = object.get("reply").and_then(serde_json::Value::as_str) else {
        return fallback();
    };

    let samples = object
        .iter()
        .filter(|(key, _)| key.starts_with("reply sample"))
        .filter_map(|(_, value)| value.as_str())
        .map(str::trim)
        .filter(|sample| !sample.is_empty())
        .map(ToString::to_string)
        .collect();

    StructuredReply {
        reply: reply.trim().to_string(),
        samples,
    }
}

/// Truncates a string to at most `max` grapheme clusters.
///
/// Splitting on graphemes rather than bytes keeps multi-byte Japanese
/// text and emoji intact.
#[must_use]
pub fn truncate_graphemes(s: &str, max: usize) -> String {
    if s.graphemes(true).count() <= max {
        s.to_string()
    } else {
        s.graphemes(true).take(max).collect()
    }
}
