//! Outbound reply composition.

use unicode_segmentation::UnicodeSegmentation;

use crate::utils;

/// Maximum quick-reply chips attached to a single reply.
pub const MAX_SUGGESTIONS: usize = 4;

/// Maximum grapheme length of a chip label.
pub const CHIP_LABEL_MAX: usize = 20;

/// Maximum grapheme length of a text reply body.
pub const REPLY_TEXT_LIMIT: usize = 5000;

/// A tappable quick-reply suggestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chip {
    /// Label rendered on the chip.
    pub label: String,
    /// Message sent when the chip is tapped.
    pub text: String,
}

impl Chip {
    /// Builds a chip whose label is the (truncated) message itself.
    #[must_use]
    pub fn suggestion(text: &str) -> Self {
        Self {
            label: chip_label(text),
            text: text.to_string(),
        }
    }

    /// Builds a chip with an explicit label and message.
    #[must_use]
    pub fn labeled(label: &str, text: &str) -> Self {
        Self {
            label: chip_label(label),
            text: text.to_string(),
        }
    }
}

/// A composed reply ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// A text bubble, optionally with quick-reply chips.
    Text {
        /// Body text, clipped to [`REPLY_TEXT_LIMIT`] graphemes.
        text: String,
        /// Quick-reply chips, at most [`MAX_SUGGESTIONS`].
        chips: Vec<Chip>,
    },
    /// An image bubble, optionally with quick-reply chips.
    Image {
        /// Full-size image URL.
        original_url: String,
        /// Preview image URL.
        preview_url: String,
        /// Quick-reply chips, at most [`MAX_SUGGESTIONS`].
        chips: Vec<Chip>,
    },
}

/// Composes a plain text reply.
#[must_use]
pub fn text(body: &str) -> Outbound {
    text_with(body, Vec::new())
}

/// Composes a text reply with pre-built chips.
#[must_use]
pub fn text_with(body: &str, chips: Vec<Chip>) -> Outbound {
    Outbound::Text {
        text: utils::truncate_graphemes(body, REPLY_TEXT_LIMIT),
        chips: cap_chips(chips),
    }
}

/// Composes a text reply whose chips echo the given suggestions.
#[must_use]
pub fn text_with_chips(body: &str, suggestions: &[String]) -> Outbound {
    let chips = suggestions
        .iter()
        .map(|s| Chip::suggestion(s.as_str()))
        .collect();
    text_with(body, chips)
}

/// Composes an image reply; the same URL serves as full-size and preview.
#[must_use]
pub fn image(url: &str, chips: Vec<Chip>) -> Outbound {
    Outbound::Image {
        original_url: url.to_string(),
        preview_url: url.to_string(),
        chips: cap_chips(chips),
    }
}

fn cap_chips(mut chips: Vec<Chip>) -> Vec<Chip> {
    chips.truncate(MAX_SUGGESTIONS);
    chips
}

/// Shortens text to a valid chip label.
///
/// Labels over [`CHIP_LABEL_MAX`] graphemes are cut to 19 graphemes
/// with a trailing ellipsis so the result stays within the limit.
#[must_use]
pub fn chip_label(text: &str) -> String {
    if text.graphemes(true).count() <= CHIP_LABEL_MAX {
        return text.to_string();
    }
    let mut label: String = text.graphemes(true).take(CHIP_LABEL_MAX - 1).collect();
    label.push('…');
    label
}
