//! Slash command parsing.

/// Keyword that aborts an armed two-step command.
pub const CANCEL_KEYWORD: &str = "/cancel";

/// A recognized slash command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Show the command reference.
    Help,
    /// Arm token registration; the next message is the token.
    RegisterToken,
    /// Arm system prompt replacement; the next message is the prompt.
    SetSystemPrompt,
    /// Restore the default system prompt.
    ResetSystemPrompt,
    /// Clear the user's conversation history.
    ClearHistory,
    /// Arm image generation; the next message is the prompt.
    GenerateImage,
    /// Arm URL summarization; the next message is the URL.
    SummarizeUrl,
    /// Show the quick-access menu.
    ShowMenu,
    /// Abort an armed command.
    Cancel,
}

impl Command {
    /// Parses the leading keyword of a message into a command.
    ///
    /// Only the first whitespace-separated word is inspected; trailing
    /// text is ignored. Unknown keywords and plain chat return `None`.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        match text.split_whitespace().next()? {
            "/help" => Some(Self::Help),
            "/token" => Some(Self::RegisterToken),
            "/system" => Some(Self::SetSystemPrompt),
            "/reset" => Some(Self::ResetSystemPrompt),
            "/clear" => Some(Self::ClearHistory),
            "/image" => Some(Self::GenerateImage),
            "/url" => Some(Self::SummarizeUrl),
            "/menu" => Some(Self::ShowMenu),
            CANCEL_KEYWORD => Some(Self::Cancel),
            _ => None,
        }
    }
}
