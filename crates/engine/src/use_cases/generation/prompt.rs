//! Prompt construction, result extraction and result cleanup.

use std::sync::LazyLock;

use briefly_domain::{truncate_with_marker, GenerationError, TRUNCATION_MARKER};
use regex_lite::Regex;

use crate::infrastructure::ports::{ChatMessage, MessageRole};

/// Fixed instruction sent as the system message.
pub const SYSTEM_PROMPT: &str = "Summarize the following text concisely in 2-3 sentences.";

/// Instruction echoes some models prepend to their answer.
static INSTRUCTION_ECHO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^summarize (the following text|this text|in 2-3 sentences).*?:\s*")
        .expect("valid regex")
});

/// The two messages of one summarization turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryPrompt {
    pub system: ChatMessage,
    pub user: ChatMessage,
}

impl SummaryPrompt {
    /// Builds the prompt, capping the user text at `max_input_chars`.
    pub fn build(text: &str, max_input_chars: usize) -> Self {
        let user_text = truncate_with_marker(text, max_input_chars, TRUNCATION_MARKER);
        Self {
            system: ChatMessage::system(SYSTEM_PROMPT),
            user: ChatMessage::user(user_text.into_owned()),
        }
    }

    /// Checks the pair has the expected roles and non-empty content.
    pub fn validate(&self) -> Result<(), GenerationError> {
        if self.system.role != MessageRole::System || self.system.content.trim().is_empty() {
            return Err(GenerationError::internal("malformed system message"));
        }
        if self.user.role != MessageRole::User || self.user.content.trim().is_empty() {
            return Err(GenerationError::internal("malformed user message"));
        }
        Ok(())
    }
}

/// Content of the last assistant message, trimmed.
pub fn last_assistant_content(history: &[ChatMessage]) -> Option<String> {
    history
        .iter()
        .rev()
        .find(|msg| msg.role == MessageRole::Assistant)
        .map(|msg| msg.content.trim().to_string())
        .filter(|content| !content.is_empty())
}

/// Picks the result between history and the scratch response.
///
/// When both are present the longer one wins; history wins ties.
pub fn pick_result(from_history: Option<String>, response: &str) -> Option<String> {
    let response = response.trim();
    match from_history {
        Some(history) if history.chars().count() >= response.chars().count() => Some(history),
        _ if !response.is_empty() => Some(response.to_string()),
        other => other,
    }
}

/// Strips instruction echoes and makes sure the text ends with punctuation.
pub fn clean_summary(raw: &str) -> String {
    let trimmed = raw.trim();
    let mut summary = INSTRUCTION_ECHO.replace(trimmed, "").trim().to_string();

    if !summary.is_empty() && !summary.ends_with(['.', '!', '?']) {
        summary.push('.');
    }
    summary
}
