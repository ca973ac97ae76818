//! Inference engine port.
//!
//! The engine is an externally owned, stateful, single-flight text
//! generator. It exposes its state as readable fields rather than returning
//! results from calls: after `send_message` resolves, the produced text has
//! to be read back from `response` or `message_history`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::EngineFault;

// =============================================================================
// Message Types
// =============================================================================

/// A message in the engine's conversation history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }
}

/// Role of a message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

/// Chat configuration pushed to the engine before a send.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatConfig {
    pub system_prompt: Option<String>,
}

impl ChatConfig {
    pub fn with_system_prompt(prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: Some(prompt.into()),
        }
    }
}

// =============================================================================
// Engine Port
// =============================================================================

/// Capability surface of an inference engine handle.
///
/// Implementations are shared by reference and mutated through `&self`;
/// callers poll the accessors to observe progress. The orchestration layer
/// may clear the scratch fields (`response`, `token`) but never touches
/// `message_history`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InferenceEngine: Send + Sync {
    fn is_ready(&self) -> bool;

    fn is_generating(&self) -> bool;

    /// Model download progress in `0.0..=1.0`.
    fn download_progress(&self) -> f32;

    /// Error the engine is currently reporting, if any.
    fn error(&self) -> Option<String>;

    /// Text produced so far by the current or last generation.
    fn response(&self) -> String;

    /// Engine-owned conversation history.
    fn message_history(&self) -> Vec<ChatMessage>;

    /// Number of messages ever appended to the history. Positions stay
    /// stable when an engine drops old entries.
    fn history_len(&self) -> usize {
        self.message_history().len()
    }

    /// History entries from position `start` on.
    fn history_since(&self, start: usize) -> Vec<ChatMessage> {
        self.message_history().into_iter().skip(start).collect()
    }

    /// Resets the `response` and `token` scratch fields.
    fn clear_scratch(&self);

    /// Asks the engine to stop generating. Stopping is observed by polling
    /// `is_generating`.
    fn interrupt(&self) -> Result<(), EngineFault>;

    /// Applies chat configuration. Engines without the capability keep the
    /// default, which reports it as unsupported.
    fn configure(&self, _config: ChatConfig) -> Result<(), EngineFault> {
        Err(EngineFault::unsupported("configure"))
    }

    /// Sends one user message and resolves when the engine finishes (or is
    /// interrupted).
    async fn send_message(&self, message: &str) -> Result<(), EngineFault>;
}
