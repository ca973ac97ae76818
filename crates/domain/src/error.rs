//! Error taxonomy for summarization requests.
//!
//! Every failure a caller can observe from the generation layer is one of
//! these kinds. `Cancelled` is special: it is never surfaced as a user-facing
//! failure event, only returned to the caller whose request was superseded.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GenerationError {
    /// Caller passed something unusable (empty text, missing engine)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// No engine installed in the service yet
    #[error("Model not initialized. Call initialize_model() first.")]
    NotInitialized,

    /// Engine never became ready
    #[error("Model initialization timeout after {}s - check download progress", .waited.as_secs())]
    Timeout { waited: Duration },

    /// Engine would not stop a previous generation
    #[error("Model is busy generating. Please wait for the current generation to complete.")]
    Busy,

    /// Engine reported an error of its own
    #[error("Model error: {0}")]
    EngineError(String),

    /// Engine crashed mid-generation and left nothing usable behind
    #[error("Generation failed due to memory management issue. Please try again with a smaller input.")]
    EngineCrash,

    #[error("Input is too large for the model. Please try with shorter text or split it into smaller chunks.")]
    InputTooLarge,

    /// Superseded by a newer request or interrupted by the caller
    #[error("Generation cancelled")]
    Cancelled,

    /// Every chunk of a multi-chunk request failed
    #[error("Failed to generate any chunk summaries")]
    NoContent,

    /// An internal invariant was broken
    #[error("Internal error: {0}")]
    Internal(String),

    /// Unclassified engine send failure, message kept verbatim
    #[error("{0}")]
    SendFailed(String),
}

impl GenerationError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn engine(msg: impl Into<String>) -> Self {
        Self::EngineError(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// True for the cancellation class, which callers treat as "superseded"
    /// rather than as a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_failed_displays_engine_message_unchanged() {
        let err = GenerationError::SendFailed("socket closed".to_string());
        assert_eq!(err.to_string(), "socket closed");
    }

    #[test]
    fn timeout_reports_waited_seconds() {
        let err = GenerationError::Timeout {
            waited: Duration::from_secs(300),
        };
        assert!(err.to_string().contains("300s"));
    }

    #[test]
    fn only_cancelled_is_cancellation_class() {
        assert!(GenerationError::Cancelled.is_cancelled());
        assert!(!GenerationError::Busy.is_cancelled());
        assert!(!GenerationError::NoContent.is_cancelled());
    }
}
