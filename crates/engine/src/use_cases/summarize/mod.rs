//! Summarize use case.
//!
//! Decides per request between a single generation and the multi-chunk
//! pipeline (chunk, summarize each chunk in turn, join, optionally compress
//! the joined text with one more pass).

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use briefly_domain::{
    char_len, chunk_text, truncate_with_marker, GenerationError, CHUNK_OVERLAP, MAX_CHUNK_SIZE,
    TRUNCATION_MARKER,
};
use tokio::time::sleep;

use crate::use_cases::generation::GenerationService;


/// Suffix used when the chunk ceiling forces the input to be cut.
const CHUNK_CEILING_MARKER: &str = "...";

/// Limits of the chunked workflow.
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    /// Inputs shorter than this are echoed back instead of summarized.
    pub min_input_chars: usize,
    pub max_input_chars: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub max_chunks: usize,
    pub inter_chunk_delay: Duration,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            min_input_chars: 100,
            max_input_chars: 100 * 1024,
            chunk_size: MAX_CHUNK_SIZE,
            chunk_overlap: CHUNK_OVERLAP,
            max_chunks: 6,
            inter_chunk_delay: Duration::from_millis(300),
        }
    }
}

/// What a summarize request produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryOutcome {
    /// Input was too short to be worth summarizing; carries the message
    /// shown to the user.
    AlreadyConcise(String),
    Summarized(String),
}

impl SummaryOutcome {
    pub fn text(&self) -> &str {
        match self {
            Self::AlreadyConcise(text) | Self::Summarized(text) => text,
        }
    }
}

impl fmt::Display for SummaryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

/// Keeps the service's generation session open until dropped.
struct SessionGuard<'a> {
    service: &'a GenerationService,
}

impl<'a> SessionGuard<'a> {
    fn start(service: &'a GenerationService) -> Self {
        service.start_generation_session();
        Self { service }
    }
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        self.service.end_generation_session();
    }
}

/// Summarizes arbitrary-length text through the generation service.
pub struct SummarizeText {
    service: Arc<GenerationService>,
    config: WorkflowConfig,
}

impl SummarizeText {
    pub fn new(service: Arc<GenerationService>, config: WorkflowConfig) -> Self {
        Self { service, config }
    }

    pub async fn execute(&self, input: &str) -> Result<SummaryOutcome, GenerationError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(GenerationError::invalid_argument(
                "Please enter some text to summarize.",
            ));
        }

        if char_len(trimmed) < self.config.min_input_chars {
            return Ok(SummaryOutcome::AlreadyConcise(format!(
                "This text is already concise: {trimmed}"
            )));
        }

        let text = truncate_with_marker(trimmed, self.config.max_input_chars, TRUNCATION_MARKER);

        if char_len(&text) <= self.config.chunk_size {
            tracing::info!(input_chars = char_len(&text), "Summarizing as a single chunk");
            let summary = self.service.generate_summary(&text).await?;
            return Ok(SummaryOutcome::Summarized(summary));
        }

        let chunks = self.split(&text);
        self.summarize_chunks(&chunks).await.map(SummaryOutcome::Summarized)
    }

    /// Chunks `text`, cutting it down first if it would need too many chunks.
    fn split(&self, text: &str) -> Vec<String> {
        let chunks = chunk_text(text, self.config.chunk_size, self.config.chunk_overlap);
        if chunks.len() <= self.config.max_chunks {
            return chunks;
        }

        let ceiling = self.config.max_chunks * self.config.chunk_size;
        tracing::info!(
            chunks = chunks.len(),
            max_chunks = self.config.max_chunks,
            ceiling_chars = ceiling,
            "Too many chunks, truncating input"
        );
        let truncated = truncate_with_marker(text, ceiling, CHUNK_CEILING_MARKER);
        chunk_text(&truncated, self.config.chunk_size, self.config.chunk_overlap)
    }

    async fn summarize_chunks(&self, chunks: &[String]) -> Result<String, GenerationError> {
        let _session = SessionGuard::start(&self.service);
        tracing::info!(chunks = chunks.len(), "Summarizing in chunks");

        let mut parts = Vec::with_capacity(chunks.len());
        for (index, chunk) in chunks.iter().enumerate() {
            let chunk_no = index + 1;
            if index > 0 {
                sleep(self.config.inter_chunk_delay).await;
            }

            match self.service.generate_summary(chunk).await {
                Ok(summary) if !summary.trim().is_empty() => parts.push(summary),
                Ok(_) => tracing::debug!(chunk = chunk_no, "Chunk produced no summary"),
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    tracing::warn!(chunk = chunk_no, error = %e, "Chunk summary failed, skipping");
                }
            }
        }

        let combined = parts.join(" ");
        if combined.trim().is_empty() {
            return Err(GenerationError::NoContent);
        }

        if chunks.len() == 1 || char_len(&combined) <= self.config.chunk_size {
            return Ok(combined);
        }

        tracing::info!(
            combined_chars = char_len(&combined),
            "Compressing combined chunk summaries"
        );
        match self.service.generate_summary(&combined).await {
            Ok(summary) if !summary.trim().is_empty() => Ok(summary),
            Ok(_) => Ok(combined),
            Err(e) => {
                tracing::warn!(error = %e, "Final summary pass failed, using combined summaries");
                Ok(combined)
            }
        }
    }
}
