//! Use cases - summarization orchestration.
//!
//! `generation` drives the inference engine one request at a time;
//! `summarize` layers the chunked workflow on top of it.

pub mod generation;
pub mod summarize;

pub use generation::{GenerationCore, GenerationService};
pub use summarize::{SummarizeText, SummaryOutcome};
