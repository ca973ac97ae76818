//! Briefly domain types.
//!
//! Pure, runtime-free building blocks for the summarization engine:
//! text chunking, input fingerprinting, the generation state snapshot and
//! the error taxonomy. Nothing here performs I/O or waits.

pub mod chunking;
pub mod error;
pub mod ids;
pub mod state;
pub mod text;

pub use chunking::{chunk_text, CHUNK_OVERLAP, MAX_CHUNK_SIZE};
pub use error::GenerationError;
pub use ids::GenerationId;
pub use state::{GenerationCompleted, GenerationFailed, GenerationState};
pub use text::{char_len, fingerprint, truncate_with_marker, TRUNCATION_MARKER};
