//! Port traits for infrastructure boundaries.
//!
//! The inference engine is the only abstraction the generation layer talks
//! through. Everything else is concrete types.

mod error;
mod external;

// =============================================================================
// Engine Port
// =============================================================================
pub use external::{ChatConfig, ChatMessage, InferenceEngine, MessageRole};

#[cfg(test)]
pub use external::MockInferenceEngine;

// =============================================================================
// Error Types
// =============================================================================
pub use error::EngineFault;
