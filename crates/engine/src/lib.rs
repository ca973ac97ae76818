//! Briefly Engine library.
//!
//! Turns a stateful, single-flight inference engine into a cancellable,
//! serialized summarization service.
//!
//! ## Structure
//!
//! - `use_cases/` - Generation core, generation service, chunked workflow
//! - `infrastructure/` - Engine port, Ollama adapter, URL content, settings
//! - `app` - Application composition

pub mod app;
pub mod infrastructure;
pub mod use_cases;

/// Test fixtures shared by unit and scenario tests.
#[cfg(test)]
pub mod test_fixtures;

pub use app::App;
