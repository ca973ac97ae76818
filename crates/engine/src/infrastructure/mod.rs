//! Infrastructure implementations.
//!
//! Contains the engine port and its adapters for external dependencies.

pub mod content_source;
pub mod ollama;
pub mod ports;
pub mod settings;
