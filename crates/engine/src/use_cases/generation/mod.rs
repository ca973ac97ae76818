//! Generation use cases.
//!
//! [`GenerationCore`] drives one serialized turn against an inference
//! engine; [`GenerationService`] owns the engine, supersedes stale requests
//! and publishes state and result events.

mod core;
mod events;
mod lock;
mod prompt;
mod service;


pub use self::core::{CoreConfig, GenerationCore};
pub use events::{EventBus, Subscription};
pub use lock::{GenerationGuard, GenerationLock, LockState};
pub use prompt::{clean_summary, SummaryPrompt, SYSTEM_PROMPT};
pub use service::{GenerationService, ServiceConfig};
