//! Serialization lock for Generation Core calls against one engine.
//!
//! Waiters are served in FIFO order (`tokio::sync::Mutex` is fair). The
//! guard also carries the bookkeeping the core needs between calls: when the
//! last generation completed and which input it was for.

use tokio::sync::{Mutex, MutexGuard};
use tokio::time::Instant;

/// Bookkeeping shared by consecutive core calls.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LockState {
    /// Monotonic time the last generation finished its cleanup pass.
    pub last_completed_at: Option<Instant>,
    /// Fingerprint of the last input that produced a non-empty summary.
    pub last_input_hash: Option<u32>,
}

/// Owned serialization lock. One instance per engine; tests build their own.
#[derive(Debug, Default)]
pub struct GenerationLock {
    state: Mutex<LockState>,
}

/// Held for the whole duration of one core call; released on drop.
pub type GenerationGuard<'a> = MutexGuard<'a, LockState>;

impl GenerationLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self) -> GenerationGuard<'_> {
        self.state.lock().await
    }

    /// Copy of the bookkeeping, or `None` while a call holds the lock.
    pub fn peek(&self) -> Option<LockState> {
        self.state.try_lock().ok().map(|guard| *guard)
    }
}
