//! Generation Service: the long-lived owner of the current engine.
//!
//! Tracks at most one current generation, cancels it when a newer request
//! arrives, keeps a polled state snapshot of the engine, and fans out
//! state-change, completion and failure events.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use briefly_domain::{
    GenerationCompleted, GenerationError, GenerationFailed, GenerationId, GenerationState,
};
use tokio::time::{sleep, timeout, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::core::{interrupt_best_effort, GenerationCore};
use super::events::{EventBus, Subscription};
use super::prompt::clean_summary;
use crate::infrastructure::ports::InferenceEngine;

/// Timings of the service's own orchestration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Cadence of the state poll started by `initialize_model`.
    pub state_poll_interval: Duration,
    /// Delay before re-checking whether the engine is really generating.
    pub stale_recheck_delay: Duration,
    /// Wait after interrupting a superseded generation.
    pub interrupt_teardown: Duration,
    /// How long to wait for an idle superseded generation to settle.
    pub superseded_settle_wait: Duration,
    /// How long a cancelled generation may keep running to finish on its own.
    pub cancellation_grace: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            state_poll_interval: Duration::from_millis(100),
            stale_recheck_delay: Duration::from_millis(10),
            interrupt_teardown: Duration::from_millis(100),
            superseded_settle_wait: Duration::from_millis(50),
            cancellation_grace: Duration::from_millis(50),
        }
    }
}

/// The generation currently holding the service's single slot.
#[derive(Debug, Clone)]
struct GenerationRecord {
    id: GenerationId,
    started_at: Instant,
    cancel: CancellationToken,
    /// Cancelled once the generation's call has returned or been dropped.
    settled: CancellationToken,
}

#[derive(Default)]
struct Slots {
    engine: Option<Arc<dyn InferenceEngine>>,
    current: Option<GenerationRecord>,
    session_active: bool,
    state: GenerationState,
    polling: Option<CancellationToken>,
}

struct Shared {
    slots: Mutex<Slots>,
    state_changed: EventBus<GenerationState>,
    completed: EventBus<GenerationCompleted>,
    failed: EventBus<GenerationFailed>,
    core: GenerationCore,
    config: ServiceConfig,
}

impl Shared {
    fn slots(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Recomputes the snapshot and publishes it if it changed. Does nothing
    /// without an engine, which freezes state after cleanup.
    fn publish_state(&self) {
        let changed = {
            let mut slots = self.slots();
            let Some(engine) = slots.engine.as_ref() else {
                return;
            };

            let next = GenerationState {
                is_ready: engine.is_ready(),
                is_generating: engine.is_generating()
                    || slots.current.is_some()
                    || slots.session_active,
                download_progress: engine.download_progress(),
                error: engine.error(),
                current_generation_id: slots.current.as_ref().map(|c| c.id),
            };

            if next == slots.state {
                None
            } else {
                slots.state = next.clone();
                Some(next)
            }
        };

        if let Some(state) = changed {
            self.state_changed.publish(&state);
        }
    }

    fn clear_current_if(&self, id: GenerationId) {
        let mut slots = self.slots();
        if slots.current.as_ref().is_some_and(|c| c.id == id) {
            slots.current = None;
        }
    }
}

/// Process-wide generation orchestrator.
///
/// Cheap to share behind an `Arc`; every method takes `&self`.
pub struct GenerationService {
    shared: Arc<Shared>,
}

impl GenerationService {
    pub fn new(core: GenerationCore, config: ServiceConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                slots: Mutex::new(Slots::default()),
                state_changed: EventBus::new(),
                completed: EventBus::new(),
                failed: EventBus::new(),
                core,
                config,
            }),
        }
    }

    /// Installs `engine`, publishes its state and starts the state poll.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn initialize_model(&self, engine: Arc<dyn InferenceEngine>) {
        self.shared.slots().engine = Some(engine);
        self.shared.publish_state();
        self.start_polling();
        tracing::info!("Generation service initialized");
    }

    pub fn is_initialized(&self) -> bool {
        self.shared.slots().engine.is_some()
    }

    fn start_polling(&self) {
        let token = {
            let mut slots = self.shared.slots();
            if slots.polling.is_some() {
                return;
            }
            let token = CancellationToken::new();
            slots.polling = Some(token.clone());
            token
        };

        let shared = Arc::downgrade(&self.shared);
        let period = self.shared.config.state_poll_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                let Some(shared) = shared.upgrade() else {
                    break;
                };
                shared.publish_state();
            }
            tracing::debug!("State polling stopped");
        });
    }

    /// Copy of the latest published snapshot.
    pub fn get_state(&self) -> GenerationState {
        self.shared.slots().state.clone()
    }

    /// Keeps `is_generating` true until `end_generation_session`.
    pub fn start_generation_session(&self) {
        self.shared.slots().session_active = true;
        self.shared.publish_state();
    }

    pub fn end_generation_session(&self) {
        self.shared.slots().session_active = false;
        self.shared.publish_state();
    }

    /// Summarizes `text`, superseding any generation that is still current.
    ///
    /// A superseded call returns `Cancelled`, or the partial text the engine
    /// had produced when it was cancelled.
    pub async fn generate_summary(&self, text: &str) -> Result<String, GenerationError> {
        let engine = self
            .shared
            .slots()
            .engine
            .clone()
            .ok_or(GenerationError::NotInitialized)?;
        if text.trim().is_empty() {
            return Err(GenerationError::invalid_argument(
                "Input text is empty or invalid",
            ));
        }

        self.supersede_current(engine.as_ref()).await;

        let id = GenerationId::new();
        let cancel = CancellationToken::new();
        let settled = CancellationToken::new();
        let record = GenerationRecord {
            id,
            started_at: Instant::now(),
            cancel: cancel.clone(),
            settled: settled.clone(),
        };

        let displaced = self.shared.slots().current.replace(record);
        if let Some(displaced) = displaced {
            // Another caller took the slot while we were superseding.
            displaced.cancel.cancel();
        }
        self.shared.publish_state();

        let _settled = settled.drop_guard();
        tracing::info!(
            generation_id = %id,
            input_chars = text.chars().count(),
            "Generation started"
        );

        let started_at = Instant::now();
        let result = self.execute(text, engine.as_ref(), &cancel).await;

        self.shared.clear_current_if(id);
        self.shared.publish_state();

        let elapsed_ms = started_at.elapsed().as_millis() as u64;
        match &result {
            Ok(summary) => {
                tracing::info!(generation_id = %id, elapsed_ms, "Generation completed");
                self.shared.completed.publish(&GenerationCompleted {
                    id,
                    summary: summary.clone(),
                });
            }
            Err(e) if e.is_cancelled() || cancel.is_cancelled() => {
                tracing::debug!(generation_id = %id, elapsed_ms, "Generation cancelled");
            }
            Err(e) => {
                tracing::warn!(generation_id = %id, elapsed_ms, error = %e, "Generation failed");
                self.shared.failed.publish(&GenerationFailed {
                    id,
                    error: e.clone(),
                });
            }
        }

        result
    }

    /// Frees the slot held by the current generation, if any.
    async fn supersede_current(&self, engine: &dyn InferenceEngine) {
        let Some(previous) = self.shared.slots().current.clone() else {
            return;
        };

        let mut generating = engine.is_generating();
        if generating {
            sleep(self.shared.config.stale_recheck_delay).await;
            generating = engine.is_generating();
        }

        tracing::debug!(
            generation_id = %previous.id,
            age_ms = previous.started_at.elapsed().as_millis() as u64,
            generating,
            "Superseding current generation"
        );
        previous.cancel.cancel();

        if generating {
            interrupt_best_effort(engine);
            sleep(self.shared.config.interrupt_teardown).await;
        } else {
            let _ = timeout(
                self.shared.config.superseded_settle_wait,
                previous.settled.cancelled(),
            )
            .await;
        }

        self.shared.clear_current_if(previous.id);
        self.shared.publish_state();
    }

    /// Runs the core call raced against `cancel`.
    async fn execute(
        &self,
        text: &str,
        engine: &dyn InferenceEngine,
        cancel: &CancellationToken,
    ) -> Result<String, GenerationError> {
        if cancel.is_cancelled() {
            return Err(GenerationError::Cancelled);
        }
        if let Some(error) = engine.error() {
            return Err(GenerationError::EngineError(error));
        }

        let work = self.shared.core.generate_summary(text, Some(engine));
        tokio::pin!(work);

        let outcome = tokio::select! {
            biased;
            result = &mut work => result,
            _ = cancel.cancelled() => {
                match timeout(self.shared.config.cancellation_grace, &mut work).await {
                    Ok(result) => result,
                    Err(_) => Err(GenerationError::Cancelled),
                }
            }
        };

        match outcome {
            Err(_) if cancel.is_cancelled() => {
                let partial = clean_summary(&engine.response());
                if partial.is_empty() {
                    Err(GenerationError::Cancelled)
                } else {
                    tracing::warn!(
                        partial_chars = partial.chars().count(),
                        "Generation cancelled, returning partial result"
                    );
                    Ok(partial)
                }
            }
            other => other,
        }
    }

    /// Cancels the current generation and interrupts the engine. No-op when
    /// nothing is current.
    pub fn interrupt(&self) {
        let (cancel, engine) = {
            let slots = self.shared.slots();
            let Some(current) = slots.current.as_ref() else {
                return;
            };
            (current.cancel.clone(), slots.engine.clone())
        };

        cancel.cancel();
        if let Some(engine) = engine {
            interrupt_best_effort(engine.as_ref());
        }
    }

    /// Subscribes to state snapshots. With `immediate`, `listener` is also
    /// called once right away with the current snapshot.
    pub fn on_state_change<F>(&self, listener: F, immediate: bool) -> Subscription
    where
        F: Fn(&GenerationState) + Send + Sync + 'static,
    {
        let listener = Arc::new(listener);
        let subscription = {
            let listener = Arc::clone(&listener);
            self.shared
                .state_changed
                .subscribe(move |state| listener(state))
        };
        if immediate {
            listener(&self.get_state());
        }
        subscription
    }

    pub fn on_generation_complete<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&GenerationCompleted) + Send + Sync + 'static,
    {
        self.shared.completed.subscribe(listener)
    }

    pub fn on_generation_error<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&GenerationFailed) + Send + Sync + 'static,
    {
        self.shared.failed.subscribe(listener)
    }

    /// Stops polling, interrupts, drops every listener and the engine.
    /// State stays frozen until `initialize_model` is called again.
    pub fn cleanup(&self) {
        if let Some(polling) = self.shared.slots().polling.take() {
            polling.cancel();
        }
        self.interrupt();

        self.shared.state_changed.clear();
        self.shared.completed.clear();
        self.shared.failed.clear();

        let mut slots = self.shared.slots();
        slots.engine = None;
        slots.current = None;
        tracing::info!("Generation service cleaned up");
    }
}

impl Drop for GenerationService {
    fn drop(&mut self) {
        if let Some(polling) = self.shared.slots().polling.take() {
            polling.cancel();
        }
    }
}
