//! Generation Core: one serialized summarization turn against an engine.
//!
//! A call runs the whole turn while holding the [`GenerationLock`]:
//! cooldown, scratch reset on changed input, readiness wait, drain of stale
//! work, prompt dispatch, result extraction and cleanup. The lock guard is
//! dropped on every exit path.

use std::sync::Arc;
use std::time::Duration;

use briefly_domain::{fingerprint, GenerationError};
use tokio::time::{sleep, Instant};

use super::lock::{GenerationGuard, GenerationLock, LockState};
use super::prompt::{clean_summary, last_assistant_content, pick_result, SummaryPrompt};
use crate::infrastructure::ports::{ChatConfig, EngineFault, InferenceEngine};

/// Engine fault text meaning a generation is already running.
const BUSY_SIGNAL: &str = "ModelGenerating";

/// Engine fault text meaning the prompt exceeded the model context.
const INPUT_TOO_LARGE_SIGNAL: &str = "error code: 18";

/// Fault fragments that indicate the native runtime crashed.
const CRASH_SIGNALS: [&str; 5] = [
    "null",
    "segmentation",
    "EXC_BAD_ACCESS",
    "SIGSEGV",
    "invalid address",
];

/// Timing and size limits for a single turn.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Minimum time between the end of one turn and the start of the next.
    pub cooldown: Duration,
    /// User text beyond this many characters is cut and marked.
    pub max_input_chars: usize,
    pub ready_poll_interval: Duration,
    pub ready_timeout: Duration,
    pub interrupt_poll_interval: Duration,
    pub interrupt_poll_attempts: u32,
    /// Pause after a stale generation stopped.
    pub interrupt_settle: Duration,
    /// Pause after interrupting because the input changed.
    pub input_change_settle: Duration,
    /// Single wait before re-reading history when the send left nothing.
    pub result_recheck_delay: Duration,
    /// Pause after the post-turn interrupt.
    pub cleanup_delay: Duration,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_millis(500),
            max_input_chars: 6000,
            ready_poll_interval: Duration::from_secs(2),
            ready_timeout: Duration::from_secs(5 * 60),
            interrupt_poll_interval: Duration::from_millis(200),
            interrupt_poll_attempts: 25,
            interrupt_settle: Duration::from_millis(500),
            input_change_settle: Duration::from_millis(500),
            result_recheck_delay: Duration::from_millis(200),
            cleanup_delay: Duration::from_millis(500),
        }
    }
}

/// Drives an engine through summarization turns, one at a time.
pub struct GenerationCore {
    lock: Arc<GenerationLock>,
    config: CoreConfig,
}

impl GenerationCore {
    pub fn new(lock: Arc<GenerationLock>, config: CoreConfig) -> Self {
        Self { lock, config }
    }

    /// Summarizes `text` with `engine`.
    ///
    /// Returns an empty string when the engine produced nothing. Only a
    /// non-empty result marks the input as seen.
    pub async fn generate_summary(
        &self,
        text: &str,
        engine: Option<&dyn InferenceEngine>,
    ) -> Result<String, GenerationError> {
        let engine =
            engine.ok_or_else(|| GenerationError::invalid_argument("engine instance is missing"))?;

        let mut guard = self.lock.acquire().await;
        self.wait_for_cooldown(&guard).await;

        let input_hash = fingerprint(text);
        if guard.last_input_hash != Some(input_hash) {
            self.reset_for_new_input(engine).await;
        }

        self.wait_until_ready(engine).await?;
        self.drain_previous(engine).await?;

        let prompt = SummaryPrompt::build(text, self.config.max_input_chars);
        prompt.validate()?;

        let stamp = CompletionStamp { state: &mut *guard };
        let history_start = engine.history_len();
        self.dispatch(engine, &prompt, history_start).await?;

        let summary = self
            .extract_result(engine, history_start)
            .await
            .map(|raw| clean_summary(&raw))
            .unwrap_or_default();
        if !summary.is_empty() {
            stamp.state.last_input_hash = Some(input_hash);
        }

        self.cleanup(engine).await;
        drop(stamp);

        tracing::debug!(summary_chars = summary.chars().count(), "Generation turn finished");
        Ok(summary)
    }

    async fn wait_for_cooldown(&self, guard: &GenerationGuard<'_>) {
        let Some(last) = guard.last_completed_at else {
            return;
        };
        let elapsed = last.elapsed();
        if elapsed < self.config.cooldown {
            let remaining = self.config.cooldown - elapsed;
            tracing::debug!(remaining_ms = remaining.as_millis() as u64, "Cooling down");
            sleep(remaining).await;
        }
    }

    /// Stops leftover work and clears scratch output before a new input.
    /// History is engine-owned and left alone.
    async fn reset_for_new_input(&self, engine: &dyn InferenceEngine) {
        if engine.is_generating() {
            tracing::debug!("Input changed while engine is generating, interrupting");
            interrupt_best_effort(engine);
            sleep(self.config.input_change_settle).await;
        }
        engine.clear_scratch();
    }

    async fn wait_until_ready(&self, engine: &dyn InferenceEngine) -> Result<(), GenerationError> {
        if engine.is_ready() {
            return Ok(());
        }

        let started = Instant::now();
        tracing::info!("Waiting for engine to become ready");
        while !engine.is_ready() {
            if let Some(error) = engine.error() {
                return Err(GenerationError::EngineError(error));
            }
            if started.elapsed() >= self.config.ready_timeout {
                return Err(GenerationError::Timeout {
                    waited: self.config.ready_timeout,
                });
            }
            sleep(self.config.ready_poll_interval).await;
        }

        if let Some(error) = engine.error() {
            return Err(GenerationError::EngineError(error));
        }
        tracing::info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Engine is ready"
        );
        Ok(())
    }

    /// Interrupts a generation left over from earlier work and waits for it
    /// to stop.
    async fn drain_previous(&self, engine: &dyn InferenceEngine) -> Result<(), GenerationError> {
        if !engine.is_generating() {
            return Ok(());
        }

        tracing::debug!("Engine still generating, interrupting previous work");
        interrupt_best_effort(engine);

        let mut attempt = 0;
        while engine.is_generating() && attempt < self.config.interrupt_poll_attempts {
            sleep(self.config.interrupt_poll_interval).await;
            attempt += 1;
        }

        if engine.is_generating() {
            tracing::warn!(attempt, "Engine did not stop after interrupt");
            return Err(GenerationError::Busy);
        }

        sleep(self.config.interrupt_settle).await;
        Ok(())
    }

    async fn dispatch(
        &self,
        engine: &dyn InferenceEngine,
        prompt: &SummaryPrompt,
        history_start: usize,
    ) -> Result<(), GenerationError> {
        let config = ChatConfig::with_system_prompt(prompt.system.content.clone());
        if let Err(e) = engine.configure(config) {
            tracing::debug!(error = %e, "Engine configuration skipped");
        }

        tracing::debug!(
            input_chars = prompt.user.content.chars().count(),
            history_len = history_start,
            "Sending message to engine"
        );

        match engine.send_message(&prompt.user.content).await {
            Ok(()) => Ok(()),
            Err(fault) => classify_send_failure(&fault, engine, history_start),
        }
    }

    /// Reads this turn's output: assistant entries recorded at or after
    /// `history_start`, and the scratch response.
    async fn extract_result(
        &self,
        engine: &dyn InferenceEngine,
        history_start: usize,
    ) -> Option<String> {
        let mut from_history = last_assistant_content(&engine.history_since(history_start));
        let response = engine.response();

        if from_history.is_none() && response.trim().is_empty() {
            sleep(self.config.result_recheck_delay).await;
            from_history = last_assistant_content(&engine.history_since(history_start));
        }

        pick_result(from_history, &response)
    }

    async fn cleanup(&self, engine: &dyn InferenceEngine) {
        interrupt_best_effort(engine);
        sleep(self.config.cleanup_delay).await;
    }
}

/// Records the end of a turn that reached the engine, including turns that
/// fail or are dropped mid-way.
struct CompletionStamp<'a> {
    state: &'a mut LockState,
}

impl Drop for CompletionStamp<'_> {
    fn drop(&mut self) {
        self.state.last_completed_at = Some(Instant::now());
    }
}

/// Maps an engine send fault to a typed error, or to `Ok` when partial
/// output is available and should be used instead.
fn classify_send_failure(
    fault: &EngineFault,
    engine: &dyn InferenceEngine,
    history_start: usize,
) -> Result<(), GenerationError> {
    let message = fault.message();

    if message.contains(BUSY_SIGNAL) {
        return Err(GenerationError::Busy);
    }
    if message.contains(INPUT_TOO_LARGE_SIGNAL) {
        return Err(GenerationError::InputTooLarge);
    }

    let crashed = CRASH_SIGNALS.iter().any(|signal| message.contains(signal));
    if crashed {
        interrupt_best_effort(engine);
    }

    if has_partial_result(engine, history_start) {
        tracing::warn!(error = %fault, crashed, "Send failed, using partial result");
        return Ok(());
    }

    if crashed {
        tracing::warn!(error = %fault, "Engine crashed without output");
        Err(GenerationError::EngineCrash)
    } else {
        Err(GenerationError::SendFailed(message.to_string()))
    }
}

fn has_partial_result(engine: &dyn InferenceEngine, history_start: usize) -> bool {
    !engine.response().trim().is_empty()
        || last_assistant_content(&engine.history_since(history_start)).is_some()
}

/// Interrupt used for cleanup; failures are logged and never propagated.
pub(crate) fn interrupt_best_effort(engine: &dyn InferenceEngine) {
    if let Err(e) = engine.interrupt() {
        tracing::warn!(error = %e, "Best-effort interrupt failed");
    }
}
