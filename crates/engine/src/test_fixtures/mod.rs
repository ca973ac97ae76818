//! Test fixtures shared by the generation and workflow tests.
//!
//! [`FakeEngine`] is a stateful, scripted stand-in for an inference engine.
//! Each `send_message` consumes the next [`SendBehavior`] from its script
//! (falling back to a numbered reply) and records what was sent, when, and
//! how many sends overlapped.
//!
//! # Usage
//!
//! ```rust,ignore
//! let engine = FakeEngine::ready();
//! engine.script([SendBehavior::Fail("connection reset".into())]);
//! ```

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::infrastructure::ports::{ChatConfig, ChatMessage, EngineFault, InferenceEngine};

/// What the fake does for one `send_message` call.
#[derive(Debug, Clone)]
pub enum SendBehavior {
    /// Appends the reply to history and sets it as the response.
    Reply(String),
    /// History and response disagree.
    ReplySplit { history: String, response: String },
    /// Only the scratch response is populated.
    SetResponse(String),
    /// Resolves without producing anything.
    Empty,
    /// Fails without producing anything.
    Fail(String),
    /// Leaves `partial` in the response, then fails.
    FailWithPartial { partial: String, fault: String },
    /// Replies after a delay unless interrupted first.
    Delayed(Duration, String),
    /// Streams `partial` into the response and only resolves once
    /// interrupted.
    Hang { partial: String },
}

#[derive(Default)]
struct FakeState {
    ready: bool,
    generating: bool,
    stuck_generating: bool,
    error: Option<String>,
    download_progress: f32,
    response: String,
    token: String,
    history: Vec<ChatMessage>,
    script: VecDeque<SendBehavior>,
    sends: Vec<(Instant, String)>,
    configured: Vec<ChatConfig>,
    interrupts: usize,
    scratch_clears: usize,
    active_sends: usize,
    max_active_sends: usize,
}

pub struct FakeEngine {
    state: Mutex<FakeState>,
    interrupted: watch::Sender<u64>,
}

impl FakeEngine {
    /// A fake that is not ready yet.
    pub fn new() -> Self {
        let (interrupted, _) = watch::channel(0);
        Self {
            state: Mutex::new(FakeState::default()),
            interrupted,
        }
    }

    pub fn ready() -> Self {
        let engine = Self::new();
        engine.set_ready(true);
        engine
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues behaviors for the next sends, in order.
    pub fn script(&self, behaviors: impl IntoIterator<Item = SendBehavior>) {
        self.state().script.extend(behaviors);
    }

    pub fn set_ready(&self, ready: bool) {
        let mut state = self.state();
        state.ready = ready;
        state.download_progress = if ready { 1.0 } else { 0.0 };
    }

    pub fn set_error(&self, error: Option<&str>) {
        self.state().error = error.map(str::to_string);
    }

    pub fn set_generating(&self, generating: bool) {
        self.state().generating = generating;
    }

    /// Keeps reporting `is_generating` no matter how often it is interrupted.
    pub fn stick_generating(&self) {
        let mut state = self.state();
        state.generating = true;
        state.stuck_generating = true;
    }

    pub fn set_response(&self, response: &str) {
        self.state().response = response.to_string();
    }

    pub fn sent_messages(&self) -> Vec<String> {
        self.state().sends.iter().map(|(_, m)| m.clone()).collect()
    }

    pub fn send_times(&self) -> Vec<Instant> {
        self.state().sends.iter().map(|(t, _)| *t).collect()
    }

    pub fn configured(&self) -> Vec<ChatConfig> {
        self.state().configured.clone()
    }

    pub fn interrupt_count(&self) -> usize {
        self.state().interrupts
    }

    pub fn clear_scratch_count(&self) -> usize {
        self.state().scratch_clears
    }

    pub fn max_concurrent_sends(&self) -> usize {
        self.state().max_active_sends
    }

    /// Last streamed token.
    pub fn token(&self) -> String {
        self.state().token.clone()
    }

    fn reply(&self, history: Option<&str>, response: &str) {
        let mut state = self.state();
        if let Some(content) = history {
            state.history.push(ChatMessage::assistant(content));
        }
        state.response = response.to_string();
        state.token = response.split_whitespace().last().unwrap_or_default().to_string();
    }

    async fn run(
        &self,
        behavior: SendBehavior,
        interrupted: &mut watch::Receiver<u64>,
    ) -> Result<(), EngineFault> {
        match behavior {
            SendBehavior::Reply(text) => self.reply(Some(&text), &text),
            SendBehavior::ReplySplit { history, response } => self.reply(Some(&history), &response),
            SendBehavior::SetResponse(text) => self.reply(None, &text),
            SendBehavior::Empty => {}
            SendBehavior::Fail(fault) => return Err(EngineFault::new(fault)),
            SendBehavior::FailWithPartial { partial, fault } => {
                self.reply(None, &partial);
                return Err(EngineFault::new(fault));
            }
            SendBehavior::Delayed(delay, text) => {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => self.reply(Some(&text), &text),
                    _ = interrupted.changed() => {}
                }
            }
            SendBehavior::Hang { partial } => {
                self.reply(None, &partial);
                let _ = interrupted.changed().await;
                if !partial.is_empty() {
                    self.state().history.push(ChatMessage::assistant(partial));
                }
            }
        }
        Ok(())
    }
}

impl Default for FakeEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InferenceEngine for FakeEngine {
    fn is_ready(&self) -> bool {
        self.state().ready
    }

    fn is_generating(&self) -> bool {
        self.state().generating
    }

    fn download_progress(&self) -> f32 {
        self.state().download_progress
    }

    fn error(&self) -> Option<String> {
        self.state().error.clone()
    }

    fn response(&self) -> String {
        self.state().response.clone()
    }

    fn message_history(&self) -> Vec<ChatMessage> {
        self.state().history.clone()
    }

    fn clear_scratch(&self) {
        let mut state = self.state();
        state.response.clear();
        state.token.clear();
        state.scratch_clears += 1;
    }

    fn interrupt(&self) -> Result<(), EngineFault> {
        {
            let mut state = self.state();
            state.interrupts += 1;
            if !state.stuck_generating {
                state.generating = false;
            }
        }
        self.interrupted.send_modify(|count| *count += 1);
        Ok(())
    }

    fn configure(&self, config: ChatConfig) -> Result<(), EngineFault> {
        self.state().configured.push(config);
        Ok(())
    }

    async fn send_message(&self, message: &str) -> Result<(), EngineFault> {
        let mut interrupted = self.interrupted.subscribe();
        interrupted.borrow_and_update();

        let behavior = {
            let mut state = self.state();
            state.sends.push((Instant::now(), message.to_string()));
            state.active_sends += 1;
            state.max_active_sends = state.max_active_sends.max(state.active_sends);
            state.generating = true;
            state.history.push(ChatMessage::user(message));
            let n = state.sends.len();
            state
                .script
                .pop_front()
                .unwrap_or_else(|| SendBehavior::Reply(format!("Summary {n}.")))
        };

        let _slot = SendSlot(self);
        self.run(behavior, &mut interrupted).await
    }
}

/// Marks a send finished when the send future completes or is dropped.
struct SendSlot<'a>(&'a FakeEngine);

impl Drop for SendSlot<'_> {
    fn drop(&mut self) {
        let mut state = self.0.state();
        state.active_sends -= 1;
        if !state.stuck_generating {
            state.generating = false;
        }
    }
}
