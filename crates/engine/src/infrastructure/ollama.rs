//! Ollama inference engine (native streaming chat API).
//!
//! Exposes a local Ollama server through the [`InferenceEngine`] port: state
//! lives in fields that the generation layer polls, `send_message` streams
//! `/api/chat` into `response`, and `interrupt` cancels the stream in flight.

use std::collections::VecDeque;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::infrastructure::ports::{ChatConfig, ChatMessage, EngineFault, InferenceEngine};

/// Default Ollama base URL.
pub const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434";

/// Default model for Ollama.
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.2";

/// Fault text the generation layer recognizes as "already generating".
const MODEL_GENERATING: &str = "ModelGenerating";

/// History entries kept in memory; older ones are dropped first.
const HISTORY_CAPACITY: usize = 64;

/// Bounded conversation log with positions counted from the first message
/// ever recorded.
#[derive(Debug, Default)]
struct History {
    entries: VecDeque<ChatMessage>,
    dropped: usize,
}

impl History {
    fn push(&mut self, message: ChatMessage) {
        if self.entries.len() == HISTORY_CAPACITY {
            self.entries.pop_front();
            self.dropped += 1;
        }
        self.entries.push_back(message);
    }

    fn total(&self) -> usize {
        self.dropped + self.entries.len()
    }

    fn since(&self, start: usize) -> Vec<ChatMessage> {
        let skip = start.saturating_sub(self.dropped);
        self.entries.iter().skip(skip).cloned().collect()
    }
}

#[derive(Debug, Default)]
struct EngineState {
    ready: bool,
    generating: bool,
    download_progress: f32,
    error: Option<String>,
    response: String,
    token: String,
    history: History,
    system_prompt: Option<String>,
    cancel: Option<CancellationToken>,
}

/// Streaming chat engine backed by an Ollama server.
pub struct OllamaEngine {
    client: Client,
    base_url: String,
    model: String,
    state: RwLock<EngineState>,
}

impl OllamaEngine {
    pub fn new(base_url: &str, model: &str) -> Self {
        // Summaries are short; 120s covers cold model loads
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            state: RwLock::new(EngineState::default()),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn read(&self) -> RwLockReadGuard<'_, EngineState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, EngineState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Checks the server is reachable and has the model, then marks the
    /// engine ready. Pulling missing models is left to the user.
    pub async fn connect(&self) -> Result<(), EngineFault> {
        let result = self.check_model().await;

        let mut state = self.write();
        match &result {
            Ok(()) => {
                state.ready = true;
                state.download_progress = 1.0;
                state.error = None;
                tracing::info!(model = %self.model, base_url = %self.base_url, "Ollama model available");
            }
            Err(e) => {
                state.ready = false;
                state.error = Some(e.to_string());
                tracing::warn!(model = %self.model, error = %e, "Ollama model unavailable");
            }
        }
        result
    }

    async fn check_model(&self) -> Result<(), EngineFault> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
            .map_err(|e| EngineFault::new(format!("Failed to reach Ollama: {e}")))?;

        if !response.status().is_success() {
            return Err(EngineFault::new(format!(
                "Ollama returned {} while listing models",
                response.status()
            )));
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| EngineFault::new(format!("Invalid model list from Ollama: {e}")))?;

        if model_available(&tags, &self.model) {
            Ok(())
        } else {
            Err(EngineFault::new(format!(
                "Model '{}' is not installed. Run `ollama pull {}` first.",
                self.model, self.model
            )))
        }
    }

    /// Messages for one request: the configured system prompt and the new
    /// user message. History is kept for observers and not replayed.
    fn request_messages(&self, message: &str) -> Vec<ChatMessage> {
        let system_prompt = self.read().system_prompt.clone();
        system_prompt
            .map(ChatMessage::system)
            .into_iter()
            .chain(std::iter::once(ChatMessage::user(message)))
            .collect()
    }

    async fn stream_chat(&self, messages: Vec<ChatMessage>) -> Result<(), EngineFault> {
        let request = ChatRequest {
            model: &self.model,
            messages,
            stream: true,
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| EngineFault::new(format!("Failed to reach Ollama: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EngineFault::new(format!("Ollama returned {status}: {body}")));
        }

        let mut stream = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();
        while let Some(chunk) = stream.next().await {
            let bytes = chunk.map_err(|e| EngineFault::new(format!("Error reading stream: {e}")))?;
            buffer.extend_from_slice(&bytes);

            while let Some(newline) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=newline).collect();
                if self.apply_line(&line)? {
                    return Ok(());
                }
            }
        }

        if !buffer.is_empty() {
            self.apply_line(&buffer)?;
        }
        Ok(())
    }

    /// Applies one NDJSON line; returns true once the stream reports done.
    fn apply_line(&self, line: &[u8]) -> Result<bool, EngineFault> {
        let Some(chunk) = parse_chat_line(line)? else {
            return Ok(false);
        };

        if let Some(message) = chunk.message {
            if !message.content.is_empty() {
                let mut state = self.write();
                state.response.push_str(&message.content);
                state.token = message.content;
            }
        }
        Ok(chunk.done)
    }
}

impl Default for OllamaEngine {
    fn default() -> Self {
        Self::new(DEFAULT_OLLAMA_BASE_URL, DEFAULT_OLLAMA_MODEL)
    }
}

/// Clears the in-flight markers when a send finishes or is dropped.
struct InFlight<'a>(&'a OllamaEngine);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut state = self.0.write();
        state.generating = false;
        state.cancel = None;
    }
}

#[async_trait]
impl InferenceEngine for OllamaEngine {
    fn is_ready(&self) -> bool {
        self.read().ready
    }

    fn is_generating(&self) -> bool {
        self.read().generating
    }

    fn download_progress(&self) -> f32 {
        self.read().download_progress
    }

    fn error(&self) -> Option<String> {
        self.read().error.clone()
    }

    fn response(&self) -> String {
        self.read().response.clone()
    }

    fn message_history(&self) -> Vec<ChatMessage> {
        self.read().history.entries.iter().cloned().collect()
    }

    fn history_len(&self) -> usize {
        self.read().history.total()
    }

    fn history_since(&self, start: usize) -> Vec<ChatMessage> {
        self.read().history.since(start)
    }

    fn clear_scratch(&self) {
        let mut state = self.write();
        state.response.clear();
        state.token.clear();
    }

    fn interrupt(&self) -> Result<(), EngineFault> {
        if let Some(cancel) = self.read().cancel.as_ref() {
            tracing::debug!("Interrupting Ollama stream");
            cancel.cancel();
        }
        Ok(())
    }

    fn configure(&self, config: ChatConfig) -> Result<(), EngineFault> {
        self.write().system_prompt = config.system_prompt;
        Ok(())
    }

    async fn send_message(&self, message: &str) -> Result<(), EngineFault> {
        let cancel = {
            let mut state = self.write();
            if state.generating {
                return Err(EngineFault::new(format!(
                    "{MODEL_GENERATING}: a generation is already running"
                )));
            }
            state.generating = true;
            state.response.clear();
            state.token.clear();
            state.history.push(ChatMessage::user(message));
            let cancel = CancellationToken::new();
            state.cancel = Some(cancel.clone());
            cancel
        };
        let _in_flight = InFlight(self);

        let messages = self.request_messages(message);
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!("Ollama stream cancelled, keeping partial response");
                Ok(())
            }
            result = self.stream_chat(messages) => result,
        };

        let mut state = self.write();
        if !state.response.trim().is_empty() {
            let content = state.response.clone();
            state.history.push(ChatMessage::assistant(content));
        }
        result
    }
}

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
}

/// One line of the streamed `/api/chat` response.
#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    message: Option<ChatMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
struct ModelTag {
    name: String,
}

/// Parses one NDJSON line. Blank lines yield `None`; an `error` field
/// becomes a fault carrying the server's message.
fn parse_chat_line(line: &[u8]) -> Result<Option<ChatChunk>, EngineFault> {
    let line = line.trim_ascii();
    if line.is_empty() {
        return Ok(None);
    }

    let chunk: ChatChunk = serde_json::from_slice(line)
        .map_err(|e| EngineFault::new(format!("Invalid stream chunk from Ollama: {e}")))?;

    match chunk.error {
        Some(error) => Err(EngineFault::new(error)),
        None => Ok(Some(chunk)),
    }
}

/// Ollama lists `name:tag`; a bare model name means `:latest`.
fn model_available(tags: &TagsResponse, model: &str) -> bool {
    tags.models.iter().any(|tag| {
        tag.name == model
            || (!model.contains(':') && tag.name.strip_suffix(":latest") == Some(model))
    })
}
