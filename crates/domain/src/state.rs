//! Observable generation state and event payloads.

use serde::{Deserialize, Serialize};

use crate::error::GenerationError;
use crate::ids::GenerationId;

/// Snapshot of the generation service as seen by UI collaborators.
///
/// `is_generating` is derived: the engine reports generating, a generation
/// is current, or a caller holds a generation session open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationState {
    pub is_ready: bool,
    pub is_generating: bool,
    /// 0.0 ..= 1.0
    pub download_progress: f32,
    pub error: Option<String>,
    pub current_generation_id: Option<GenerationId>,
}

impl Default for GenerationState {
    fn default() -> Self {
        Self {
            is_ready: false,
            is_generating: false,
            download_progress: 0.0,
            error: None,
            current_generation_id: None,
        }
    }
}

/// Emitted once when a generation settles with a summary.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationCompleted {
    pub id: GenerationId,
    pub summary: String,
}

/// Emitted once when a generation settles with a user-facing failure.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationFailed {
    pub id: GenerationId,
    pub error: GenerationError,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_is_idle() {
        let state = GenerationState::default();
        assert!(!state.is_ready);
        assert!(!state.is_generating);
        assert_eq!(state.current_generation_id, None);
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let state = GenerationState {
            is_ready: true,
            download_progress: 1.0,
            ..Default::default()
        };
        let json = serde_json::to_value(&state).expect("serialize state");
        assert_eq!(json["isReady"], true);
        assert_eq!(json["downloadProgress"], 1.0);
        assert!(json["currentGenerationId"].is_null());
    }
}
