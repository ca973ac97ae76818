//! Application state and composition.

use std::sync::Arc;

use briefly_domain::GenerationError;

use crate::infrastructure::content_source::{ContentSourceError, UrlContentSource};
use crate::infrastructure::ports::InferenceEngine;
use crate::infrastructure::settings::AppConfig;
use crate::use_cases::generation::{GenerationCore, GenerationLock, GenerationService};
use crate::use_cases::summarize::{SummarizeText, SummaryOutcome};

/// Failure of a top-level summarize request.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Content(#[from] ContentSourceError),

    #[error(transparent)]
    Generation(#[from] GenerationError),
}

/// Main application state.
///
/// Owns the generation service and the use cases built on it.
pub struct App {
    pub generation: Arc<GenerationService>,
    pub summarize: SummarizeText,
    pub content: UrlContentSource,
}

impl App {
    pub fn new(config: &AppConfig) -> Self {
        let lock = Arc::new(GenerationLock::new());
        let core = GenerationCore::new(lock, config.core.clone());
        let generation = Arc::new(GenerationService::new(core, config.service.clone()));
        let summarize = SummarizeText::new(Arc::clone(&generation), config.workflow.clone());

        Self {
            generation,
            summarize,
            content: UrlContentSource::new(),
        }
    }

    /// Installs `engine` in the generation service.
    pub fn attach_engine(&self, engine: Arc<dyn InferenceEngine>) {
        self.generation.initialize_model(engine);
    }

    pub async fn summarize_text(&self, text: &str) -> Result<SummaryOutcome, AppError> {
        Ok(self.summarize.execute(text).await?)
    }

    pub async fn summarize_url(&self, url: &str) -> Result<SummaryOutcome, AppError> {
        let text = self.content.fetch_url_content(url).await?;
        self.summarize_text(&text).await
    }

    pub fn shutdown(&self) {
        self.generation.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::FakeEngine;

    #[tokio::test(start_paused = true)]
    async fn summarize_text_runs_through_attached_engine() {
        let app = App::new(&AppConfig::default());
        let engine = Arc::new(FakeEngine::ready());
        app.attach_engine(engine.clone());

        let outcome = app
            .summarize_text(&"word ".repeat(40))
            .await
            .expect("summary");

        assert_eq!(outcome, SummaryOutcome::Summarized("Summary 1.".into()));
        assert_eq!(engine.sent_messages().len(), 1);
    }

    #[tokio::test]
    async fn summarize_without_engine_is_not_initialized() {
        let app = App::new(&AppConfig::default());

        let result = app.summarize_text(&"word ".repeat(40)).await;

        assert!(matches!(
            result,
            Err(AppError::Generation(GenerationError::NotInitialized))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_detaches_engine() {
        let app = App::new(&AppConfig::default());
        app.attach_engine(Arc::new(FakeEngine::ready()));

        app.shutdown();

        assert!(!app.generation.is_initialized());
    }
}
