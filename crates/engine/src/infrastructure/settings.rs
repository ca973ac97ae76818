//! Environment-driven application configuration.
//!
//! Values come from the process environment (after `.env` files have been
//! loaded by the binary). Anything missing uses the built-in default; an
//! unparseable value is logged and replaced by the default.

use std::str::FromStr;

use crate::infrastructure::ollama::{DEFAULT_OLLAMA_BASE_URL, DEFAULT_OLLAMA_MODEL};
use crate::use_cases::generation::{CoreConfig, ServiceConfig};
use crate::use_cases::summarize::WorkflowConfig;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Chunk overlap ({overlap}) must be smaller than chunk size ({chunk_size})")]
    OverlapTooLarge { overlap: usize, chunk_size: usize },

    #[error("{name} must be greater than zero")]
    Zero { name: &'static str },
}

/// Everything the binary needs to wire the engine.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub ollama_base_url: String,
    pub ollama_model: String,
    pub core: CoreConfig,
    pub service: ServiceConfig,
    pub workflow: WorkflowConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ollama_base_url: DEFAULT_OLLAMA_BASE_URL.to_string(),
            ollama_model: DEFAULT_OLLAMA_MODEL.to_string(),
            core: CoreConfig::default(),
            service: ServiceConfig::default(),
            workflow: WorkflowConfig::default(),
        }
    }
}

impl AppConfig {
    /// Reads `OLLAMA_BASE_URL`, `OLLAMA_MODEL` and the `BRIEFLY_*` limits.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let ollama_base_url = lookup("OLLAMA_BASE_URL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(defaults.ollama_base_url);
        let ollama_model = lookup("OLLAMA_MODEL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(defaults.ollama_model);

        let workflow = WorkflowConfig {
            chunk_size: parse_or_default(
                &lookup,
                "BRIEFLY_MAX_CHUNK_SIZE",
                defaults.workflow.chunk_size,
            ),
            chunk_overlap: parse_or_default(
                &lookup,
                "BRIEFLY_CHUNK_OVERLAP",
                defaults.workflow.chunk_overlap,
            ),
            max_chunks: parse_or_default(&lookup, "BRIEFLY_MAX_CHUNKS", defaults.workflow.max_chunks),
            max_input_chars: parse_or_default(
                &lookup,
                "BRIEFLY_MAX_INPUT_CHARS",
                defaults.workflow.max_input_chars,
            ),
            ..defaults.workflow
        };

        let config = Self {
            ollama_base_url,
            ollama_model,
            workflow,
            ..defaults
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let workflow = &self.workflow;
        if workflow.chunk_size == 0 {
            return Err(ConfigError::Zero {
                name: "BRIEFLY_MAX_CHUNK_SIZE",
            });
        }
        if workflow.max_chunks == 0 {
            return Err(ConfigError::Zero {
                name: "BRIEFLY_MAX_CHUNKS",
            });
        }
        if workflow.chunk_overlap >= workflow.chunk_size {
            return Err(ConfigError::OverlapTooLarge {
                overlap: workflow.chunk_overlap,
                chunk_size: workflow.chunk_size,
            });
        }
        Ok(())
    }
}

fn parse_or_default<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Display,
{
    let Some(raw) = lookup(key) else {
        return default;
    };
    match raw.trim().parse() {
        Ok(value) => value,
        Err(_) => {
            tracing::warn!(key, value = %raw, default = %default, "Invalid configuration value, using default");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let config = AppConfig::from_lookup(lookup(&[])).expect("config");
        assert_eq!(config.ollama_base_url, DEFAULT_OLLAMA_BASE_URL);
        assert_eq!(config.ollama_model, DEFAULT_OLLAMA_MODEL);
        assert_eq!(config.workflow.chunk_size, 4000);
        assert_eq!(config.workflow.chunk_overlap, 100);
        assert_eq!(config.workflow.max_chunks, 6);
        assert_eq!(config.workflow.max_input_chars, 100 * 1024);
    }

    #[test]
    fn environment_overrides_are_applied() {
        let config = AppConfig::from_lookup(lookup(&[
            ("OLLAMA_BASE_URL", "http://gpu-box:11434"),
            ("OLLAMA_MODEL", "qwen2.5:7b"),
            ("BRIEFLY_MAX_CHUNK_SIZE", "2000"),
            ("BRIEFLY_CHUNK_OVERLAP", "50"),
            ("BRIEFLY_MAX_CHUNKS", "3"),
        ]))
        .expect("config");

        assert_eq!(config.ollama_base_url, "http://gpu-box:11434");
        assert_eq!(config.ollama_model, "qwen2.5:7b");
        assert_eq!(config.workflow.chunk_size, 2000);
        assert_eq!(config.workflow.chunk_overlap, 50);
        assert_eq!(config.workflow.max_chunks, 3);
    }

    #[test]
    fn unparseable_values_fall_back_to_defaults() {
        let config = AppConfig::from_lookup(lookup(&[
            ("BRIEFLY_MAX_CHUNK_SIZE", "lots"),
            ("BRIEFLY_MAX_CHUNKS", "-1"),
        ]))
        .expect("config");

        assert_eq!(config.workflow.chunk_size, 4000);
        assert_eq!(config.workflow.max_chunks, 6);
    }

    #[test]
    fn overlap_not_smaller_than_chunk_size_is_rejected() {
        let result = AppConfig::from_lookup(lookup(&[
            ("BRIEFLY_MAX_CHUNK_SIZE", "100"),
            ("BRIEFLY_CHUNK_OVERLAP", "100"),
        ]));

        assert_eq!(
            result.err(),
            Some(ConfigError::OverlapTooLarge {
                overlap: 100,
                chunk_size: 100
            })
        );
    }

    #[test]
    fn zero_chunk_count_is_rejected() {
        let result = AppConfig::from_lookup(lookup(&[("BRIEFLY_MAX_CHUNKS", "0")]));
        assert!(matches!(result, Err(ConfigError::Zero { .. })));
    }
}
