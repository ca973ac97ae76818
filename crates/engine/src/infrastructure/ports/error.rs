//! Error types for port operations.

/// Failure reported by an inference engine call.
///
/// Engines signal distinct conditions only through their messages, so the
/// text is kept verbatim for classification by the generation core.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct EngineFault {
    message: String,
}

impl EngineFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Fault for a capability the engine does not provide.
    pub fn unsupported(capability: &str) -> Self {
        Self::new(format!("{capability} is not supported by this engine"))
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_the_engine_message() {
        assert_eq!(EngineFault::new("ModelGenerating").to_string(), "ModelGenerating");
    }

    #[test]
    fn unsupported_names_the_capability() {
        assert!(EngineFault::unsupported("configure")
            .message()
            .contains("configure"));
    }
}
