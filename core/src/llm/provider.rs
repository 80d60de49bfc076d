use async_trait::async_trait;
use thiserror::Error;

/// Structured failure returned by a generation backend.
///
/// The variant decides what the failover engine does next: quota and
/// not-found skip to the next model, permission denial aborts the whole
/// attempt, anything else skips with an error log.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenerationError {
    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Model not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Generation failed: {0}")]
    Other(String),
}

impl GenerationError {
    /// Only an authorization failure stops the model loop.
    pub fn is_fatal(&self) -> bool {
        matches!(self, GenerationError::PermissionDenied(_))
    }
}

/// A text generation backend that can enumerate its models.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Raw model identifiers as the provider reports them (may carry a `models/` prefix)
    async fn list_models(&self) -> Result<Vec<String>, GenerationError>;

    /// Run one generation call against `model` and return the raw response text
    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        temperature: f32,
    ) -> Result<String, GenerationError>;
}
