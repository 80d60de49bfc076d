use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use super::{parse_content, ContentRequest, ContentResult, DEFAULT_TOPICS};
use crate::catalog::{CatalogHandle, ModelCatalog};
use crate::llm::{GenerationError, GenerationProvider};

/// Generation failover engine.
///
/// Walks the catalog in order, one call per model, and returns the first
/// response that satisfies the content contract. Never fails: when the
/// catalog is exhausted or access is denied it answers with
/// `ContentResult::fallback()`.
pub struct GenerationEngine {
    provider: Arc<dyn GenerationProvider>,
    catalog: CatalogHandle,
    topics: Vec<String>,
    temperature: f32,
}

impl GenerationEngine {
    pub fn new(
        provider: Arc<dyn GenerationProvider>,
        catalog: CatalogHandle,
        temperature: f32,
    ) -> Self {
        Self {
            provider,
            catalog,
            topics: DEFAULT_TOPICS.iter().map(|t| t.to_string()).collect(),
            temperature,
        }
    }

    pub fn with_topics(mut self, topics: Vec<String>) -> Self {
        if !topics.is_empty() {
            self.topics = topics;
        }
        self
    }

    pub fn catalog(&self) -> &CatalogHandle {
        &self.catalog
    }

    pub fn provider(&self) -> Arc<dyn GenerationProvider> {
        Arc::clone(&self.provider)
    }

    /// Generate content from the configured topic pool and the current catalog snapshot
    pub async fn generate(&self) -> ContentResult {
        let catalog = self.catalog.snapshot();
        self.generate_with(&self.topics, &catalog).await
    }

    /// Pick a random topic from `topics` and run the failover loop over `catalog`
    pub async fn generate_with<S: AsRef<str>>(
        &self,
        topics: &[S],
        catalog: &ModelCatalog,
    ) -> ContentResult {
        let request = ContentRequest::random(topics, self.temperature);
        self.generate_request(&request, catalog).await
    }

    /// Failover loop for one prepared request
    pub async fn generate_request(
        &self,
        request: &ContentRequest,
        catalog: &ModelCatalog,
    ) -> ContentResult {
        debug!(
            target = "engine",
            topic = %request.topic,
            models = catalog.len(),
            "Generating content"
        );

        for model in catalog.models() {
            let start = Instant::now();
            let result = self
                .provider
                .generate(&model.id, &request.prompt, request.temperature)
                .await;

            match result {
                Ok(raw) => match parse_content(&raw) {
                    Ok(content) => {
                        info!(
                            target = "engine",
                            model = %model.id,
                            topic = %request.topic,
                            latency_ms = start.elapsed().as_millis() as u64,
                            "Content generated"
                        );
                        return content;
                    }
                    Err(e) => {
                        let preview: String = raw.chars().take(200).collect();
                        error!(
                            target = "engine",
                            model = %model.id,
                            error = %e,
                            raw = %preview,
                            "Response failed validation; trying next model"
                        );
                    }
                },
                Err(GenerationError::QuotaExceeded(msg)) => {
                    warn!(
                        target = "engine",
                        model = %model.id,
                        detail = %msg,
                        "Model busy or rate limited; switching to next model"
                    );
                }
                Err(GenerationError::NotFound(msg)) => {
                    debug!(target = "engine", model = %model.id, detail = %msg, "Model not found; skipping");
                }
                Err(e @ GenerationError::PermissionDenied(_)) => {
                    error!(
                        target = "engine",
                        model = %model.id,
                        error = %e,
                        "Access denied; abandoning remaining models"
                    );
                    return ContentResult::fallback();
                }
                Err(e) => {
                    error!(target = "engine", model = %model.id, error = %e, "Generation failed; trying next model");
                }
            }
        }

        warn!(
            target = "engine",
            topic = %request.topic,
            "All models exhausted; serving fallback content"
        );
        ContentResult::fallback()
    }
}
