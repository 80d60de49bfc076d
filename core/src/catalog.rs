//! Model catalog: discovery, filtering and priority ordering of generation backends.
//!
//! The catalog is rebuilt wholesale on every refresh and published by swapping
//! an `Arc`, so readers always hold a complete snapshot.

use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::llm::GenerationProvider;

/// Name fragments of models that cannot produce plain text.
const NON_TEXT_MARKERS: &[&str] = &["audio", "speech", "tts", "image", "embedding"];
const FAST_KEYWORD: &str = "flash";
const CAPABLE_KEYWORD: &str = "pro";
const VISION_MARKER: &str = "vision";

/// Priority group of a model, derived from its identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ModelTier {
    Fast,
    Capable,
    Other,
}

impl ModelTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelTier::Fast => "fast-tier",
            ModelTier::Capable => "capable-tier",
            ModelTier::Other => "other",
        }
    }

    /// Fast keyword wins over capable; vision variants never join either.
    pub fn classify(id: &str) -> Self {
        let lower = id.to_lowercase();
        if lower.contains(VISION_MARKER) {
            return ModelTier::Other;
        }
        if lower.contains(FAST_KEYWORD) {
            ModelTier::Fast
        } else if lower.contains(CAPABLE_KEYWORD) {
            ModelTier::Capable
        } else {
            ModelTier::Other
        }
    }
}

/// A discovered generation backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub id: String,
    pub tier: ModelTier,
}

impl ModelDescriptor {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        let tier = ModelTier::classify(&id);
        Self { id, tier }
    }
}

/// Priority-ordered, immutable list of usable models
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelCatalog {
    models: Vec<ModelDescriptor>,
    degraded: bool,
}

impl ModelCatalog {
    /// Build a catalog from raw provider identifiers.
    ///
    /// Strips namespace prefixes, drops non-text models and duplicates, then
    /// orders fast → capable → other keeping the listing order within a tier.
    /// Returns `None` when nothing usable remains.
    pub fn from_identifiers<I, S>(ids: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut models: Vec<ModelDescriptor> = Vec::new();
        for raw in ids {
            let name = strip_namespace(raw.as_ref().trim());
            if name.is_empty() || is_non_text(name) {
                continue;
            }
            if models.iter().any(|m| m.id == name) {
                continue;
            }
            models.push(ModelDescriptor::new(name));
        }
        if models.is_empty() {
            return None;
        }
        // stable sort keeps discovery order within each tier
        models.sort_by_key(|m| m.tier);
        Some(Self {
            models,
            degraded: false,
        })
    }

    /// Single-entry catalog used whenever discovery cannot produce one
    pub fn fallback(default_model: &str) -> Self {
        Self {
            models: vec![ModelDescriptor::new(strip_namespace(default_model))],
            degraded: true,
        }
    }

    /// Query the provider and build a fresh catalog. Never fails: any provider
    /// error or an empty usable set yields the single-entry fallback.
    pub async fn discover(provider: &dyn GenerationProvider, default_model: &str) -> Self {
        match provider.list_models().await {
            Ok(ids) => {
                let listed = ids.len();
                match Self::from_identifiers(ids) {
                    Some(catalog) => {
                        info!(
                            target = "catalog",
                            listed,
                            usable = catalog.len(),
                            "Model catalog built"
                        );
                        catalog
                    }
                    None => {
                        warn!(
                            target = "catalog",
                            listed,
                            fallback = %default_model,
                            "No usable text models listed; using fallback catalog"
                        );
                        Self::fallback(default_model)
                    }
                }
            }
            Err(e) => {
                warn!(
                    target = "catalog",
                    error = %e,
                    fallback = %default_model,
                    "Model discovery failed; using fallback catalog"
                );
                Self::fallback(default_model)
            }
        }
    }

    pub fn models(&self) -> &[ModelDescriptor] {
        &self.models
    }

    pub fn ids(&self) -> Vec<&str> {
        self.models.iter().map(|m| m.id.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// True when this catalog is the hardcoded fallback rather than a discovery result
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }
}

/// Process-wide, replace-by-reference holder of the current catalog
#[derive(Debug, Clone)]
pub struct CatalogHandle {
    current: Arc<RwLock<Arc<ModelCatalog>>>,
    default_model: String,
}

impl CatalogHandle {
    /// Start with the fallback catalog until the first refresh publishes a real one
    pub fn new(default_model: impl Into<String>) -> Self {
        let default_model = default_model.into();
        Self {
            current: Arc::new(RwLock::new(Arc::new(ModelCatalog::fallback(&default_model)))),
            default_model,
        }
    }

    /// Current snapshot; later refreshes never mutate it
    pub fn snapshot(&self) -> Arc<ModelCatalog> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&*guard),
            Err(poisoned) => Arc::clone(&*poisoned.into_inner()),
        }
    }

    /// Rediscover models and publish the result. Safe to call repeatedly;
    /// nothing from the previous catalog carries over.
    pub async fn refresh(&self, provider: &dyn GenerationProvider) -> Arc<ModelCatalog> {
        let fresh = Arc::new(ModelCatalog::discover(provider, &self.default_model).await);
        self.publish(Arc::clone(&fresh));
        fresh
    }

    pub fn publish(&self, catalog: Arc<ModelCatalog>) {
        match self.current.write() {
            Ok(mut guard) => *guard = catalog,
            Err(poisoned) => *poisoned.into_inner() = catalog,
        }
    }
}

fn strip_namespace(id: &str) -> &str {
    id.rsplit_once('/').map(|(_, name)| name).unwrap_or(id)
}

fn is_non_text(name: &str) -> bool {
    let lower = name.to_lowercase();
    NON_TEXT_MARKERS.iter().any(|m| lower.contains(m))
}
