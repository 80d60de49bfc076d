use crate::{Result, SemangatError};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use super::provider::{GenerationError, GenerationProvider};

const LIST_PAGE_SIZE: u32 = 1000;

/// Configuration for GeminiClient loaded from environment variables
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub base_url: String, // e.g., https://generativelanguage.googleapis.com/v1beta
    pub api_key: String,
    pub request_timeout_ms: u64,
    pub temperature: f32,
    /// Used when model discovery fails or yields nothing usable
    pub default_model: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: std::env::var("GEMINI_BASE_URL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "https://generativelanguage.googleapis.com/v1beta".to_string()),
            api_key: std::env::var("GEMINI_API_KEY").unwrap_or_default(),
            request_timeout_ms: std::env::var("GEMINI_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(30_000),
            temperature: std::env::var("GEMINI_TEMPERATURE")
                .ok()
                .and_then(|v| v.parse::<f32>().ok())
                .unwrap_or(0.9),
            default_model: std::env::var("GEMINI_DEFAULT_MODEL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "gemini-2.0-flash".to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ListModelsResponse {
    #[serde(default)]
    models: Vec<ModelEntry>,
    #[serde(default, rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    details: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    reason: String,
}

/// `details[].reason` values meaning the key itself is unusable (reported as 400)
const KEY_REJECTED_REASONS: &[&str] = &["API_KEY_INVALID", "API_KEY_EXPIRED", "API_KEY_SERVICE_BLOCKED"];

/// HTTP client for the Gemini REST API
#[derive(Clone)]
pub struct GeminiClient {
    http: Client,
    cfg: GeminiConfig,
}

impl GeminiClient {
    pub fn new(cfg: GeminiConfig) -> Result<Self> {
        if cfg.api_key.trim().is_empty() {
            return Err(SemangatError::ConfigError("GEMINI_API_KEY is not set".into()));
        }
        let http = Client::builder()
            .timeout(Duration::from_millis(cfg.request_timeout_ms))
            .build()
            .map_err(|e| SemangatError::ProviderError(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { http, cfg })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(GeminiConfig::default())
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.cfg
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.cfg.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl GenerationProvider for GeminiClient {
    async fn list_models(&self) -> std::result::Result<Vec<String>, GenerationError> {
        let mut names = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut req = self
                .http
                .get(self.url("models"))
                .query(&[("key", self.cfg.api_key.as_str())])
                .query(&[("pageSize", LIST_PAGE_SIZE)]);
            if let Some(token) = &page_token {
                req = req.query(&[("pageToken", token.as_str())]);
            }

            let resp = req
                .send()
                .await
                .map_err(|e| GenerationError::Other(format!("List models HTTP error: {e}")))?;
            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(classify_error(status, &body));
            }

            let page: ListModelsResponse = resp.json().await.map_err(|e| {
                GenerationError::Other(format!("Failed to parse models JSON: {e}"))
            })?;
            names.extend(page.models.into_iter().map(|m| m.name));

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!(target = "gemini", count = names.len(), "Listed models");
        Ok(names)
    }

    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        temperature: f32,
    ) -> std::result::Result<String, GenerationError> {
        let url = self.url(&format!("models/{model}:generateContent"));
        debug!(target = "gemini", model = %model, "POST generateContent");

        let body = json!({
            "contents": [
                {
                    "role": "user",
                    "parts": [{ "text": prompt }]
                }
            ],
            "generationConfig": {
                "temperature": temperature,
            }
        });

        let resp = self
            .http
            .post(&url)
            .query(&[("key", self.cfg.api_key.as_str())])
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerationError::Other(format!("generateContent HTTP error: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(classify_error(status, &text));
        }

        let val: serde_json::Value = resp.json().await.map_err(|e| {
            GenerationError::Other(format!("Failed to parse generateContent JSON: {e}"))
        })?;
        extract_candidate_text(&val).ok_or_else(|| {
            GenerationError::Other("Missing candidates[0].content.parts[].text".into())
        })
    }
}

/// Map an unsuccessful HTTP response onto the provider error taxonomy.
///
/// A rejected key is reported as 400 `INVALID_ARGUMENT` with the reason in
/// `error.details`, so that is checked first. Then the status code decides;
/// the `error.status` field covers gateways that report quota or auth
/// problems as 400.
pub fn classify_error(status: StatusCode, body: &str) -> GenerationError {
    let (api_status, message, key_rejected) = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(env) => {
            let key_rejected = env
                .error
                .details
                .iter()
                .any(|d| KEY_REJECTED_REASONS.contains(&d.reason.as_str()));
            (env.error.status, env.error.message, key_rejected)
        }
        Err(_) => (String::new(), body.chars().take(200).collect(), false),
    };
    let detail = format!("{status}: {message}");
    if key_rejected {
        return GenerationError::PermissionDenied(detail);
    }

    match (status, api_status.as_str()) {
        (StatusCode::TOO_MANY_REQUESTS, _) | (_, "RESOURCE_EXHAUSTED") => {
            GenerationError::QuotaExceeded(detail)
        }
        (StatusCode::NOT_FOUND, _) | (_, "NOT_FOUND") => GenerationError::NotFound(detail),
        (StatusCode::UNAUTHORIZED, _)
        | (StatusCode::FORBIDDEN, _)
        | (_, "PERMISSION_DENIED")
        | (_, "UNAUTHENTICATED") => GenerationError::PermissionDenied(detail),
        _ => GenerationError::Other(detail),
    }
}

fn extract_candidate_text(v: &serde_json::Value) -> Option<String> {
    let parts = v
        .get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .as_array()?;
    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect();
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}
