//! Content module: the insight / action / script triple and how it is produced
//!
//! This module provides:
//! - `ContentResult`, the structured content contract every delivery carries
//! - `ContentRequest` and the fixed topic pool a request is drawn from
//! - `build_prompt` and `parse_content` for the single prompt and its strict response parsing
//! - `GenerationEngine`, which walks the model catalog until one response validates

mod engine;
mod parse;
mod prompt;

pub use engine::GenerationEngine;
pub use parse::{parse_content, strip_code_fences, ContentError};
pub use prompt::build_prompt;

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

/// Topics a generation request is drawn from, uniformly at random
pub const DEFAULT_TOPICS: &[&str] = &[
    "semangat hidup",
    "produktivitas",
    "bangkit dari kegagalan",
    "disiplin diri",
    "kesehatan mental",
    "manajemen waktu",
    "kebiasaan kecil yang konsisten",
    "rasa syukur",
];

/// Structured content of one delivery.
///
/// `insight` and `action` are shown in chat; `script` is narration for
/// audio only and never rendered as text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentResult {
    pub insight: String,
    pub action: String,
    pub script: String,
}

impl ContentResult {
    /// Static answer used when every model failed or access was denied
    pub fn fallback() -> Self {
        Self {
            insight: "🔥 Tetap semangat ya! Sistem AI sedang istirahat sejenak, tapi langkahmu \
                      tidak boleh ikut berhenti. 💪"
                .to_string(),
            action: "Pilih satu tugas kecil yang paling lama kamu tunda, lalu kerjakan selama \
                     10 menit sekarang juga."
                .to_string(),
            script: "Tetap semangat ya. Hari ini mungkin terasa berat, tapi setiap langkah kecil \
                     tetap membawamu maju. Tarik napas panjang, pilih satu tugas kecil, dan \
                     kerjakan selama sepuluh menit. Kamu lebih kuat dari yang kamu kira."
                .to_string(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.insight.trim().is_empty()
            && !self.action.trim().is_empty()
            && !self.script.trim().is_empty()
    }
}

/// One generation attempt: a topic, its bound prompt, and the sampling temperature
#[derive(Debug, Clone, PartialEq)]
pub struct ContentRequest {
    pub topic: String,
    pub temperature: f32,
    pub prompt: String,
}

impl ContentRequest {
    pub fn new(topic: impl Into<String>, temperature: f32) -> Self {
        let topic = topic.into();
        let prompt = build_prompt(&topic);
        Self {
            topic,
            temperature,
            prompt,
        }
    }

    /// Draw a topic uniformly from `topics`; an empty pool falls back to the defaults
    pub fn random<S: AsRef<str>>(topics: &[S], temperature: f32) -> Self {
        let mut rng = rand::thread_rng();
        let topic = match topics.choose(&mut rng) {
            Some(t) => t.as_ref().to_string(),
            None => DEFAULT_TOPICS
                .choose(&mut rng)
                .copied()
                .unwrap_or("semangat hidup")
                .to_string(),
        };
        Self::new(topic, temperature)
    }
}
