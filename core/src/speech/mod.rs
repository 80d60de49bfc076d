//! Speech synthesis: narration text → transient audio artifact
//!
//! - `SpeechSynthesizer` is the provider seam (`synthesize(text, voice) -> bytes`)
//! - `CliSpeechSynthesizer` drives local engines (Piper preferred, espeak-ng fallback)
//! - `SpeechAdapter` sanitizes the script, calls the synthesizer and hands back an
//!   `AudioArtifact` whose file is deleted when the artifact is released or dropped

mod artifact;
mod cli;

pub use artifact::AudioArtifact;
pub use cli::{CliSpeechSynthesizer, SpeechConfig};

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::{Result, SemangatError};

/// A speech backend producing encoded audio for `text`
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, voice: &str) -> Result<Vec<u8>>;

    /// File extension of the produced audio (e.g., "wav")
    fn extension(&self) -> &str {
        "wav"
    }
}

/// Turns a narration script into an `AudioArtifact` on disk
#[derive(Clone)]
pub struct SpeechAdapter {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    temp_dir: PathBuf,
    voice: String,
}

impl SpeechAdapter {
    pub fn new(
        synthesizer: Arc<dyn SpeechSynthesizer>,
        temp_dir: impl Into<PathBuf>,
        voice: impl Into<String>,
    ) -> Self {
        Self {
            synthesizer,
            temp_dir: temp_dir.into(),
            voice: voice.into(),
        }
    }

    pub fn voice(&self) -> &str {
        &self.voice
    }

    /// Synthesize `script` and write it to a fresh artifact.
    ///
    /// Nothing is left on disk when this returns an error.
    pub async fn render(&self, script: &str) -> Result<AudioArtifact> {
        let text = sanitize_for_speech(script);
        if text.is_empty() {
            return Err(SemangatError::SpeechError("Script is empty after cleanup".into()));
        }

        let bytes = self.synthesizer.synthesize(&text, &self.voice).await?;
        if bytes.is_empty() {
            warn!(target = "speech", "Synthesizer returned no audio");
            return Err(SemangatError::SpeechError("Synthesizer returned no audio".into()));
        }

        let artifact =
            AudioArtifact::write(&self.temp_dir, self.synthesizer.extension(), &bytes).await?;
        debug!(
            target = "speech",
            path = ?artifact.path(),
            bytes = bytes.len(),
            "Audio artifact written"
        );
        Ok(artifact)
    }
}

/// Strip emoji, markdown and other decorative symbols so engines read only words.
pub fn sanitize_for_speech(text: &str) -> String {
    let kept: String = text
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c.is_whitespace() || ".,!?;:'\"()-%".contains(c) {
                c
            } else {
                ' '
            }
        })
        .collect();
    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}
