//! Local CLI speech engines with graceful degradation:
//! - Prefer Piper (higher quality, requires a voice model)
//! - Fallback to espeak-ng (widely available)
//! - If neither is present, synthesis fails and delivery goes out text-only
//!
//! Env overrides:
//! - PIPER_BIN, PIPER_VOICE, PIPER_VOICE_DIR
//! - ESPEAK_BIN
//! - TTS_VOICE, TTS_RATE, TTS_TIMEOUT_MS, TTS_TEMP_DIR

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};

use super::SpeechSynthesizer;
use crate::{Result, SemangatError};

#[derive(Clone, Debug)]
pub struct SpeechConfig {
    pub temp_dir: PathBuf,
    pub timeout_ms: u64,
    /// espeak voice code (e.g., "id"), or a Piper model path / name under `piper_voice_dir`
    pub voice: String,
    pub rate: f32,
    pub piper_bin: Option<PathBuf>,
    /// Piper model used when `voice` does not resolve to one
    pub piper_voice: Option<PathBuf>,
    pub piper_voice_dir: Option<PathBuf>,
    pub espeak_bin: Option<PathBuf>,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        let temp_dir = std::env::var("TTS_TEMP_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| std::env::temp_dir());
        let timeout_ms = std::env::var("TTS_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(60_000);
        let voice = std::env::var("TTS_VOICE")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "id".to_string());
        let rate = std::env::var("TTS_RATE")
            .ok()
            .and_then(|s| s.parse::<f32>().ok())
            .map(|v| v.clamp(0.5, 2.0))
            .unwrap_or(1.0);

        let piper_bin = get_from_env_or_path("PIPER_BIN", "piper");
        let piper_voice = std::env::var("PIPER_VOICE").ok().map(PathBuf::from);
        let piper_voice_dir = std::env::var("PIPER_VOICE_DIR").ok().map(PathBuf::from);
        let espeak_bin =
            get_from_env_or_path("ESPEAK_BIN", "espeak-ng").or_else(|| get_from_path("espeak"));

        Self {
            temp_dir,
            timeout_ms,
            voice,
            rate,
            piper_bin,
            piper_voice,
            piper_voice_dir,
            espeak_bin,
        }
    }
}

fn get_from_env_or_path(env_key: &str, default_bin: &str) -> Option<PathBuf> {
    if let Ok(p) = std::env::var(env_key) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return Some(pb);
        }
    }
    get_from_path(default_bin)
}

fn get_from_path(bin: &str) -> Option<PathBuf> {
    if bin.contains(std::path::MAIN_SEPARATOR) {
        let p = PathBuf::from(bin);
        return if p.exists() { Some(p) } else { None };
    }
    which::which(bin).ok()
}

/// Executable lookup restricted to an explicit PATH-style list
fn find_in_paths(bin: &str, paths: &OsStr) -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    which::which_in(bin, Some(paths), cwd).ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Engine {
    Piper,
    Espeak,
    None,
}

impl Engine {
    fn as_str(&self) -> &'static str {
        match self {
            Engine::Piper => "piper",
            Engine::Espeak => "espeak-ng",
            Engine::None => "none",
        }
    }
}

/// Synthesizes WAV audio through a local speech binary
pub struct CliSpeechSynthesizer {
    cfg: SpeechConfig,
}

impl CliSpeechSynthesizer {
    pub fn new(cfg: Option<SpeechConfig>) -> Self {
        let cfg = cfg.unwrap_or_default();
        // Log detected engines once
        if let Some(ref p) = cfg.piper_bin {
            info!(target = "speech", bin = ?p, "Detected Piper binary");
        }
        if let Some(ref e) = cfg.espeak_bin {
            info!(target = "speech", bin = ?e, "Detected espeak-ng binary");
        }
        Self { cfg }
    }

    pub fn config(&self) -> &SpeechConfig {
        &self.cfg
    }
}

#[async_trait]
impl SpeechSynthesizer for CliSpeechSynthesizer {
    async fn synthesize(&self, text: &str, voice: &str) -> Result<Vec<u8>> {
        let engine = select_engine(&self.cfg, voice);
        if engine == Engine::None {
            warn!(
                target = "speech",
                "No TTS engine detected (Piper/espeak-ng missing); skipping audio"
            );
            return Err(SemangatError::SpeechError("No TTS engine available".into()));
        }

        // Scratch WAV is removed when `scratch` drops
        let scratch = tempfile::Builder::new()
            .prefix("semangat_synth_")
            .suffix(".wav")
            .tempfile_in(&self.cfg.temp_dir)?
            .into_temp_path();

        // On timeout the run future is dropped and kill_on_drop reaps the child
        let run = async {
            match engine {
                Engine::Piper => synth_with_piper(&self.cfg, voice, text, &scratch).await,
                Engine::Espeak => synth_with_espeak(&self.cfg, voice, text, &scratch).await,
                Engine::None => Ok(()),
            }
        };
        match timeout(Duration::from_millis(self.cfg.timeout_ms), run).await {
            Ok(res) => res?,
            Err(_) => {
                return Err(SemangatError::SpeechError(format!(
                    "{} timed out after {}ms",
                    engine.as_str(),
                    self.cfg.timeout_ms
                )))
            }
        }

        let bytes = tokio::fs::read(&scratch).await?;
        debug!(
            target = "speech",
            engine = engine.as_str(),
            bytes = bytes.len(),
            "Synthesis finished"
        );
        Ok(bytes)
    }
}

fn select_engine(cfg: &SpeechConfig, voice: &str) -> Engine {
    if cfg.piper_bin.is_some() && resolve_piper_voice_path(cfg, voice).is_some() {
        return Engine::Piper;
    }
    if cfg.espeak_bin.is_some() {
        return Engine::Espeak;
    }
    Engine::None
}

/// A voice that names an existing model file (directly or under `piper_voice_dir`)
/// wins; otherwise the configured `piper_voice` is used.
fn resolve_piper_voice_path(cfg: &SpeechConfig, voice: &str) -> Option<PathBuf> {
    if !voice.is_empty() {
        let direct = PathBuf::from(voice);
        if direct.is_file() {
            return Some(direct);
        }
        if let Some(dir) = &cfg.piper_voice_dir {
            let candidate = dir.join(voice);
            if candidate.is_file() {
                return Some(candidate);
            }
            for ext in ["onnx", "onnx.gz"] {
                let c = dir.join(format!("{voice}.{ext}"));
                if c.is_file() {
                    return Some(c);
                }
            }
        }
    }
    cfg.piper_voice.clone()
}

async fn synth_with_piper(cfg: &SpeechConfig, voice: &str, text: &str, out_wav: &Path) -> Result<()> {
    let piper = cfg
        .piper_bin
        .as_ref()
        .ok_or_else(|| SemangatError::SpeechError("Piper binary not found".into()))?;
    let voice_path = resolve_piper_voice_path(cfg, voice).ok_or_else(|| {
        SemangatError::SpeechError("Piper voice not found; set PIPER_VOICE or PIPER_VOICE_DIR".into())
    })?;

    let mut cmd = Command::new(piper);
    cmd.arg("-m").arg(&voice_path);
    cmd.arg("-f").arg(out_wav);
    let length_scale = (1.0f32 / cfg.rate).clamp(0.5, 2.0);
    cmd.arg("--length_scale").arg(format!("{:.2}", length_scale));
    cmd.stdin(Stdio::piped());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd.kill_on_drop(true);

    debug!(target = "speech", command = ?cmd, "Running piper");
    let mut child = cmd.spawn()?;
    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(text.as_bytes()).await?;
        // closing stdin ends piper's input
        drop(stdin);
    }
    let output = child.wait_with_output().await?;
    if !output.status.success() {
        return Err(SemangatError::SpeechError(format!(
            "Piper failed: {}",
            String::from_utf8_lossy(&output.stderr)
        )));
    }
    Ok(())
}

async fn synth_with_espeak(cfg: &SpeechConfig, voice: &str, text: &str, out_wav: &Path) -> Result<()> {
    let espeak = cfg
        .espeak_bin
        .as_ref()
        .ok_or_else(|| SemangatError::SpeechError("espeak-ng not found".into()))?;
    let mut cmd = Command::new(espeak);
    let wpm = (160.0 * cfg.rate).round().clamp(80.0, 450.0) as i32;
    if !voice.is_empty() {
        cmd.arg("-v").arg(voice);
    }
    cmd.arg("-s").arg(wpm.to_string());
    cmd.arg("-w").arg(out_wav);
    cmd.arg(text);
    cmd.stdout(Stdio::null());
    cmd.stderr(Stdio::piped());
    cmd.kill_on_drop(true);
    debug!(target = "speech", command = ?cmd, "Running espeak-ng");
    let output = cmd.output().await?;
    if !output.status.success() {
        return Err(SemangatError::SpeechError(format!(
            "espeak-ng failed: {}",
            String::from_utf8_lossy(&output.stderr)
        )));
    }
    Ok(())
}
