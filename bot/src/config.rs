use std::fs;
use std::path::{Path, PathBuf};

use semangat_core::content::DEFAULT_TOPICS;
use semangat_core::{GeminiConfig, ScheduleConfig, SpeechConfig};

/// High-level configuration for the bot process
#[derive(Clone, Debug)]
pub struct BotConfig {
    pub gemini: GeminiConfig,
    pub speech: SpeechConfig,
    pub schedule: ScheduleConfig,
    pub telegram: TelegramConfig,
    /// Motivation topics drawn at random per delivery
    pub topics: Vec<String>,
}

/// Telegram Bot API settings
#[derive(Clone, Debug)]
pub struct TelegramConfig {
    pub api_url: String,
    pub token: String,
    pub poll_timeout_secs: u64,
    /// Chat allowed to run /refresh
    pub admin_chat_id: Option<i64>,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_url: std::env::var("TELEGRAM_API_URL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "https://api.telegram.org".to_string()),
            token: std::env::var("TELEGRAM_TOKEN").unwrap_or_default(),
            poll_timeout_secs: std::env::var("TELEGRAM_POLL_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(30),
            admin_chat_id: std::env::var("TELEGRAM_ADMIN_CHAT_ID")
                .ok()
                .and_then(|v| v.trim().parse::<i64>().ok()),
        }
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        // Each section reads its own env vars
        Self {
            gemini: GeminiConfig::default(),
            speech: SpeechConfig::default(),
            schedule: ScheduleConfig::default(),
            telegram: TelegramConfig::default(),
            topics: DEFAULT_TOPICS.iter().map(|t| t.to_string()).collect(),
        }
    }
}

impl BotConfig {
    /// Load configuration from a TOML file (path via SEMANGAT_CONFIG or ./semangat.toml),
    /// overlaying values onto env-driven defaults.
    pub fn load() -> Self {
        let default = Self::default();
        let path = std::env::var("SEMANGAT_CONFIG").unwrap_or_else(|_| "semangat.toml".into());
        let p = Path::new(&path);
        if !p.exists() {
            tracing::info!(target = "semangat", path = %path, "No TOML config found; using defaults/env");
            return default;
        }
        match fs::read_to_string(p) {
            Ok(s) => match toml::from_str::<BotToml>(&s) {
                Ok(t) => t.overlay(default),
                Err(e) => {
                    tracing::warn!(target = "semangat", error = %e, "Failed to parse TOML; using defaults");
                    default
                }
            },
            Err(e) => {
                tracing::warn!(target = "semangat", error = %e, "Failed to read TOML; using defaults");
                default
            }
        }
    }

    /// Names of required credentials that are still empty
    pub fn missing_credentials(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.telegram.token.trim().is_empty() {
            missing.push("TELEGRAM_TOKEN");
        }
        if self.gemini.api_key.trim().is_empty() {
            missing.push("GEMINI_API_KEY");
        }
        missing
    }
}

// =========================
// TOML overlay definitions
// =========================

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct BotToml {
    pub topics: Option<Vec<String>>,
    pub gemini: Option<GeminiToml>,
    pub speech: Option<SpeechToml>,
    pub schedule: Option<ScheduleToml>,
    pub telegram: Option<TelegramToml>,
}

impl BotToml {
    fn overlay(self, mut base: BotConfig) -> BotConfig {
        if let Some(t) = self.topics {
            let topics: Vec<String> = t
                .into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if !topics.is_empty() {
                base.topics = topics;
            }
        }
        if let Some(g) = self.gemini {
            g.apply(&mut base.gemini);
        }
        if let Some(s) = self.speech {
            s.apply(&mut base.speech);
        }
        if let Some(s) = self.schedule {
            s.apply(&mut base.schedule);
        }
        if let Some(t) = self.telegram {
            t.apply(&mut base.telegram);
        }
        base
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct GeminiToml {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub request_timeout_ms: Option<u64>,
    pub temperature: Option<f32>,
    pub default_model: Option<String>,
}
impl GeminiToml {
    fn apply(self, g: &mut GeminiConfig) {
        if let Some(x) = self.base_url {
            g.base_url = x;
        }
        if let Some(x) = self.api_key {
            g.api_key = x;
        }
        if let Some(x) = self.request_timeout_ms {
            g.request_timeout_ms = x;
        }
        if let Some(x) = self.temperature {
            g.temperature = x.clamp(0.0, 2.0);
        }
        if let Some(x) = self.default_model {
            g.default_model = x;
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct SpeechToml {
    pub temp_dir: Option<PathBuf>,
    pub timeout_ms: Option<u64>,
    pub voice: Option<String>,
    pub rate: Option<f32>,
    pub piper_bin: Option<PathBuf>,
    pub piper_voice: Option<PathBuf>,
    pub piper_voice_dir: Option<PathBuf>,
    pub espeak_bin: Option<PathBuf>,
}
impl SpeechToml {
    fn apply(self, s: &mut SpeechConfig) {
        if let Some(x) = self.temp_dir {
            s.temp_dir = x;
        }
        if let Some(x) = self.timeout_ms {
            s.timeout_ms = x;
        }
        if let Some(x) = self.voice {
            s.voice = x;
        }
        if let Some(x) = self.rate {
            s.rate = x.clamp(0.5, 2.0);
        }
        if let Some(x) = self.piper_bin {
            s.piper_bin = Some(x);
        }
        if let Some(x) = self.piper_voice {
            s.piper_voice = Some(x);
        }
        if let Some(x) = self.piper_voice_dir {
            s.piper_voice_dir = Some(x);
        }
        if let Some(x) = self.espeak_bin {
            s.espeak_bin = Some(x);
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct ScheduleToml {
    pub utc_offset_hours: Option<i32>,
}
impl ScheduleToml {
    fn apply(self, s: &mut ScheduleConfig) {
        if let Some(x) = self.utc_offset_hours {
            s.utc_offset_hours = x;
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct TelegramToml {
    pub api_url: Option<String>,
    pub token: Option<String>,
    pub poll_timeout_secs: Option<u64>,
    pub admin_chat_id: Option<i64>,
}
impl TelegramToml {
    fn apply(self, t: &mut TelegramConfig) {
        if let Some(x) = self.api_url {
            t.api_url = x;
        }
        if let Some(x) = self.token {
            t.token = x;
        }
        if let Some(x) = self.poll_timeout_secs {
            t.poll_timeout_secs = x;
        }
        if let Some(x) = self.admin_chat_id {
            t.admin_chat_id = Some(x);
        }
    }
}
