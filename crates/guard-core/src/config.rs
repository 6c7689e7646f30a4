//! Guard configuration: defaults, optional TOML file, then `GUARD__*` environment overrides.
//!
//! | Source | Precedence |
//! |--------|------------|
//! | built-in defaults | lowest |
//! | file at `GUARD_CONFIG` (default `config/guard.toml`), if it exists | |
//! | environment, prefix `GUARD`, separator `__` (e.g. `GUARD__COOLDOWN_SECS=8`) | highest |
//!
//! Secrets never come from the file: the LLM key is read from `GROQ_API_KEY`.

use crate::error::{GuardError, GuardResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// What the stop keyword does when a trusted identity is visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopAction {
    /// Stand down to voice standby.
    #[default]
    Disarm,
    /// Stand down and end the control loop.
    Shutdown,
}

/// Speech output backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnouncerKind {
    /// Spawn a local TTS program per utterance (`tts_command`).
    #[default]
    Command,
    /// OpenAI-compatible speech API, played through the default output device.
    Api,
    /// Log only.
    Silent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardConfig {
    /// Enrollment directory: one subdirectory per trusted identity, images inside.
    pub faces_dir: PathBuf,
    /// Snapshot endpoint returning one encoded frame per GET.
    pub camera_url: String,
    pub camera_timeout_ms: u64,
    /// Face-embedding service base URL.
    pub face_api_url: String,
    pub face_api_timeout_secs: u64,
    /// Maximum embedding distance for a trusted match.
    pub match_tolerance: f32,

    pub arm_phrase: String,
    pub stop_keywords: Vec<String>,
    #[serde(default)]
    pub stop_action: StopAction,

    pub silence_timeout_secs: u64,
    pub cooldown_secs: u64,
    pub command_timeout_secs: u64,
    pub command_phrase_limit_secs: u64,
    pub keyword_timeout_secs: u64,
    pub min_cycle_ms: u64,

    pub llm_api_url: String,
    pub llm_model: String,
    pub llm_timeout_secs: u64,

    pub stt_api_url: String,
    pub stt_model: String,

    #[serde(default)]
    pub announcer: AnnouncerKind,
    pub tts_command: String,
    #[serde(default)]
    pub tts_args: Vec<String>,
    pub tts_api_url: String,
    pub tts_model: String,
    pub tts_voice: String,

    /// Time given to the goodbye announcement before the process exits.
    pub shutdown_grace_secs: u64,
}

impl GuardConfig {
    /// Load from defaults, optional file, and environment.
    pub fn load() -> GuardResult<Self> {
        let path = std::env::var("GUARD_CONFIG").unwrap_or_else(|_| "config/guard.toml".to_string());
        Self::load_from(Path::new(&path))
    }

    /// Same as [`GuardConfig::load`] with an explicit file path (ignored if missing).
    pub fn load_from(path: &Path) -> GuardResult<Self> {
        let builder = config::Config::builder()
            .set_default("faces_dir", "data/faces")?
            .set_default("camera_url", "http://127.0.0.1:8080/snapshot.jpg")?
            .set_default("camera_timeout_ms", 2000_i64)?
            .set_default("face_api_url", "http://127.0.0.1:8000")?
            .set_default("face_api_timeout_secs", 5_i64)?
            .set_default("match_tolerance", 0.6_f64)?
            .set_default("arm_phrase", "activate guard")?
            .set_default("stop_keywords", vec!["stop".to_string()])?
            .set_default("stop_action", "disarm")?
            .set_default("silence_timeout_secs", 15_i64)?
            .set_default("cooldown_secs", 5_i64)?
            .set_default("command_timeout_secs", 5_i64)?
            .set_default("command_phrase_limit_secs", 4_i64)?
            .set_default("keyword_timeout_secs", 8_i64)?
            .set_default("min_cycle_ms", 1000_i64)?
            .set_default("llm_api_url", crate::synthesizer::DEFAULT_LLM_API_URL)?
            .set_default("llm_model", crate::synthesizer::DEFAULT_LLM_MODEL)?
            .set_default("llm_timeout_secs", 10_i64)?
            .set_default("stt_api_url", "https://api.groq.com/openai/v1")?
            .set_default("stt_model", "whisper-large-v3")?
            .set_default("announcer", "command")?
            .set_default("tts_command", "espeak")?
            .set_default("tts_args", Vec::<String>::new())?
            .set_default("tts_api_url", "https://api.openai.com/v1")?
            .set_default("tts_model", "tts-1")?
            .set_default("tts_voice", "onyx")?
            .set_default("shutdown_grace_secs", 3_i64)?;

        let builder = if path.exists() {
            builder.add_source(config::File::from(path))
        } else {
            builder
        };

        let built = builder
            .add_source(
                config::Environment::with_prefix("GUARD")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("stop_keywords")
                    .with_list_parse_key("tts_args")
                    .try_parsing(true),
            )
            .build()?;

        let cfg: GuardConfig = built.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> GuardResult<()> {
        if self.arm_phrase.trim().is_empty() {
            return Err(GuardError::Config("arm_phrase must not be empty".to_string()));
        }
        if self.stop_keywords.iter().all(|k| k.trim().is_empty()) {
            return Err(GuardError::Config("stop_keywords must name at least one keyword".to_string()));
        }
        if !(self.match_tolerance > 0.0) {
            return Err(GuardError::Config(format!(
                "match_tolerance must be positive, got {}",
                self.match_tolerance
            )));
        }
        Ok(())
    }

    pub fn silence_timeout(&self) -> Duration {
        Duration::from_secs(self.silence_timeout_secs)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn command_phrase_limit(&self) -> Duration {
        Duration::from_secs(self.command_phrase_limit_secs)
    }

    pub fn keyword_timeout(&self) -> Duration {
        Duration::from_secs(self.keyword_timeout_secs)
    }

    pub fn min_cycle(&self) -> Duration {
        Duration::from_millis(self.min_cycle_ms)
    }

    pub fn camera_timeout(&self) -> Duration {
        Duration::from_millis(self.camera_timeout_ms)
    }

    pub fn face_api_timeout(&self) -> Duration {
        Duration::from_secs(self.face_api_timeout_secs)
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

/// API credentials, read from the environment only.
#[derive(Clone)]
pub struct Credentials {
    /// Message synthesizer key (`GROQ_API_KEY`). Required.
    pub llm_api_key: String,
    /// Transcription key (`GUARD_STT_API_KEY`, falls back to the LLM key).
    pub stt_api_key: String,
    /// Speech key (`GUARD_TTS_API_KEY` or `OPENAI_API_KEY`); only needed for the API announcer.
    pub tts_api_key: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("llm_api_key", &"<redacted>")
            .field("stt_api_key", &"<redacted>")
            .field("tts_api_key", &self.tts_api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Credentials {
    pub fn from_env() -> GuardResult<Self> {
        let llm_api_key = env_opt_string("GROQ_API_KEY")
            .ok_or_else(|| GuardError::Config("GROQ_API_KEY environment variable not set".to_string()))?;
        let stt_api_key = env_opt_string("GUARD_STT_API_KEY").unwrap_or_else(|| llm_api_key.clone());
        let tts_api_key =
            env_opt_string("GUARD_TTS_API_KEY").or_else(|| env_opt_string("OPENAI_API_KEY"));
        Ok(Self {
            llm_api_key,
            stt_api_key,
            tts_api_key,
        })
    }
}

fn env_opt_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
