//! **Speech-to-Text (STT)**: turn an `AudioTurn` into text for the listeners.
//!
//! Implement `SttBackend` for local Whisper (whisper-rs) or a remote OpenAI-compatible
//! transcription endpoint (Groq, OpenAI).

use crate::error::{VoiceError, VoiceResult};
use crate::turn::AudioTurn;
use guard_core::{Credentials, GuardConfig};
use std::io::Cursor;
use std::time::Duration;
use tracing::{debug, info};

/// Backend for converting PCM (AudioTurn) to text.
pub trait SttBackend: Send + Sync {
    /// Transcribe one turn. PCM is 16kHz mono f32; return empty string if nothing was said.
    fn transcribe_turn(&self, turn: &AudioTurn) -> VoiceResult<String>;
}

/// Encode f32 PCM (mono) to 16-bit WAV bytes for upload.
pub fn pcm_f32_to_wav(samples: &[f32], sample_rate: u32) -> VoiceResult<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::with_capacity(44 + samples.len() * 2));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for &s in samples {
            writer.write_sample((s.clamp(-1.0, 1.0) * 32767.0).round() as i16)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

/// Placeholder STT: returns a fixed string (empty by default). Lets the guard run
/// without a transcription service; every listen then comes back unintelligible.
#[derive(Debug, Default)]
pub struct PlaceholderStt {
    /// If set, return this for every turn.
    pub response: Option<String>,
}

impl PlaceholderStt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(s: impl Into<String>) -> Self {
        Self {
            response: Some(s.into()),
        }
    }
}

impl SttBackend for PlaceholderStt {
    fn transcribe_turn(&self, turn: &AudioTurn) -> VoiceResult<String> {
        debug!(samples = turn.samples.len(), "Placeholder STT skipped a turn");
        Ok(self.response.clone().unwrap_or_default())
    }
}

/// OpenAI-compatible transcription API (`POST {base_url}/audio/transcriptions`).
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleStt {
    /// Base URL without trailing slash (e.g. https://api.groq.com/openai/v1).
    pub base_url: String,
    api_key: String,
    /// Model: whisper-large-v3, whisper-1, etc.
    pub model: String,
    client: reqwest::blocking::Client,
}

impl OpenAiCompatibleStt {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> VoiceResult<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(VoiceError::Config("STT requires an API key".to_string()));
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VoiceError::Stt(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into(),
            api_key,
            model: model.into(),
            client,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/audio/transcriptions", self.base_url.trim_end_matches('/'))
    }
}

impl SttBackend for OpenAiCompatibleStt {
    fn transcribe_turn(&self, turn: &AudioTurn) -> VoiceResult<String> {
        if turn.samples.is_empty() {
            return Ok(String::new());
        }
        let wav = pcm_f32_to_wav(&turn.samples, turn.sample_rate)?;
        let part = reqwest::blocking::multipart::Part::bytes(wav)
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| VoiceError::Stt(e.to_string()))?;
        let form = reqwest::blocking::multipart::Form::new()
            .part("file", part)
            .text("model", self.model.clone())
            .text("language", "en");
        let res = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .map_err(|e| VoiceError::Stt(e.to_string()))?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().unwrap_or_default();
            return Err(VoiceError::Stt(format!("STT API error {}: {}", status, body)));
        }
        let json: serde_json::Value = res.json().map_err(|e| VoiceError::Stt(e.to_string()))?;
        let text = json
            .get("text")
            .and_then(|t| t.as_str())
            .unwrap_or("")
            .trim()
            .to_string();
        Ok(text)
    }
}

// Local Whisper STT (optional feature). Requires whisper.cpp/ggml at build time.
#[cfg(feature = "whisper")]
mod whisper_stt {
    use super::*;
    use std::sync::Mutex;
    use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

    /// Local Whisper STT over a ggml model (e.g. ggml-base.en.bin). Audio must be 16 kHz mono.
    pub struct WhisperStt {
        #[allow(dead_code)]
        context: WhisperContext,
        state: Mutex<whisper_rs::WhisperState>,
    }

    impl WhisperStt {
        pub fn new(model_path: &str) -> VoiceResult<Self> {
            let params = WhisperContextParameters::default();
            let context = WhisperContext::new_with_params(model_path, params)
                .map_err(|e| VoiceError::Stt(format!("Whisper load failed: {}", e)))?;
            let state = context
                .create_state()
                .map_err(|e| VoiceError::Stt(format!("Whisper state init failed: {}", e)))?;
            Ok(Self {
                context,
                state: Mutex::new(state),
            })
        }
    }

    impl SttBackend for WhisperStt {
        fn transcribe_turn(&self, turn: &AudioTurn) -> VoiceResult<String> {
            if turn.samples.is_empty() {
                return Ok(String::new());
            }
            if turn.sample_rate != 16000 {
                return Err(VoiceError::Stt(format!(
                    "Whisper expects 16 kHz, got {} Hz",
                    turn.sample_rate
                )));
            }
            let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
            params.set_print_progress(false);
            params.set_print_realtime(false);
            params.set_no_timestamps(true);
            params.set_language(Some("en"));

            let mut state = self
                .state
                .lock()
                .map_err(|e| VoiceError::Stt(format!("Whisper lock poisoned: {}", e)))?;
            state
                .full(&params, &turn.samples)
                .map_err(|e| VoiceError::Stt(format!("Whisper inference failed: {}", e)))?;
            let text = state
                .as_iter()
                .filter_map(|seg| seg.to_str().ok())
                .collect::<Vec<_>>()
                .join(" ")
                .trim()
                .to_string();
            Ok(text)
        }
    }
}

#[cfg(feature = "whisper")]
pub use whisper_stt::WhisperStt;

/// Pick the transcription backend.
///
/// Priority: (1) `WhisperStt` when built with `whisper` and `WHISPER_MODEL_PATH` loads,
/// (2) the configured OpenAI-compatible endpoint, (3) `PlaceholderStt`.
pub fn create_stt(config: &GuardConfig, credentials: &Credentials) -> VoiceResult<Box<dyn SttBackend>> {
    #[cfg(feature = "whisper")]
    {
        if let Ok(path) = std::env::var("WHISPER_MODEL_PATH") {
            let path = path.trim();
            if !path.is_empty() {
                match whisper_stt::WhisperStt::new(path) {
                    Ok(w) => {
                        info!(model = path, "Using local Whisper STT");
                        return Ok(Box::new(w));
                    }
                    Err(e) => tracing::warn!("Whisper unavailable, falling back: {}", e),
                }
            }
        }
    }
    if config.stt_api_url.trim().is_empty() {
        info!("No STT endpoint configured, voice commands disabled");
        return Ok(Box::new(PlaceholderStt::new()));
    }
    let stt = OpenAiCompatibleStt::new(
        config.stt_api_url.clone(),
        credentials.stt_api_key.clone(),
        config.stt_model.clone(),
        config.llm_timeout(),
    )?;
    info!(model = %stt.model, "Using remote STT");
    Ok(Box::new(stt))
}
