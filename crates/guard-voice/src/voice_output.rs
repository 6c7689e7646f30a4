//! **VoiceOutput**: synthesized speech playback.
//!
//! `TtsBackend` turns text into encoded audio; `VoiceOutput` plays it on the default
//! output device through a `rodio::Sink`.

use crate::error::{VoiceError, VoiceResult};
use rodio::{OutputStream, OutputStreamHandle, Sink, Source};
use std::io::Cursor;
use std::time::Duration;
use tracing::debug;

/// Turns text into audio bytes (WAV/MP3).
pub trait TtsBackend: Send + Sync {
    /// Return an empty vec to skip playback.
    fn synthesize(&self, text: &str) -> VoiceResult<Vec<u8>>;
}

/// Returns empty audio so nothing plays.
#[derive(Debug, Default)]
pub struct PlaceholderTts;

impl TtsBackend for PlaceholderTts {
    fn synthesize(&self, _text: &str) -> VoiceResult<Vec<u8>> {
        Ok(Vec::new())
    }
}

/// OpenAI-compatible speech API (`POST {base_url}/audio/speech`).
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleTts {
    /// Base URL without trailing slash (e.g. https://api.openai.com/v1).
    pub base_url: String,
    api_key: String,
    /// tts-1 (fast) or tts-1-hd.
    pub model: String,
    /// alloy, echo, fable, onyx, nova, shimmer.
    pub voice: String,
    client: reqwest::blocking::Client,
}

impl OpenAiCompatibleTts {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> VoiceResult<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(VoiceError::Config("TTS requires an API key".to_string()));
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VoiceError::Tts(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into(),
            api_key,
            model: model.into(),
            voice: "onyx".to_string(),
            client,
        })
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = voice.into();
        self
    }

    fn request_body(&self, text: &str) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "input": text,
            "voice": self.voice,
        })
    }
}

impl TtsBackend for OpenAiCompatibleTts {
    fn synthesize(&self, text: &str) -> VoiceResult<Vec<u8>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/audio/speech", self.base_url.trim_end_matches('/'));
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(text))
            .send()
            .map_err(|e| VoiceError::Tts(e.to_string()))?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().unwrap_or_default();
            return Err(VoiceError::Tts(format!("TTS API error {}: {}", status, body)));
        }
        let bytes = res.bytes().map_err(|e| VoiceError::Tts(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// Playback on the default output device. Not `Send`: create it on the thread that plays.
pub struct VoiceOutput {
    _stream: OutputStream,
    _stream_handle: OutputStreamHandle,
    sink: Sink,
}

impl VoiceOutput {
    pub fn new() -> VoiceResult<Self> {
        let (stream, stream_handle) =
            OutputStream::try_default().map_err(|e| VoiceError::Playback(e.to_string()))?;
        let sink = Sink::try_new(&stream_handle).map_err(|e| VoiceError::Playback(e.to_string()))?;
        debug!("VoiceOutput: sink ready");
        Ok(Self {
            _stream: stream,
            _stream_handle: stream_handle,
            sink,
        })
    }

    /// Queue encoded audio bytes (WAV/MP3).
    pub fn play_bytes(&self, bytes: Vec<u8>) -> VoiceResult<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        let source = rodio::Decoder::new(Cursor::new(bytes))
            .map_err(|e| VoiceError::Playback(format!("Decode failed: {}", e)))?;
        self.sink.append(source.convert_samples::<f32>());
        Ok(())
    }

    /// Synthesize through `tts`, play, and block until playback ends.
    pub fn speak_blocking(&self, text: &str, tts: &dyn TtsBackend) -> VoiceResult<()> {
        let bytes = tts.synthesize(text)?;
        self.play_bytes(bytes)?;
        self.sink.sleep_until_end();
        Ok(())
    }

    /// Stop playback and clear the queue.
    pub fn stop(&self) {
        self.sink.stop();
    }

    pub fn is_playing(&self) -> bool {
        !self.sink.empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_tts_returns_empty() {
        assert!(PlaceholderTts.synthesize("hello").unwrap().is_empty());
    }

    #[test]
    fn tts_requires_key() {
        let err = OpenAiCompatibleTts::new("http://localhost", "", "tts-1", Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, VoiceError::Config(_)));
    }

    #[test]
    fn tts_request_uses_configured_voice() {
        let tts = OpenAiCompatibleTts::new("http://localhost", "k", "tts-1", Duration::from_secs(1))
            .unwrap()
            .with_voice("nova");
        let body = tts.request_body("Who are you?");
        assert_eq!(body["model"], "tts-1");
        assert_eq!(body["voice"], "nova");
        assert_eq!(body["input"], "Who are you?");
        // Blank text never reaches the network.
        assert!(tts.synthesize("   ").unwrap().is_empty());
    }
}
