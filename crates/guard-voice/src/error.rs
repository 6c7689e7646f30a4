//! Error types for guard voice I/O

use guard_core::GuardError;
use thiserror::Error;

/// Result type alias for voice operations
pub type VoiceResult<T> = Result<T, VoiceError>;

/// Errors that can occur while listening or speaking
#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("Audio device error: {0}")]
    AudioDevice(String),

    #[error("Audio stream error: {0}")]
    AudioStream(String),

    #[error("VAD error: {0}")]
    Vad(String),

    #[error("Audio encoding error: {0}")]
    Encoding(String),

    #[error("Audio playback error: {0}")]
    Playback(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("STT error: {0}")]
    Stt(String),

    #[error("TTS error: {0}")]
    Tts(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<cpal::DevicesError> for VoiceError {
    fn from(err: cpal::DevicesError) -> Self {
        VoiceError::AudioDevice(err.to_string())
    }
}

impl From<cpal::BuildStreamError> for VoiceError {
    fn from(err: cpal::BuildStreamError) -> Self {
        VoiceError::AudioStream(err.to_string())
    }
}

impl From<cpal::PlayStreamError> for VoiceError {
    fn from(err: cpal::PlayStreamError) -> Self {
        VoiceError::AudioStream(err.to_string())
    }
}

impl From<hound::Error> for VoiceError {
    fn from(err: hound::Error) -> Self {
        VoiceError::Encoding(err.to_string())
    }
}

/// Everything the listeners raise is transient for the guard loop, except bad configuration.
impl From<VoiceError> for GuardError {
    fn from(err: VoiceError) -> Self {
        match err {
            VoiceError::Config(msg) => GuardError::Config(msg),
            VoiceError::Tts(msg) | VoiceError::Playback(msg) => GuardError::Announcer(msg),
            other => GuardError::Listener(other.to_string()),
        }
    }
}
