//! # Guard Voice - microphone and speaker adapters for the room guard
//!
//! Bounded listens on the default microphone, VAD turn detection, transcription, and
//! detached speech output.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        VoiceListener                         │
//! │  ┌────────────┐   ┌────────────┐   ┌──────────────┐          │
//! │  │  Audio In  │ → │ WebRTC VAD │ → │ TurnDetector │ → STT    │
//! │  │   (cpal)   │   │  (30ms)    │   │ (800ms gap)  │          │
//! │  └────────────┘   └────────────┘   └──────────────┘          │
//! │                                                              │
//! │  Announcer: tokio task → TTS command │ TTS API + rodio       │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod announcer;
pub mod audio;
pub mod ear;
pub mod error;
pub mod listener;
pub mod stt;
pub mod turn;
pub mod vad;
pub mod voice_output;

pub use announcer::{create_announcer, CommandAnnouncer, LogAnnouncer, PlaybackAnnouncer};
pub use audio::{AudioCapture, AudioChunk, AudioConfig};
pub use ear::{EarConfig, ListenSession, TurnSource, TurnWindow, VoiceEar};
pub use error::{VoiceError, VoiceResult};
pub use listener::{match_keyword, VoiceListener};
pub use stt::{create_stt, pcm_f32_to_wav, OpenAiCompatibleStt, PlaceholderStt, SttBackend};
#[cfg(feature = "whisper")]
pub use stt::WhisperStt;
pub use turn::{AudioTurn, TurnConfig, TurnDetector};
pub use vad::{VadConfig, VadDetector};
pub use voice_output::{OpenAiCompatibleTts, PlaceholderTts, TtsBackend, VoiceOutput};
