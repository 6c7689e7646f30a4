//! **The Ear**: bounded microphone listens.
//!
//! A [`ListenSession`] opens the default input device, classifies 30ms frames with the
//! VAD, and hands back phrases as they are committed. The device is released when the
//! session drops, so each listen call holds the microphone only for its own window.

use crate::audio::{AudioCapture, AudioChunk, AudioConfig};
use crate::error::VoiceResult;
use crate::turn::{AudioTurn, TurnConfig, TurnDetector};
use crate::vad::{VadConfig, VadDetector};
use cpal::Stream;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Configuration for the Ear.
#[derive(Debug, Clone)]
pub struct EarConfig {
    /// Sample rate (default 16000). Must be a WebRTC VAD rate.
    pub sample_rate: u32,
    /// VAD aggressiveness 0-3 (default 2).
    pub vad_mode: u8,
    /// Silence after speech that ends a phrase (default 800ms).
    pub gap_ms: u64,
    /// Minimum speech to keep a phrase (default 200ms).
    pub min_speech_ms: u64,
    /// Phrase time limit (default 4s).
    pub phrase_limit: Duration,
}

impl Default for EarConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            vad_mode: 2,
            gap_ms: 800,
            min_speech_ms: 200,
            phrase_limit: Duration::from_secs(4),
        }
    }
}

impl EarConfig {
    fn vad(&self) -> VadConfig {
        VadConfig {
            sample_rate: self.sample_rate,
            mode: self.vad_mode,
        }
    }

    fn turn(&self) -> TurnConfig {
        TurnConfig {
            silence_gap: Duration::from_millis(self.gap_ms),
            min_speech: Duration::from_millis(self.min_speech_ms),
            max_phrase: self.phrase_limit,
            sample_rate: self.sample_rate,
        }
    }
}

/// Opens listen sessions on the default input device.
#[derive(Debug, Clone, Default)]
pub struct VoiceEar {
    config: EarConfig,
}

impl VoiceEar {
    pub fn new(config: EarConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EarConfig {
        &self.config
    }

    /// Acquire the microphone. Dropping the session releases it.
    pub fn open(&self) -> VoiceResult<ListenSession> {
        self.open_with_limit(self.config.phrase_limit)
    }

    /// Acquire the microphone with a per-listen phrase time limit.
    pub fn open_with_limit(&self, phrase_limit: Duration) -> VoiceResult<ListenSession> {
        let vad_config = self.config.vad();
        let vad = VadDetector::new(&vad_config)?;
        let audio_config = AudioConfig {
            sample_rate: self.config.sample_rate,
            channels: 1,
            chunk_size: vad.frame_len(),
        };
        let (chunk_tx, chunk_rx) = mpsc::channel();
        let stream = AudioCapture::new(audio_config)?.start_capture(chunk_tx)?;
        Ok(ListenSession {
            _stream: stream,
            chunk_rx,
            vad,
            turns: TurnDetector::new(TurnConfig {
                max_phrase: phrase_limit,
                ..self.config.turn()
            }),
        })
    }
}

/// Something that can open a bounded listen window. The microphone is the real one;
/// tests script their own.
pub trait TurnSource: Send + Sync {
    fn open_window(&self, phrase_limit: Duration) -> VoiceResult<Box<dyn TurnWindow>>;
}

/// One open listen window yielding committed phrases.
pub trait TurnWindow {
    /// Next phrase that starts before `start_deadline`, or `None` if nobody spoke in time.
    fn next_turn(&mut self, start_deadline: Instant) -> VoiceResult<Option<AudioTurn>>;
}

impl TurnSource for VoiceEar {
    fn open_window(&self, phrase_limit: Duration) -> VoiceResult<Box<dyn TurnWindow>> {
        Ok(Box::new(self.open_with_limit(phrase_limit)?))
    }
}

/// An open microphone plus the VAD and turn state for one listen window.
pub struct ListenSession {
    _stream: Stream,
    chunk_rx: mpsc::Receiver<AudioChunk>,
    vad: VadDetector,
    turns: TurnDetector,
}

impl TurnWindow for ListenSession {
    /// `start_deadline` bounds the wait for speech to begin; once a phrase is under way it
    /// runs to its gap or the phrase limit.
    fn next_turn(&mut self, start_deadline: Instant) -> VoiceResult<Option<AudioTurn>> {
        loop {
            let now = Instant::now();
            if now >= start_deadline && !self.turns.in_phrase() {
                return Ok(None);
            }
            // Mid-phrase the wait is bounded by the phrase limit inside the detector; poll
            // in short slices so a stalled device cannot hang the caller.
            let wait = if self.turns.in_phrase() {
                Duration::from_millis(250)
            } else {
                start_deadline.saturating_duration_since(now)
            };
            let chunk = match self.chunk_rx.recv_timeout(wait) {
                Ok(chunk) => chunk,
                Err(RecvTimeoutError::Timeout) => {
                    if self.turns.in_phrase() {
                        warn!("Audio stalled mid-phrase, committing what we have");
                        return Ok(self.turns.flush(Instant::now()));
                    }
                    continue;
                }
                Err(RecvTimeoutError::Disconnected) => {
                    debug!("Audio stream closed");
                    return Ok(self.turns.flush(Instant::now()));
                }
            };
            let is_speech = match self.vad.is_speech(&chunk.samples) {
                Ok(v) => v,
                Err(e) => {
                    debug!("VAD skipped a frame: {}", e);
                    continue;
                }
            };
            if let Some(turn) = self.turns.push(is_speech, &chunk.samples, chunk.captured_at) {
                return Ok(Some(turn));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ear_config_defaults() {
        let c = EarConfig::default();
        assert_eq!(c.sample_rate, 16000);
        assert_eq!(c.gap_ms, 800);
        assert_eq!(c.phrase_limit, Duration::from_secs(4));
        assert_eq!(c.vad().frame_len(), 480);
        assert_eq!(c.turn().silence_gap, Duration::from_millis(800));
    }

    #[test]
    #[ignore] // Requires audio hardware
    fn listen_window_times_out_in_silence() {
        let ear = VoiceEar::default();
        let mut session = ear.open().unwrap();
        let started = Instant::now();
        let turn = session.next_turn(started + Duration::from_millis(500)).unwrap();
        assert!(turn.is_none() || started.elapsed() < Duration::from_secs(6));
    }
}
