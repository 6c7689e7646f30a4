//! Turn detection: groups VAD frames into one spoken phrase.
//!
//! A phrase starts on the first speech frame and is committed once the speaker has been
//! silent for `silence_gap`, or when it reaches `max_phrase` (the phrase time limit).
//! Phrases shorter than `min_speech` are dropped as clicks or coughs.

use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};
use tracing::debug;

/// A completed phrase: buffered PCM from speech start until the gap.
#[derive(Debug, Clone)]
pub struct AudioTurn {
    /// PCM samples (f32, -1.0..1.0)
    pub samples: Vec<f32>,
    /// When the turn was committed
    pub timestamp: DateTime<Utc>,
    /// Speech start to commit
    pub duration: Duration,
    pub sample_rate: u32,
}

/// Configuration for turn detection
#[derive(Debug, Clone)]
pub struct TurnConfig {
    /// Silence after speech that ends a phrase (default: 800ms)
    pub silence_gap: Duration,
    /// Shorter phrases are discarded (default: 200ms)
    pub min_speech: Duration,
    /// Phrase time limit; longer speech is committed early (default: 4s)
    pub max_phrase: Duration,
    pub sample_rate: u32,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            silence_gap: Duration::from_millis(800),
            min_speech: Duration::from_millis(200),
            max_phrase: Duration::from_secs(4),
            sample_rate: 16000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TurnState {
    Idle,
    Speaking,
    TrailingSilence,
}

/// Accumulates frames for the current phrase
pub struct TurnDetector {
    config: TurnConfig,
    state: TurnState,
    speech_start: Option<Instant>,
    last_speech: Option<Instant>,
    buffer: Vec<f32>,
}

impl TurnDetector {
    pub fn new(config: TurnConfig) -> Self {
        Self {
            config,
            state: TurnState::Idle,
            speech_start: None,
            last_speech: None,
            buffer: Vec::new(),
        }
    }

    /// True while a phrase is in progress.
    pub fn in_phrase(&self) -> bool {
        self.state != TurnState::Idle
    }

    /// Feed one classified frame captured at `at`. Returns a turn when one is committed.
    pub fn push(&mut self, is_speech: bool, frame: &[f32], at: Instant) -> Option<AudioTurn> {
        match (self.state, is_speech) {
            (TurnState::Idle, false) => return None,
            (TurnState::Idle, true) => {
                self.state = TurnState::Speaking;
                self.speech_start = Some(at);
                self.last_speech = Some(at);
                self.buffer.clear();
                self.buffer.extend_from_slice(frame);
                debug!("Speech started");
            }
            (TurnState::Speaking, true) | (TurnState::TrailingSilence, true) => {
                self.state = TurnState::Speaking;
                self.last_speech = Some(at);
                self.buffer.extend_from_slice(frame);
            }
            (TurnState::Speaking, false) | (TurnState::TrailingSilence, false) => {
                self.state = TurnState::TrailingSilence;
                // Trailing silence stays in the buffer; STT copes better with a tail.
                self.buffer.extend_from_slice(frame);
                let silent_for = self
                    .last_speech
                    .map(|t| at.saturating_duration_since(t))
                    .unwrap_or_default();
                if silent_for >= self.config.silence_gap {
                    return self.commit(at);
                }
            }
        }

        let phrase_len = self
            .speech_start
            .map(|t| at.saturating_duration_since(t))
            .unwrap_or_default();
        if phrase_len >= self.config.max_phrase {
            debug!(?phrase_len, "Phrase time limit reached");
            return self.commit(at);
        }
        None
    }

    /// Commit whatever is buffered (used when the listen window closes mid-phrase).
    pub fn flush(&mut self, at: Instant) -> Option<AudioTurn> {
        if self.state == TurnState::Idle {
            return None;
        }
        self.commit(at)
    }

    fn commit(&mut self, at: Instant) -> Option<AudioTurn> {
        let spoken = match (self.speech_start, self.last_speech) {
            (Some(start), Some(last)) => last.saturating_duration_since(start),
            _ => Duration::ZERO,
        };
        let duration = self
            .speech_start
            .map(|start| at.saturating_duration_since(start))
            .unwrap_or_default();
        let samples = std::mem::take(&mut self.buffer);
        self.reset();

        if spoken < self.config.min_speech {
            debug!(?spoken, "Phrase too short, dropped");
            return None;
        }
        debug!(?duration, samples = samples.len(), "Phrase committed");
        Some(AudioTurn {
            samples,
            timestamp: Utc::now(),
            duration,
            sample_rate: self.config.sample_rate,
        })
    }

    fn reset(&mut self) {
        self.state = TurnState::Idle;
        self.speech_start = None;
        self.last_speech = None;
        self.buffer.clear();
    }
}
