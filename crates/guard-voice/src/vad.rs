//! Voice Activity Detection using WebRTC VAD
//!
//! Classifies fixed 30ms frames as speech or silence. `webrtc_vad::Vad` is not `Send`,
//! so a detector is created on the thread that uses it, once per listen.

use crate::error::{VoiceError, VoiceResult};
use webrtc_vad::{SampleRate, Vad, VadMode};

/// Configuration for VAD detection
#[derive(Debug, Clone)]
pub struct VadConfig {
    /// Sample rate (8000, 16000, 32000, or 48000 Hz)
    pub sample_rate: u32,

    /// Aggressiveness 0-3; higher rejects more non-speech
    pub mode: u8,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            mode: 2,
        }
    }
}

impl VadConfig {
    /// Samples in one 30ms frame at this rate.
    pub fn frame_len(&self) -> usize {
        (self.sample_rate as usize * 30) / 1000
    }

    fn webrtc_rate(&self) -> VoiceResult<SampleRate> {
        match self.sample_rate {
            8000 => Ok(SampleRate::Rate8kHz),
            16000 => Ok(SampleRate::Rate16kHz),
            32000 => Ok(SampleRate::Rate32kHz),
            48000 => Ok(SampleRate::Rate48kHz),
            other => Err(VoiceError::Config(format!(
                "WebRTC VAD only supports 8000, 16000, 32000, or 48000 Hz, got {}",
                other
            ))),
        }
    }

    fn webrtc_mode(&self) -> VoiceResult<VadMode> {
        match self.mode {
            0 => Ok(VadMode::Quality),
            1 => Ok(VadMode::LowBitrate),
            2 => Ok(VadMode::Aggressive),
            3 => Ok(VadMode::VeryAggressive),
            other => Err(VoiceError::Config(format!("VAD mode must be 0-3, got {}", other))),
        }
    }
}

/// Per-frame speech classifier
pub struct VadDetector {
    vad: Vad,
    frame_len: usize,
    scratch: Vec<i16>,
}

impl VadDetector {
    pub fn new(config: &VadConfig) -> VoiceResult<Self> {
        let rate = config.webrtc_rate()?;
        let mode = config.webrtc_mode()?;
        let mut vad = Vad::new();
        vad.set_sample_rate(rate);
        vad.set_mode(mode);
        let frame_len = config.frame_len();
        Ok(Self {
            vad,
            frame_len,
            scratch: Vec::with_capacity(frame_len),
        })
    }

    /// Expected samples per call to [`VadDetector::is_speech`].
    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    /// Classify one frame of f32 samples.
    pub fn is_speech(&mut self, frame: &[f32]) -> VoiceResult<bool> {
        if frame.len() != self.frame_len {
            return Err(VoiceError::Vad(format!(
                "expected {} samples, got {}",
                self.frame_len,
                frame.len()
            )));
        }
        self.scratch.clear();
        self.scratch
            .extend(frame.iter().map(|&s| (s.clamp(-1.0, 1.0) * 32767.0) as i16));
        self.vad
            .is_voice_segment(&self.scratch)
            .map_err(|_| VoiceError::Vad("invalid frame length".to_string()))
    }
}
