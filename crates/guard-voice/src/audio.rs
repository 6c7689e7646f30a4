//! Microphone capture using CPAL
//!
//! The device is opened per listen and released when the returned `Stream` is dropped,
//! so the microphone is never held during video-only cycles.

use crate::error::{VoiceError, VoiceResult};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig};
use std::sync::mpsc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Audio configuration
#[derive(Debug, Clone)]
pub struct AudioConfig {
    /// Sample rate in Hz (default: 16000)
    pub sample_rate: u32,

    /// Number of channels (default: 1 for mono)
    pub channels: u16,

    /// Samples per chunk handed to the VAD (default: 480, 30ms at 16kHz)
    pub chunk_size: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            channels: 1,
            chunk_size: 480,
        }
    }
}

/// Fixed-size block of mono samples from the capture callback
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Samples, normalized to -1.0..1.0
    pub samples: Vec<f32>,

    /// When the chunk was completed
    pub captured_at: Instant,
}

/// Default input device plus the stream configuration to open it with
pub struct AudioCapture {
    config: AudioConfig,
    device: Device,
    stream_config: StreamConfig,
}

impl AudioCapture {
    /// Resolve the default input device. Does not start capturing.
    pub fn new(config: AudioConfig) -> VoiceResult<Self> {
        let device = cpal::default_host()
            .default_input_device()
            .ok_or_else(|| VoiceError::AudioDevice("No input device available".to_string()))?;

        debug!(
            device = %device.name().unwrap_or_else(|_| "Unknown".to_string()),
            sample_rate = config.sample_rate,
            "🎤 Input device resolved"
        );

        let stream_config = StreamConfig {
            channels: config.channels,
            sample_rate: cpal::SampleRate(config.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        Ok(Self {
            config,
            device,
            stream_config,
        })
    }

    /// Start capturing; full chunks are sent to `chunk_tx` from the audio callback.
    /// Capture stops when the returned stream is dropped.
    pub fn start_capture(self, chunk_tx: mpsc::Sender<AudioChunk>) -> VoiceResult<Stream> {
        let chunk_size = self.config.chunk_size;
        let channels = self.config.channels.max(1) as usize;
        let mut pending = Vec::with_capacity(chunk_size);

        let stream = self.device.build_input_stream(
            &self.stream_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                // Keep the first channel only.
                for frame in data.chunks(channels) {
                    pending.push(frame[0]);
                    if pending.len() == chunk_size {
                        let chunk = AudioChunk {
                            samples: std::mem::replace(&mut pending, Vec::with_capacity(chunk_size)),
                            captured_at: Instant::now(),
                        };
                        // Receiver gone means the listen finished; drop the rest.
                        let _ = chunk_tx.send(chunk);
                    }
                }
            },
            move |err| {
                warn!("Audio stream error: {}", err);
            },
            None,
        )?;

        stream.play()?;
        debug!("Audio capture started");
        Ok(stream)
    }

    /// List available input devices
    pub fn list_input_devices() -> VoiceResult<Vec<String>> {
        let host = cpal::default_host();
        let devices = host.input_devices()?;
        let names: Vec<String> = devices.filter_map(|d| d.name().ok()).collect();
        info!(count = names.len(), "Input devices enumerated");
        Ok(names)
    }
}
