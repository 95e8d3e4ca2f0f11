//! Audio backend configuration

use serde::{Deserialize, Serialize};

/// Largest block the engine renders at once (frames)
///
/// Device callbacks asking for more are rendered in several blocks.
pub const MAX_BUFFER_SIZE: usize = 8192;

/// Default buffer size when no preference is specified (frames)
pub const DEFAULT_BUFFER_SIZE: u32 = 512;

/// Preferred output sample rate
pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

/// Preferred buffer size for audio streams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BufferSize {
    /// Use [`DEFAULT_BUFFER_SIZE`]
    #[default]
    Default,
    /// Request a specific buffer size in frames (clamped to 64..=8192)
    Fixed(u32),
}

impl BufferSize {
    /// Frames to request from the device
    pub fn frames(&self) -> u32 {
        match self {
            BufferSize::Default => DEFAULT_BUFFER_SIZE,
            BufferSize::Fixed(frames) => (*frames).clamp(64, MAX_BUFFER_SIZE as u32),
        }
    }

    /// Latency in milliseconds for a given sample rate
    pub fn latency_ms(&self, sample_rate: u32) -> f32 {
        (self.frames() as f32 / sample_rate.max(1) as f32) * 1000.0
    }
}

/// Audio device identifier
///
/// Includes the host backend (ALSA, CoreAudio, ...) so devices with the same
/// name on different hosts can be told apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceId {
    pub name: String,
    /// Audio host; `None` searches every host
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

impl DeviceId {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: None,
        }
    }

    pub fn with_host(name: &str, host: &str) -> Self {
        Self {
            name: name.to_string(),
            host: Some(host.to_string()),
        }
    }

    /// Display label that includes the host if known
    pub fn display_label(&self) -> String {
        match &self.host {
            Some(host) => format!("[{}] {}", host, self.name),
            None => self.name.clone(),
        }
    }
}

/// Configuration for the audio backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Output device (None = system default)
    pub device: Option<DeviceId>,
    pub buffer_size: BufferSize,
    /// Preferred sample rate (None = 48 kHz when supported)
    pub sample_rate: Option<u32>,
    /// Skip device output and render on a paced background thread
    pub headless: bool,
    /// Fall back to headless rendering when no device can be opened
    pub headless_fallback: bool,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: None,
            buffer_size: BufferSize::default(),
            sample_rate: None,
            headless: false,
            headless_fallback: true,
        }
    }
}

impl AudioConfig {
    /// Config for running without an output device
    pub fn headless() -> Self {
        Self {
            headless: true,
            ..Default::default()
        }
    }

    pub fn with_device(mut self, device: DeviceId) -> Self {
        self.device = Some(device);
        self
    }

    pub fn with_buffer_frames(mut self, frames: u32) -> Self {
        self.buffer_size = BufferSize::Fixed(frames);
        self
    }

    pub fn with_sample_rate(mut self, rate: u32) -> Self {
        self.sample_rate = Some(rate);
        self
    }

    /// Sample rate to aim for
    pub fn target_sample_rate(&self) -> u32 {
        self.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE)
    }
}
