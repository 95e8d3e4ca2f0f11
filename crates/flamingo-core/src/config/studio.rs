//! Studio configuration sections
//!
//! Default location: `~/.config/flamingo/studio.yaml`

use serde::{Deserialize, Serialize};

use crate::analysis::LatencyRange;
use crate::audio::AudioConfig;
use crate::effect::native::{DEFAULT_BLOCK_SIZE, DEFAULT_IR_DECAY, DEFAULT_IR_DURATION};
use crate::effect::EffectSettings;
use crate::slicer::{PatternPreset, Tempo};

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudioConfig {
    /// Output device and buffer preferences
    pub audio: AudioConfig,
    /// Effect settings applied at startup
    pub effects: EffectSettings,
    /// Room impulse response and convolution block size
    pub reverb: ReverbConfig,
    pub remix: RemixConfig,
    pub analysis: AnalysisConfig,
}

/// Synthetic room impulse response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReverbConfig {
    /// IR length in seconds
    pub duration: f32,
    /// Exponent of the `(1 - t)^decay` envelope
    pub decay: f32,
    /// Noise seed; the same seed always builds the same room
    pub seed: u64,
    /// Convolution partition size in frames (also the wet path latency)
    pub block_size: usize,
}

impl Default for ReverbConfig {
    fn default() -> Self {
        Self {
            duration: DEFAULT_IR_DURATION,
            decay: DEFAULT_IR_DECAY,
            seed: 0x5EED,
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }
}

impl ReverbConfig {
    /// Values usable for IR generation
    pub fn sanitized(&self) -> Self {
        Self {
            duration: if self.duration.is_finite() {
                self.duration.clamp(0.01, 10.0)
            } else {
                DEFAULT_IR_DURATION
            },
            decay: if self.decay.is_finite() {
                self.decay.clamp(0.0, 16.0)
            } else {
                DEFAULT_IR_DECAY
            },
            seed: self.seed,
            block_size: self.block_size.clamp(32, 8192).next_power_of_two(),
        }
    }
}

/// Remix defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemixConfig {
    /// Tempo used for slicing until changed
    pub tempo: Tempo,
    /// Preset used by a bare `remix` command
    pub preset: PatternPreset,
    /// Seed for randomized patterns; `None` seeds from the clock
    pub seed: Option<u64>,
}

impl Default for RemixConfig {
    fn default() -> Self {
        Self {
            tempo: Tempo::default(),
            preset: PatternPreset::Straight,
            seed: None,
        }
    }
}

/// Analysis service behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Simulated response delay
    pub latency: LatencyRange,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            latency: LatencyRange::default(),
        }
    }
}
