//! Effect settings value object
//!
//! Independent parameter groups for the playback graph. Groups are not coupled
//! and can be changed in any order; applying the same settings twice leaves
//! the graph (and its output) unchanged.

use serde::{Deserialize, Serialize};

/// Lowest frequency accepted by any filter (Hz)
pub const MIN_FREQUENCY: f32 = 20.0;
/// Highest frequency accepted by any filter (Hz)
pub const MAX_FREQUENCY: f32 = 20000.0;
/// Filter gain range (dB)
pub const MAX_GAIN_DB: f32 = 24.0;
/// Peaking filter Q range
pub const MIN_Q: f32 = 0.1;
pub const MAX_Q: f32 = 18.0;

/// Default number of parametric bands
pub const DEFAULT_BAND_COUNT: usize = 3;

/// Shelving filter group
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShelfSettings {
    pub frequency: f32,
    #[serde(alias = "gain")]
    pub gain_db: f32,
}

impl ShelfSettings {
    pub fn new(frequency: f32, gain_db: f32) -> Self {
        Self { frequency, gain_db }
    }

    fn sanitized(self) -> Self {
        Self {
            frequency: clamp_frequency(self.frequency),
            gain_db: clamp_gain(self.gain_db),
        }
    }
}

/// One peaking band of the parametric EQ
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EqBand {
    pub frequency: f32,
    #[serde(alias = "gain")]
    pub gain_db: f32,
    #[serde(default = "default_q")]
    pub q: f32,
    /// A disabled band contributes no gain
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_q() -> f32 {
    1.0
}

fn default_enabled() -> bool {
    true
}

impl EqBand {
    pub fn new(frequency: f32) -> Self {
        Self {
            frequency,
            gain_db: 0.0,
            q: default_q(),
            enabled: true,
        }
    }

    /// Gain the band actually applies (0 dB when disabled)
    pub fn effective_gain_db(&self) -> f32 {
        if self.enabled {
            self.gain_db
        } else {
            0.0
        }
    }

    fn sanitized(self) -> Self {
        Self {
            frequency: clamp_frequency(self.frequency),
            gain_db: clamp_gain(self.gain_db),
            q: if self.q.is_finite() { self.q.clamp(MIN_Q, MAX_Q) } else { default_q() },
            enabled: self.enabled,
        }
    }
}

/// Dry/wet room reverb
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ReverbSettings {
    /// Wet fraction in [0, 1]; dry gain is `1 - mix`
    pub mix: f32,
}

impl ReverbSettings {
    pub fn dry_gain(&self) -> f32 {
        1.0 - self.mix
    }

    pub fn wet_gain(&self) -> f32 {
        self.mix
    }
}

/// Complete effect parameter set for the playback graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectSettings {
    pub low_shelf: ShelfSettings,
    pub high_shelf: ShelfSettings,
    #[serde(alias = "parametric_eq")]
    pub bands: Vec<EqBand>,
    pub reverb: ReverbSettings,
}

impl Default for EffectSettings {
    fn default() -> Self {
        Self {
            low_shelf: ShelfSettings::new(320.0, 0.0),
            high_shelf: ShelfSettings::new(3200.0, 0.0),
            bands: vec![EqBand::new(250.0), EqBand::new(1000.0), EqBand::new(4000.0)],
            reverb: ReverbSettings::default(),
        }
    }
}

impl EffectSettings {
    /// Clamp every group into its valid range
    ///
    /// Non-finite inputs fall back to the nearest safe value.
    pub fn sanitized(&self) -> Self {
        Self {
            low_shelf: self.low_shelf.sanitized(),
            high_shelf: self.high_shelf.sanitized(),
            bands: self.bands.iter().map(|b| b.sanitized()).collect(),
            reverb: ReverbSettings {
                mix: if self.reverb.mix.is_finite() {
                    self.reverb.mix.clamp(0.0, 1.0)
                } else {
                    0.0
                },
            },
        }
    }

    /// Band `index`, if the settings define it
    pub fn band(&self, index: usize) -> Option<&EqBand> {
        self.bands.get(index)
    }

    /// Mutable band `index`, if the settings define it
    pub fn band_mut(&mut self, index: usize) -> Option<&mut EqBand> {
        self.bands.get_mut(index)
    }
}

fn clamp_frequency(frequency: f32) -> f32 {
    if frequency.is_finite() {
        frequency.clamp(MIN_FREQUENCY, MAX_FREQUENCY)
    } else {
        1000.0
    }
}

fn clamp_gain(gain_db: f32) -> f32 {
    if gain_db.is_finite() {
        gain_db.clamp(-MAX_GAIN_DB, MAX_GAIN_DB)
    } else {
        0.0
    }
}
