//! Effect system - trait, parameter descriptions, and the native effects
//!
//! Every stage of the playback graph (shelving filters, peaking bands, the
//! convolution reverb) implements [`Effect`]. Parameters are exposed both
//! normalized (0.0-1.0, for knob-style control) and in their actual units
//! (Hz, dB, Q) for the settings layer.

pub mod native;
pub mod settings;

pub use settings::{EffectSettings, EqBand, ReverbSettings, ShelfSettings, DEFAULT_BAND_COUNT};

use crate::types::StereoBuffer;

/// Information about an effect parameter
#[derive(Debug, Clone)]
pub struct ParamInfo {
    /// Parameter name for display
    pub name: String,
    /// Default value (actual units)
    pub default: f32,
    /// Minimum actual value
    pub min: f32,
    /// Maximum actual value
    pub max: f32,
    /// Unit label (e.g., "Hz", "dB", "%")
    pub unit: String,
}

impl Default for ParamInfo {
    fn default() -> Self {
        Self {
            name: String::new(),
            default: 0.5,
            min: 0.0,
            max: 1.0,
            unit: String::new(),
        }
    }
}

impl ParamInfo {
    /// Create a new parameter info with name and default value
    pub fn new(name: impl Into<String>, default: f32) -> Self {
        Self {
            name: name.into(),
            default,
            ..Default::default()
        }
    }

    /// Set the value range
    pub fn with_range(mut self, min: f32, max: f32) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    /// Set the unit label
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }
}

/// Current parameter value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamValue {
    /// Normalized value (0.0-1.0)
    pub normalized: f32,
    /// Actual value after range mapping
    pub actual: f32,
}

impl ParamValue {
    /// Create from normalized value with the given param info
    pub fn from_normalized(normalized: f32, info: &ParamInfo) -> Self {
        let normalized = normalized.clamp(0.0, 1.0);
        let actual = info.min + normalized * (info.max - info.min);
        Self { normalized, actual }
    }

    /// Create from an actual value, clamped into the parameter's range
    pub fn from_actual(actual: f32, info: &ParamInfo) -> Self {
        let actual = actual.clamp(info.min, info.max);
        let span = info.max - info.min;
        let normalized = if span > 0.0 { (actual - info.min) / span } else { 0.0 };
        Self { normalized, actual }
    }
}

/// Information about an effect
#[derive(Debug, Clone)]
pub struct EffectInfo {
    /// Effect name for display
    pub name: String,
    /// Effect category (e.g., "EQ", "Reverb")
    pub category: String,
    /// Parameter descriptions
    pub params: Vec<ParamInfo>,
    /// Processing latency in samples
    pub latency_samples: u32,
}

impl EffectInfo {
    /// Create a new effect info
    pub fn new(name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            params: Vec::new(),
            latency_samples: 0,
        }
    }

    /// Add a parameter to this effect
    pub fn with_param(mut self, param: ParamInfo) -> Self {
        self.params.push(param);
        self
    }

    /// Get the number of parameters
    pub fn param_count(&self) -> usize {
        self.params.len()
    }
}

/// The core effect trait - implemented by all audio effects
///
/// Effects process stereo blocks in place and must not allocate in
/// [`process`](Effect::process).
pub trait Effect: Send {
    /// Process a stereo buffer in-place
    fn process(&mut self, buffer: &mut StereoBuffer);

    /// Get the latency of this effect in samples
    fn latency_samples(&self) -> u32;

    /// Get information about this effect (name, category, parameters)
    fn info(&self) -> &EffectInfo;

    /// Get the current parameter values
    fn get_params(&self) -> &[ParamValue];

    /// Set a parameter by index (normalized value 0.0-1.0)
    fn set_param(&mut self, index: usize, value: f32);

    /// Set a parameter by index in actual units (Hz, dB, ...)
    ///
    /// Values outside the parameter range are clamped.
    fn set_param_actual(&mut self, index: usize, value: f32);

    /// Set the bypass state
    fn set_bypass(&mut self, bypass: bool);

    /// Check if the effect is bypassed
    fn is_bypassed(&self) -> bool;

    /// Reset the effect state (called on buffer swap, seek, etc.)
    fn reset(&mut self);
}

/// Base implementation helper for effects
///
/// Provides bypass state and parameter storage. The setters report whether
/// the stored value actually changed so effects can skip coefficient updates
/// when the same settings are applied again.
#[derive(Debug, Clone)]
pub struct EffectBase {
    info: EffectInfo,
    params: Vec<ParamValue>,
    bypassed: bool,
}

impl EffectBase {
    /// Create a new effect base from effect info
    pub fn new(info: EffectInfo) -> Self {
        let params: Vec<ParamValue> = info
            .params
            .iter()
            .map(|p| ParamValue::from_actual(p.default, p))
            .collect();
        Self {
            info,
            params,
            bypassed: false,
        }
    }

    /// Get the effect info
    pub fn info(&self) -> &EffectInfo {
        &self.info
    }

    /// Get mutable access to the effect info
    pub fn info_mut(&mut self) -> &mut EffectInfo {
        &mut self.info
    }

    /// Get the current parameter values
    pub fn get_params(&self) -> &[ParamValue] {
        &self.params
    }

    /// Set a parameter from a normalized value; returns true if it changed
    pub fn set_param(&mut self, index: usize, value: f32) -> bool {
        match self.info.params.get(index) {
            Some(info) => self.store(index, ParamValue::from_normalized(value, info)),
            None => false,
        }
    }

    /// Set a parameter from an actual value; returns true if it changed
    pub fn set_param_actual(&mut self, index: usize, value: f32) -> bool {
        match self.info.params.get(index) {
            Some(info) => self.store(index, ParamValue::from_actual(value, info)),
            None => false,
        }
    }

    fn store(&mut self, index: usize, value: ParamValue) -> bool {
        if self.params[index].actual == value.actual {
            return false;
        }
        self.params[index] = value;
        true
    }

    /// Get a parameter's actual (denormalized) value
    pub fn param_actual(&self, index: usize) -> f32 {
        self.params.get(index).map(|p| p.actual).unwrap_or(0.0)
    }

    /// Get a parameter's normalized value
    pub fn param_normalized(&self, index: usize) -> f32 {
        self.params.get(index).map(|p| p.normalized).unwrap_or(0.0)
    }

    /// Set bypass state; returns true if it changed
    pub fn set_bypass(&mut self, bypass: bool) -> bool {
        let changed = self.bypassed != bypass;
        self.bypassed = bypass;
        changed
    }

    /// Check if bypassed
    pub fn is_bypassed(&self) -> bool {
        self.bypassed
    }
}
