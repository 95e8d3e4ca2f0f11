//! Shelving and peaking EQ filters
//!
//! Second-order sections from the RBJ audio EQ cookbook, run in transposed
//! direct form II. Coefficients are recomputed only when a parameter changes.

use crate::effect::settings::{MAX_FREQUENCY, MAX_GAIN_DB, MAX_Q, MIN_FREQUENCY, MIN_Q};
use crate::effect::{Effect, EffectBase, EffectInfo, ParamInfo, ParamValue};
use crate::types::StereoBuffer;

/// Parameter indices shared by the EQ effects
pub const PARAM_FREQUENCY: usize = 0;
pub const PARAM_GAIN: usize = 1;
pub const PARAM_Q: usize = 2;

/// Normalized biquad coefficients (a0 folded in)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoefficients {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
}

impl BiquadCoefficients {
    pub const IDENTITY: Self = Self {
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
        a1: 0.0,
        a2: 0.0,
    };

    fn normalize(b0: f32, b1: f32, b2: f32, a0: f32, a1: f32, a2: f32) -> Self {
        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }

    /// Low shelf with slope 1
    pub fn low_shelf(sample_rate: f32, frequency: f32, gain_db: f32) -> Self {
        let (a, cos, alpha) = shelf_terms(sample_rate, frequency, gain_db);
        let sqrt_a_alpha = 2.0 * a.sqrt() * alpha;
        Self::normalize(
            a * ((a + 1.0) - (a - 1.0) * cos + sqrt_a_alpha),
            2.0 * a * ((a - 1.0) - (a + 1.0) * cos),
            a * ((a + 1.0) - (a - 1.0) * cos - sqrt_a_alpha),
            (a + 1.0) + (a - 1.0) * cos + sqrt_a_alpha,
            -2.0 * ((a - 1.0) + (a + 1.0) * cos),
            (a + 1.0) + (a - 1.0) * cos - sqrt_a_alpha,
        )
    }

    /// High shelf with slope 1
    pub fn high_shelf(sample_rate: f32, frequency: f32, gain_db: f32) -> Self {
        let (a, cos, alpha) = shelf_terms(sample_rate, frequency, gain_db);
        let sqrt_a_alpha = 2.0 * a.sqrt() * alpha;
        Self::normalize(
            a * ((a + 1.0) + (a - 1.0) * cos + sqrt_a_alpha),
            -2.0 * a * ((a - 1.0) + (a + 1.0) * cos),
            a * ((a + 1.0) + (a - 1.0) * cos - sqrt_a_alpha),
            (a + 1.0) - (a - 1.0) * cos + sqrt_a_alpha,
            2.0 * ((a - 1.0) - (a + 1.0) * cos),
            (a + 1.0) - (a - 1.0) * cos - sqrt_a_alpha,
        )
    }

    /// Peaking (bell) filter
    pub fn peaking(sample_rate: f32, frequency: f32, gain_db: f32, q: f32) -> Self {
        let a = 10.0_f32.powf(gain_db / 40.0);
        let w0 = omega(sample_rate, frequency);
        let cos = w0.cos();
        let alpha = w0.sin() / (2.0 * q.max(MIN_Q));
        Self::normalize(
            1.0 + alpha * a,
            -2.0 * cos,
            1.0 - alpha * a,
            1.0 + alpha / a,
            -2.0 * cos,
            1.0 - alpha / a,
        )
    }

    /// Magnitude response in dB at `frequency`
    pub fn magnitude_db(&self, sample_rate: f32, frequency: f32) -> f32 {
        let w = 2.0 * std::f64::consts::PI * frequency as f64 / sample_rate as f64;
        let (c1, s1) = (w.cos(), -w.sin());
        let (c2, s2) = ((2.0 * w).cos(), -(2.0 * w).sin());
        let num_re = self.b0 as f64 + self.b1 as f64 * c1 + self.b2 as f64 * c2;
        let num_im = self.b1 as f64 * s1 + self.b2 as f64 * s2;
        let den_re = 1.0 + self.a1 as f64 * c1 + self.a2 as f64 * c2;
        let den_im = self.a1 as f64 * s1 + self.a2 as f64 * s2;
        let mag = ((num_re * num_re + num_im * num_im) / (den_re * den_re + den_im * den_im)).sqrt();
        (20.0 * mag.log10()) as f32
    }
}

fn omega(sample_rate: f32, frequency: f32) -> f32 {
    // Stay below Nyquist whatever the device rate
    let frequency = frequency.clamp(MIN_FREQUENCY, sample_rate * 0.49);
    2.0 * std::f32::consts::PI * frequency / sample_rate
}

fn shelf_terms(sample_rate: f32, frequency: f32, gain_db: f32) -> (f32, f32, f32) {
    let a = 10.0_f32.powf(gain_db / 40.0);
    let w0 = omega(sample_rate, frequency);
    // Slope S = 1: alpha = sin(w0)/2 * sqrt(2)
    let alpha = w0.sin() / 2.0 * std::f32::consts::SQRT_2;
    (a, w0.cos(), alpha)
}

/// Stereo biquad section (transposed direct form II)
#[derive(Debug, Clone)]
pub struct BiquadFilter {
    coeffs: BiquadCoefficients,
    z1: [f32; 2],
    z2: [f32; 2],
}

impl BiquadFilter {
    pub fn new() -> Self {
        Self {
            coeffs: BiquadCoefficients::IDENTITY,
            z1: [0.0; 2],
            z2: [0.0; 2],
        }
    }

    pub fn set_coefficients(&mut self, coeffs: BiquadCoefficients) {
        self.coeffs = coeffs;
    }

    pub fn coefficients(&self) -> &BiquadCoefficients {
        &self.coeffs
    }

    #[inline]
    fn tick(&mut self, ch: usize, x: f32) -> f32 {
        let c = &self.coeffs;
        let y = c.b0 * x + self.z1[ch];
        self.z1[ch] = c.b1 * x - c.a1 * y + self.z2[ch];
        self.z2[ch] = c.b2 * x - c.a2 * y;
        y
    }

    pub fn process(&mut self, buffer: &mut StereoBuffer) {
        for sample in buffer.iter_mut() {
            sample.left = self.tick(0, sample.left);
            sample.right = self.tick(1, sample.right);
        }
    }

    pub fn reset(&mut self) {
        self.z1 = [0.0; 2];
        self.z2 = [0.0; 2];
    }
}

impl Default for BiquadFilter {
    fn default() -> Self {
        Self::new()
    }
}

/// Which side a shelf boosts or cuts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShelfKind {
    Low,
    High,
}

fn frequency_param(default: f32) -> ParamInfo {
    ParamInfo::new("Frequency", default)
        .with_range(MIN_FREQUENCY, MAX_FREQUENCY)
        .with_unit("Hz")
}

fn gain_param() -> ParamInfo {
    ParamInfo::new("Gain", 0.0)
        .with_range(-MAX_GAIN_DB, MAX_GAIN_DB)
        .with_unit("dB")
}

/// Shelving EQ
///
/// Parameters:
/// - Frequency: corner frequency (Hz)
/// - Gain: shelf gain (dB); 0 dB is an exact passthrough
pub struct ShelfFilterEffect {
    base: EffectBase,
    kind: ShelfKind,
    sample_rate: f32,
    filter: BiquadFilter,
    dirty: bool,
}

impl ShelfFilterEffect {
    pub fn new(kind: ShelfKind, sample_rate: u32, frequency: f32) -> Self {
        let name = match kind {
            ShelfKind::Low => "Low Shelf",
            ShelfKind::High => "High Shelf",
        };
        let info = EffectInfo::new(name, "EQ")
            .with_param(frequency_param(frequency))
            .with_param(gain_param());
        Self {
            base: EffectBase::new(info),
            kind,
            sample_rate: sample_rate as f32,
            filter: BiquadFilter::new(),
            dirty: true,
        }
    }

    pub fn frequency(&self) -> f32 {
        self.base.param_actual(PARAM_FREQUENCY)
    }

    pub fn gain_db(&self) -> f32 {
        self.base.param_actual(PARAM_GAIN)
    }

    /// Current coefficients, recomputing if a parameter changed
    pub fn coefficients(&mut self) -> BiquadCoefficients {
        self.update_coefficients();
        *self.filter.coefficients()
    }

    fn update_coefficients(&mut self) {
        if !self.dirty {
            return;
        }
        let coeffs = match self.kind {
            ShelfKind::Low => {
                BiquadCoefficients::low_shelf(self.sample_rate, self.frequency(), self.gain_db())
            }
            ShelfKind::High => {
                BiquadCoefficients::high_shelf(self.sample_rate, self.frequency(), self.gain_db())
            }
        };
        self.filter.set_coefficients(coeffs);
        self.dirty = false;
    }
}

impl Effect for ShelfFilterEffect {
    fn process(&mut self, buffer: &mut StereoBuffer) {
        if self.base.is_bypassed() || self.gain_db() == 0.0 {
            return;
        }
        self.update_coefficients();
        self.filter.process(buffer);
    }

    fn latency_samples(&self) -> u32 {
        0
    }

    fn info(&self) -> &EffectInfo {
        self.base.info()
    }

    fn get_params(&self) -> &[ParamValue] {
        self.base.get_params()
    }

    fn set_param(&mut self, index: usize, value: f32) {
        self.dirty |= self.base.set_param(index, value);
    }

    fn set_param_actual(&mut self, index: usize, value: f32) {
        let was_flat = self.gain_db() == 0.0;
        self.dirty |= self.base.set_param_actual(index, value);
        // Leaving passthrough starts from clean state
        if was_flat && self.gain_db() != 0.0 {
            self.filter.reset();
        }
    }

    fn set_bypass(&mut self, bypass: bool) {
        if self.base.set_bypass(bypass) {
            self.filter.reset();
        }
    }

    fn is_bypassed(&self) -> bool {
        self.base.is_bypassed()
    }

    fn reset(&mut self) {
        self.filter.reset();
    }
}

/// Peaking (bell) EQ band
///
/// Parameters:
/// - Frequency: center frequency (Hz)
/// - Gain: boost/cut at the center (dB)
/// - Q: bandwidth
///
/// A disabled band is bypassed, contributing no gain.
pub struct PeakingFilterEffect {
    base: EffectBase,
    sample_rate: f32,
    filter: BiquadFilter,
    dirty: bool,
}

impl PeakingFilterEffect {
    pub fn new(sample_rate: u32, frequency: f32) -> Self {
        let info = EffectInfo::new("Parametric Band", "EQ")
            .with_param(frequency_param(frequency))
            .with_param(gain_param())
            .with_param(ParamInfo::new("Q", 1.0).with_range(MIN_Q, MAX_Q));
        Self {
            base: EffectBase::new(info),
            sample_rate: sample_rate as f32,
            filter: BiquadFilter::new(),
            dirty: true,
        }
    }

    pub fn frequency(&self) -> f32 {
        self.base.param_actual(PARAM_FREQUENCY)
    }

    pub fn gain_db(&self) -> f32 {
        self.base.param_actual(PARAM_GAIN)
    }

    pub fn q(&self) -> f32 {
        self.base.param_actual(PARAM_Q)
    }

    pub fn coefficients(&mut self) -> BiquadCoefficients {
        self.update_coefficients();
        *self.filter.coefficients()
    }

    fn update_coefficients(&mut self) {
        if self.dirty {
            self.filter.set_coefficients(BiquadCoefficients::peaking(
                self.sample_rate,
                self.frequency(),
                self.gain_db(),
                self.q(),
            ));
            self.dirty = false;
        }
    }
}

impl Effect for PeakingFilterEffect {
    fn process(&mut self, buffer: &mut StereoBuffer) {
        if self.base.is_bypassed() || self.gain_db() == 0.0 {
            return;
        }
        self.update_coefficients();
        self.filter.process(buffer);
    }

    fn latency_samples(&self) -> u32 {
        0
    }

    fn info(&self) -> &EffectInfo {
        self.base.info()
    }

    fn get_params(&self) -> &[ParamValue] {
        self.base.get_params()
    }

    fn set_param(&mut self, index: usize, value: f32) {
        self.dirty |= self.base.set_param(index, value);
    }

    fn set_param_actual(&mut self, index: usize, value: f32) {
        let was_flat = self.gain_db() == 0.0;
        self.dirty |= self.base.set_param_actual(index, value);
        if was_flat && self.gain_db() != 0.0 {
            self.filter.reset();
        }
    }

    fn set_bypass(&mut self, bypass: bool) {
        if self.base.set_bypass(bypass) {
            self.filter.reset();
        }
    }

    fn is_bypassed(&self) -> bool {
        self.base.is_bypassed()
    }

    fn reset(&mut self) {
        self.filter.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StereoSample;

    const RATE: u32 = 48000;

    fn sine(freq: f32, len: usize) -> StereoBuffer {
        StereoBuffer::from_vec(
            (0..len)
                .map(|i| {
                    let v = (2.0 * std::f32::consts::PI * freq * i as f32 / RATE as f32).sin();
                    StereoSample::mono(v)
                })
                .collect(),
        )
    }

    fn rms_tail(buffer: &StereoBuffer) -> f32 {
        let tail = &buffer.as_slice()[buffer.len() / 2..];
        (tail.iter().map(|s| s.left * s.left).sum::<f32>() / tail.len() as f32).sqrt()
    }

    #[test]
    fn test_shelf_creation() {
        let effect = ShelfFilterEffect::new(ShelfKind::Low, RATE, 320.0);
        assert_eq!(effect.info().name, "Low Shelf");
        assert_eq!(effect.info().category, "EQ");
        assert_eq!(effect.info().param_count(), 2);
        assert_eq!(effect.frequency(), 320.0);
        assert_eq!(effect.gain_db(), 0.0);
    }

    #[test]
    fn test_flat_gain_is_exact_passthrough() {
        let mut shelf = ShelfFilterEffect::new(ShelfKind::High, RATE, 3200.0);
        let mut band = PeakingFilterEffect::new(RATE, 1000.0);
        let original = sine(440.0, 256);
        let mut buffer = original.clone();

        shelf.process(&mut buffer);
        band.process(&mut buffer);

        assert_eq!(buffer.as_slice(), original.as_slice());
    }

    #[test]
    fn test_low_shelf_response() {
        let coeffs = BiquadCoefficients::low_shelf(RATE as f32, 320.0, 12.0);
        assert!((coeffs.magnitude_db(RATE as f32, 20.0) - 12.0).abs() < 0.5);
        assert!(coeffs.magnitude_db(RATE as f32, 15000.0).abs() < 0.5);
        // Half the gain at the corner for slope 1
        assert!((coeffs.magnitude_db(RATE as f32, 320.0) - 6.0).abs() < 0.5);
    }

    #[test]
    fn test_high_shelf_response() {
        let coeffs = BiquadCoefficients::high_shelf(RATE as f32, 3200.0, -12.0);
        assert!((coeffs.magnitude_db(RATE as f32, 20000.0) + 12.0).abs() < 0.5);
        assert!(coeffs.magnitude_db(RATE as f32, 50.0).abs() < 0.5);
    }

    #[test]
    fn test_peaking_response() {
        let coeffs = BiquadCoefficients::peaking(RATE as f32, 1000.0, 9.0, 1.0);
        assert!((coeffs.magnitude_db(RATE as f32, 1000.0) - 9.0).abs() < 0.1);
        assert!(coeffs.magnitude_db(RATE as f32, 60.0).abs() < 0.5);
        assert!(coeffs.magnitude_db(RATE as f32, 18000.0).abs() < 0.5);
    }

    #[test]
    fn test_peaking_boosts_center_signal() {
        let mut band = PeakingFilterEffect::new(RATE, 1000.0);
        band.set_param_actual(PARAM_GAIN, 12.0);

        let mut buffer = sine(1000.0, 9600);
        let before = rms_tail(&buffer);
        band.process(&mut buffer);
        let after = rms_tail(&buffer);

        let gain_db = 20.0 * (after / before).log10();
        assert!((gain_db - 12.0).abs() < 0.5, "measured {} dB", gain_db);
    }

    #[test]
    fn test_disabled_band_contributes_nothing() {
        let mut band = PeakingFilterEffect::new(RATE, 1000.0);
        band.set_param_actual(PARAM_GAIN, 12.0);
        band.set_bypass(true);

        let original = sine(1000.0, 512);
        let mut buffer = original.clone();
        band.process(&mut buffer);
        assert_eq!(buffer.as_slice(), original.as_slice());
    }

    #[test]
    fn test_reapplying_params_keeps_coefficients() {
        let mut band = PeakingFilterEffect::new(RATE, 1000.0);
        band.set_param_actual(PARAM_GAIN, 6.0);
        let first = band.coefficients();
        assert!(!band.dirty);

        band.set_param_actual(PARAM_GAIN, 6.0);
        band.set_param_actual(PARAM_FREQUENCY, 1000.0);
        assert!(!band.dirty);
        assert_eq!(band.coefficients(), first);
    }

    #[test]
    fn test_params_are_clamped() {
        let mut shelf = ShelfFilterEffect::new(ShelfKind::Low, RATE, 320.0);
        shelf.set_param_actual(PARAM_FREQUENCY, 1.0);
        shelf.set_param_actual(PARAM_GAIN, 99.0);
        assert_eq!(shelf.frequency(), MIN_FREQUENCY);
        assert_eq!(shelf.gain_db(), MAX_GAIN_DB);
    }
}
