//! Static playback signal graph
//!
//! ```text
//! source ─► low shelf ─► high shelf ─► band 1 ─► ... ─► band N ─┬─► × (1 - mix) ─┐
//!                                                               └─► reverb × mix ─┴─► out
//! ```
//!
//! The topology is fixed at construction. Settings changes only move
//! parameter values, so nothing is allocated, reconnected or dropped while
//! audio is running.

use crate::effect::native::{
    ConvolutionReverb, ImpulseResponse, PeakingFilterEffect, ShelfFilterEffect, ShelfKind,
    PARAM_FREQUENCY, PARAM_GAIN, PARAM_Q,
};
use crate::effect::{Effect, EffectSettings};
use crate::types::StereoBuffer;

pub struct SignalGraph {
    low_shelf: ShelfFilterEffect,
    high_shelf: ShelfFilterEffect,
    bands: Vec<PeakingFilterEffect>,
    reverb: ConvolutionReverb,
    /// Wet fraction in [0, 1]
    mix: f32,
    /// Pre-allocated wet path block
    wet: StereoBuffer,
}

impl SignalGraph {
    /// Build the graph with `band_count` peaking bands
    ///
    /// `max_block` bounds the block length passed to [`process`](Self::process).
    pub fn new(
        sample_rate: u32,
        band_count: usize,
        ir: &ImpulseResponse,
        reverb_block: usize,
        max_block: usize,
    ) -> Self {
        let defaults = EffectSettings::default();
        let bands = (0..band_count)
            .map(|i| {
                let frequency = defaults.band(i).map(|b| b.frequency).unwrap_or(1000.0);
                PeakingFilterEffect::new(sample_rate, frequency)
            })
            .collect();

        let mut graph = Self {
            low_shelf: ShelfFilterEffect::new(ShelfKind::Low, sample_rate, defaults.low_shelf.frequency),
            high_shelf: ShelfFilterEffect::new(ShelfKind::High, sample_rate, defaults.high_shelf.frequency),
            bands,
            reverb: ConvolutionReverb::new(ir, reverb_block),
            mix: 0.0,
            wet: StereoBuffer::silence(max_block),
        };
        graph.apply(&defaults);
        graph
    }

    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    pub fn mix(&self) -> f32 {
        self.mix
    }

    /// Apply a settings value in place
    ///
    /// Settings are clamped first. Bands the settings do not define are
    /// disabled, and bands beyond the graph's band count are ignored.
    /// Applying identical settings again changes nothing.
    pub fn apply(&mut self, settings: &EffectSettings) {
        let settings = settings.sanitized();

        self.low_shelf.set_param_actual(PARAM_FREQUENCY, settings.low_shelf.frequency);
        self.low_shelf.set_param_actual(PARAM_GAIN, settings.low_shelf.gain_db);
        self.high_shelf.set_param_actual(PARAM_FREQUENCY, settings.high_shelf.frequency);
        self.high_shelf.set_param_actual(PARAM_GAIN, settings.high_shelf.gain_db);

        for (i, band) in self.bands.iter_mut().enumerate() {
            match settings.band(i) {
                Some(s) => {
                    band.set_param_actual(PARAM_FREQUENCY, s.frequency);
                    band.set_param_actual(PARAM_GAIN, s.gain_db);
                    band.set_param_actual(PARAM_Q, s.q);
                    band.set_bypass(!s.enabled);
                }
                None => band.set_bypass(true),
            }
        }

        let mix = settings.reverb.mix;
        if self.mix == 0.0 && mix > 0.0 {
            // Wet path was idle; start it without a stale tail
            self.reverb.reset();
        }
        self.mix = mix;
    }

    /// Process one block in place
    pub fn process(&mut self, buffer: &mut StereoBuffer) {
        self.low_shelf.process(buffer);
        self.high_shelf.process(buffer);
        for band in self.bands.iter_mut() {
            band.process(buffer);
        }

        if self.mix == 0.0 {
            return;
        }

        self.wet.copy_from(buffer);
        self.reverb.process(&mut self.wet);
        self.wet.scale(self.mix);
        buffer.scale(1.0 - self.mix);
        buffer.add_buffer(&self.wet);
    }

    /// Clear all filter and reverb state (buffer swap, seek)
    pub fn reset(&mut self) {
        self.low_shelf.reset();
        self.high_shelf.reset();
        for band in self.bands.iter_mut() {
            band.reset();
        }
        self.reverb.reset();
    }

    /// Latency of the wet path in samples
    pub fn wet_latency(&self) -> u32 {
        self.reverb.latency_samples()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StereoSample;

    const RATE: u32 = 48000;

    fn delta_graph(bands: usize) -> SignalGraph {
        let ir = ImpulseResponse::from_channels(vec![1.0], vec![1.0]);
        SignalGraph::new(RATE, bands, &ir, 32, 1024)
    }

    fn noise(len: usize) -> StereoBuffer {
        let mut seed = 12345u32;
        StereoBuffer::from_vec(
            (0..len)
                .map(|_| {
                    seed = seed.wrapping_mul(1664525).wrapping_add(1013904223);
                    StereoSample::mono((seed >> 8) as f32 / (1u32 << 24) as f32 - 0.5)
                })
                .collect(),
        )
    }

    #[test]
    fn test_default_graph_is_transparent() {
        let mut graph = delta_graph(3);
        let original = noise(512);
        let mut buffer = original.clone();
        graph.process(&mut buffer);
        assert_eq!(buffer.as_slice(), original.as_slice());
    }

    #[test]
    fn test_dry_wet_split() {
        let mut graph = delta_graph(0);
        let mut settings = EffectSettings::default();
        settings.bands.clear();
        settings.reverb.mix = 0.25;
        graph.apply(&settings);

        let mut buffer = StereoBuffer::silence(128);
        buffer[0] = StereoSample::mono(1.0);
        graph.process(&mut buffer);

        // Dry impulse at 0, wet copy one partition later
        assert!((buffer[0].left - 0.75).abs() < 1e-5);
        assert!((buffer[32].left - 0.25).abs() < 1e-5);
        assert!(buffer[64].left.abs() < 1e-5);
        assert_eq!(graph.wet_latency(), 32);
    }

    #[test]
    fn test_full_wet_removes_dry() {
        let mut graph = delta_graph(0);
        let mut settings = EffectSettings::default();
        settings.reverb.mix = 1.0;
        graph.apply(&settings);

        let mut buffer = StereoBuffer::silence(64);
        buffer[3] = StereoSample::mono(1.0);
        graph.process(&mut buffer);
        assert!(buffer[3].left.abs() < 1e-5);
        assert!((buffer[35].left - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_apply_is_idempotent() {
        let mut settings = EffectSettings::default();
        settings.low_shelf.gain_db = 6.0;
        settings.bands[1].gain_db = -4.0;
        settings.reverb.mix = 0.3;

        let mut once = delta_graph(3);
        once.apply(&settings);
        let mut twice = delta_graph(3);
        twice.apply(&settings);

        let mut a = noise(1024);
        let mut b = a.clone();
        once.process(&mut a);
        twice.apply(&settings);
        twice.process(&mut b);

        assert_eq!(a.as_slice(), b.as_slice());
    }

    #[test]
    fn test_missing_bands_are_disabled() {
        let mut graph = delta_graph(2);
        let mut settings = EffectSettings::default();
        settings.bands.truncate(1);
        settings.bands[0].gain_db = 6.0;
        graph.apply(&settings);

        assert!(!graph.bands[0].is_bypassed());
        assert!(graph.bands[1].is_bypassed());
    }

    #[test]
    fn test_settings_are_clamped() {
        let mut graph = delta_graph(1);
        let mut settings = EffectSettings::default();
        settings.reverb.mix = 3.0;
        graph.apply(&settings);
        assert_eq!(graph.mix(), 1.0);
    }
}
