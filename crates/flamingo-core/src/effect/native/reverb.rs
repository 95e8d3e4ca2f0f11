//! Room reverb by FFT convolution
//!
//! The room is a synthetic impulse response (stereo noise with a power-law
//! decay envelope) convolved with the signal using uniformly partitioned
//! overlap-save:
//!
//! ```text
//! input block ──► FFT ──► FDL[0] ─┬─ × H0 ─┐
//!                        FDL[1] ─┼─ × H1 ─┤
//!                          ...    │  ...   ├─► Σ ──► IFFT ──► last B samples
//!                        FDL[P-1]┴─ × Hp ─┘
//! ```
//!
//! The effect is 100% wet; the playback graph does the dry/wet split. All
//! buffers are allocated up front, so `process` never allocates.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use realfft::num_complex::Complex;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};

use crate::effect::{Effect, EffectBase, EffectInfo, ParamValue};
use crate::types::StereoBuffer;

/// Default impulse response length (seconds)
pub const DEFAULT_IR_DURATION: f32 = 2.0;
/// Default decay exponent of the IR envelope
pub const DEFAULT_IR_DECAY: f32 = 1.5;
/// Default partition size (samples); this is also the reverb's latency
pub const DEFAULT_BLOCK_SIZE: usize = 512;

/// Stereo impulse response
#[derive(Debug, Clone, PartialEq)]
pub struct ImpulseResponse {
    left: Vec<f32>,
    right: Vec<f32>,
}

impl ImpulseResponse {
    /// Build from explicit left/right taps (padded to equal length)
    pub fn from_channels(mut left: Vec<f32>, mut right: Vec<f32>) -> Self {
        let len = left.len().max(right.len()).max(1);
        left.resize(len, 0.0);
        right.resize(len, 0.0);
        Self { left, right }
    }

    /// Synthetic room: `noise(-1..1) * (1 - i/len)^decay` on each channel
    ///
    /// The result is scaled to unit energy per channel so the wet path sits
    /// at roughly the same loudness as the dry path.
    pub fn generate(sample_rate: u32, duration: f32, decay: f32, seed: u64) -> Self {
        let len = ((sample_rate as f32 * duration.max(0.0)) as usize).max(1);
        let mut rng = StdRng::seed_from_u64(seed);
        let mut left = Vec::with_capacity(len);
        let mut right = Vec::with_capacity(len);
        for i in 0..len {
            let envelope = (1.0 - i as f32 / len as f32).powf(decay);
            left.push(rng.random_range(-1.0..1.0) * envelope);
            right.push(rng.random_range(-1.0..1.0) * envelope);
        }
        let mut ir = Self { left, right };
        ir.normalize();
        log::debug!(
            "Generated {:.2}s impulse response ({} taps, decay {})",
            duration,
            len,
            decay
        );
        ir
    }

    fn normalize(&mut self) {
        let energy = |taps: &[f32]| taps.iter().map(|t| t * t).sum::<f32>();
        let mean = (energy(&self.left) + energy(&self.right)) / 2.0;
        if mean > 0.0 {
            let scale = 1.0 / mean.sqrt();
            self.left.iter_mut().chain(self.right.iter_mut()).for_each(|t| *t *= scale);
        }
    }

    pub fn len(&self) -> usize {
        self.left.len()
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    pub fn left(&self) -> &[f32] {
        &self.left
    }

    pub fn right(&self) -> &[f32] {
        &self.right
    }
}

/// Per-channel convolution state
struct ChannelConvolver {
    /// IR partition spectra
    partitions: Vec<Vec<Complex<f32>>>,
    /// Frequency-domain delay line of past input spectra
    fdl: Vec<Vec<Complex<f32>>>,
    fdl_head: usize,
    /// Last two input blocks, time domain
    history: Vec<f32>,
    input: Vec<f32>,
    output: Vec<f32>,
    accum: Vec<Complex<f32>>,
    time: Vec<f32>,
}

impl ChannelConvolver {
    fn new(taps: &[f32], block: usize, fft: &dyn RealToComplex<f32>) -> Self {
        let n = block * 2;
        let bins = n / 2 + 1;
        let mut scratch = fft.make_scratch_vec();
        let partitions: Vec<Vec<Complex<f32>>> = taps
            .chunks(block)
            .map(|chunk| {
                let mut padded = vec![0.0; n];
                padded[..chunk.len()].copy_from_slice(chunk);
                let mut spectrum = fft.make_output_vec();
                if fft.process_with_scratch(&mut padded, &mut spectrum, &mut scratch).is_err() {
                    log::warn!("Impulse response partition FFT failed, using silence");
                    spectrum.fill(Complex::new(0.0, 0.0));
                }
                spectrum
            })
            .collect();
        let count = partitions.len();
        Self {
            partitions,
            fdl: vec![vec![Complex::new(0.0, 0.0); bins]; count],
            fdl_head: 0,
            history: vec![0.0; n],
            input: vec![0.0; block],
            output: vec![0.0; block],
            accum: vec![Complex::new(0.0, 0.0); bins],
            time: vec![0.0; n],
        }
    }

    fn reset(&mut self) {
        for spectrum in &mut self.fdl {
            spectrum.fill(Complex::new(0.0, 0.0));
        }
        self.history.fill(0.0);
        self.input.fill(0.0);
        self.output.fill(0.0);
    }

    /// Convolve the filled input block, leaving the result in `output`
    fn run_block(
        &mut self,
        fft: &dyn RealToComplex<f32>,
        ifft: &dyn ComplexToReal<f32>,
        fwd_scratch: &mut [Complex<f32>],
        inv_scratch: &mut [Complex<f32>],
    ) {
        let block = self.input.len();
        let n = block * 2;
        let count = self.partitions.len();

        self.history.copy_within(block.., 0);
        self.history[block..].copy_from_slice(&self.input);

        self.fdl_head = (self.fdl_head + 1) % count;
        self.time.copy_from_slice(&self.history);
        if fft
            .process_with_scratch(&mut self.time, &mut self.fdl[self.fdl_head], fwd_scratch)
            .is_err()
        {
            self.output.fill(0.0);
            return;
        }

        self.accum.fill(Complex::new(0.0, 0.0));
        for (p, partition) in self.partitions.iter().enumerate() {
            let spectrum = &self.fdl[(self.fdl_head + count - p) % count];
            for ((acc, x), h) in self.accum.iter_mut().zip(spectrum).zip(partition) {
                *acc += x * h;
            }
        }
        // DC and Nyquist bins of a real signal have no imaginary part
        let last = self.accum.len() - 1;
        self.accum[0].im = 0.0;
        self.accum[last].im = 0.0;

        if ifft
            .process_with_scratch(&mut self.accum, &mut self.time, inv_scratch)
            .is_err()
        {
            self.output.fill(0.0);
            return;
        }

        let scale = 1.0 / n as f32;
        for (out, &y) in self.output.iter_mut().zip(&self.time[block..]) {
            *out = y * scale;
        }
    }
}

/// Convolution reverb (fully wet)
///
/// Output is delayed by one partition ([`latency_samples`](Effect::latency_samples)).
pub struct ConvolutionReverb {
    base: EffectBase,
    block: usize,
    pos: usize,
    fft: Arc<dyn RealToComplex<f32>>,
    ifft: Arc<dyn ComplexToReal<f32>>,
    fwd_scratch: Vec<Complex<f32>>,
    inv_scratch: Vec<Complex<f32>>,
    channels: [ChannelConvolver; 2],
}

impl ConvolutionReverb {
    pub fn new(ir: &ImpulseResponse, block: usize) -> Self {
        let block = block.max(1);
        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(block * 2);
        let ifft = planner.plan_fft_inverse(block * 2);

        let channels = [
            ChannelConvolver::new(ir.left(), block, fft.as_ref()),
            ChannelConvolver::new(ir.right(), block, fft.as_ref()),
        ];

        let mut info = EffectInfo::new("Room Reverb", "Reverb");
        info.latency_samples = block as u32;

        log::info!(
            "Convolution reverb: {} taps, {} partitions of {} samples",
            ir.len(),
            channels[0].partitions.len(),
            block
        );

        Self {
            base: EffectBase::new(info),
            block,
            pos: 0,
            fwd_scratch: fft.make_scratch_vec(),
            inv_scratch: ifft.make_scratch_vec(),
            fft,
            ifft,
            channels,
        }
    }

    pub fn block_size(&self) -> usize {
        self.block
    }
}

impl Effect for ConvolutionReverb {
    fn process(&mut self, buffer: &mut StereoBuffer) {
        if self.base.is_bypassed() {
            return;
        }

        for sample in buffer.iter_mut() {
            let [left, right] = &mut self.channels;
            left.input[self.pos] = sample.left;
            right.input[self.pos] = sample.right;
            sample.left = left.output[self.pos];
            sample.right = right.output[self.pos];

            self.pos += 1;
            if self.pos == self.block {
                self.pos = 0;
                for channel in self.channels.iter_mut() {
                    channel.run_block(
                        self.fft.as_ref(),
                        self.ifft.as_ref(),
                        &mut self.fwd_scratch,
                        &mut self.inv_scratch,
                    );
                }
            }
        }
    }

    fn latency_samples(&self) -> u32 {
        self.block as u32
    }

    fn info(&self) -> &EffectInfo {
        self.base.info()
    }

    fn get_params(&self) -> &[ParamValue] {
        self.base.get_params()
    }

    fn set_param(&mut self, index: usize, value: f32) {
        self.base.set_param(index, value);
    }

    fn set_param_actual(&mut self, index: usize, value: f32) {
        self.base.set_param_actual(index, value);
    }

    fn set_bypass(&mut self, bypass: bool) {
        if self.base.set_bypass(bypass) {
            self.reset();
        }
    }

    fn is_bypassed(&self) -> bool {
        self.base.is_bypassed()
    }

    fn reset(&mut self) {
        self.pos = 0;
        for channel in self.channels.iter_mut() {
            channel.reset();
        }
    }
}
