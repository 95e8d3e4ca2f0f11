//! Native Rust effects
//!
//! The EQ sections and the convolution room reverb used by the playback graph.

mod filter;
mod reverb;

pub use filter::{
    BiquadCoefficients, BiquadFilter, PeakingFilterEffect, ShelfFilterEffect, ShelfKind,
    PARAM_FREQUENCY, PARAM_GAIN, PARAM_Q,
};
pub use reverb::{
    ConvolutionReverb, ImpulseResponse, DEFAULT_BLOCK_SIZE, DEFAULT_IR_DECAY, DEFAULT_IR_DURATION,
};
