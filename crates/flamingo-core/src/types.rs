//! Common types for Flamingo
//!
//! This module contains the fundamental audio types used throughout the
//! studio: the decoded multi-channel [`AudioBuffer`] that slicing operates on,
//! and the stereo block types used by the realtime render path.

use std::ops::{Index, IndexMut};

use thiserror::Error;

/// Default output sample rate when no device is available (48kHz)
pub const SAMPLE_RATE: u32 = 48000;

/// Audio sample type (32-bit float for processing)
pub type Sample = f32;

/// A single stereo sample (left and right channels)
///
/// Uses `#[repr(C)]` to ensure predictable memory layout: [left, right].
/// This enables zero-copy conversion between `&[StereoSample]` and `&[f32]`
/// (interleaved format) using bytemuck.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct StereoSample {
    pub left: Sample,
    pub right: Sample,
}

impl StereoSample {
    /// Create a new stereo sample
    #[inline]
    pub fn new(left: Sample, right: Sample) -> Self {
        Self { left, right }
    }

    /// Create a silent stereo sample
    #[inline]
    pub fn silence() -> Self {
        Self::default()
    }

    /// Create a mono sample (same value in both channels)
    #[inline]
    pub fn mono(value: Sample) -> Self {
        Self { left: value, right: value }
    }

    /// Get the peak amplitude (max of abs(left), abs(right))
    #[inline]
    pub fn peak(&self) -> Sample {
        self.left.abs().max(self.right.abs())
    }
}

impl std::ops::Add for StereoSample {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Self {
            left: self.left + other.left,
            right: self.right + other.right,
        }
    }
}

impl std::ops::AddAssign for StereoSample {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.left += other.left;
        self.right += other.right;
    }
}

impl std::ops::Mul<Sample> for StereoSample {
    type Output = Self;

    #[inline]
    fn mul(self, factor: Sample) -> Self {
        Self {
            left: self.left * factor,
            right: self.right * factor,
        }
    }
}

impl std::ops::MulAssign<Sample> for StereoSample {
    #[inline]
    fn mul_assign(&mut self, factor: Sample) {
        self.left *= factor;
        self.right *= factor;
    }
}

/// A block of stereo samples
///
/// The render path works in blocks of these: the engine fills one per audio
/// callback and every effect processes it in place.
#[derive(Debug, Clone, Default)]
pub struct StereoBuffer {
    samples: Vec<StereoSample>,
}

impl StereoBuffer {
    /// Create a buffer filled with silence
    pub fn silence(len: usize) -> Self {
        Self {
            samples: vec![StereoSample::silence(); len],
        }
    }

    /// Create a buffer from an existing Vec of StereoSamples
    pub fn from_vec(samples: Vec<StereoSample>) -> Self {
        Self { samples }
    }

    /// Get the number of stereo samples in the buffer
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if the buffer is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Set the working length of a pre-allocated buffer (real-time safe)
    ///
    /// Fills any newly exposed elements with silence. Growing past capacity
    /// allocates, so callers pre-allocate with [`StereoBuffer::silence`].
    #[inline]
    pub fn set_len_from_capacity(&mut self, new_len: usize) {
        let current_len = self.samples.len();
        if new_len > current_len {
            debug_assert!(
                new_len <= self.samples.capacity(),
                "set_len_from_capacity called with len > capacity"
            );
            self.samples.resize(new_len, StereoSample::silence());
        } else {
            self.samples.truncate(new_len);
        }
    }

    /// Fill the buffer with silence
    pub fn fill_silence(&mut self) {
        self.samples.fill(StereoSample::silence());
    }

    /// Get a slice of the samples
    #[inline]
    pub fn as_slice(&self) -> &[StereoSample] {
        &self.samples
    }

    /// Get a mutable slice of the samples
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [StereoSample] {
        &mut self.samples
    }

    /// Get a zero-copy view of samples as interleaved f32 [L, R, L, R, ...]
    #[inline]
    pub fn as_interleaved(&self) -> &[Sample] {
        bytemuck::cast_slice(&self.samples)
    }

    /// Add another buffer to this one (summing samples)
    pub fn add_buffer(&mut self, other: &StereoBuffer) {
        debug_assert_eq!(self.len(), other.len(), "Buffer lengths must match");
        for (dst, src) in self.samples.iter_mut().zip(other.samples.iter()) {
            *dst += *src;
        }
    }

    /// Scale all samples by a factor
    pub fn scale(&mut self, factor: Sample) {
        for sample in &mut self.samples {
            *sample *= factor;
        }
    }

    /// Copy from another buffer (real-time safe if pre-allocated)
    ///
    /// Will not allocate if `self.capacity() >= other.len()`.
    pub fn copy_from(&mut self, other: &StereoBuffer) {
        let len = other.samples.len();
        debug_assert!(
            len <= self.samples.capacity(),
            "copy_from: insufficient capacity ({} < {})",
            self.samples.capacity(),
            len
        );
        self.set_len_from_capacity(len);
        self.samples[..len].copy_from_slice(&other.samples[..len]);
    }

    /// Get an iterator over the samples
    pub fn iter(&self) -> impl Iterator<Item = &StereoSample> {
        self.samples.iter()
    }

    /// Get a mutable iterator over the samples
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut StereoSample> {
        self.samples.iter_mut()
    }

    /// Get the peak amplitude in the buffer
    pub fn peak(&self) -> Sample {
        self.samples.iter().map(|s| s.peak()).fold(0.0, Sample::max)
    }
}

impl Index<usize> for StereoBuffer {
    type Output = StereoSample;

    #[inline]
    fn index(&self, index: usize) -> &Self::Output {
        &self.samples[index]
    }
}

impl IndexMut<usize> for StereoBuffer {
    #[inline]
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.samples[index]
    }
}

/// Errors raised when constructing an [`AudioBuffer`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AudioBufferError {
    #[error("Audio buffer must have at least one channel")]
    NoChannels,

    #[error("Sample rate must be positive")]
    ZeroSampleRate,

    #[error("Channel {channel} has {actual} frames, expected {expected}")]
    ChannelLengthMismatch {
        channel: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Interleaved data length {len} is not a multiple of {channels} channels")]
    RaggedInterleaved { len: usize, channels: usize },
}

/// A fully decoded, immutable multi-channel audio buffer
///
/// Samples are stored planar (one `Vec` per channel). Every channel holds
/// exactly [`frame_count`](Self::frame_count) samples and all channels share
/// one sample rate; the constructors enforce this and there are no mutating
/// accessors, so the invariant holds for the buffer's whole life.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    channels: Vec<Vec<Sample>>,
    sample_rate: u32,
}

impl AudioBuffer {
    /// Build a buffer from planar channel data
    pub fn new(channels: Vec<Vec<Sample>>, sample_rate: u32) -> Result<Self, AudioBufferError> {
        if channels.is_empty() {
            return Err(AudioBufferError::NoChannels);
        }
        if sample_rate == 0 {
            return Err(AudioBufferError::ZeroSampleRate);
        }
        let expected = channels[0].len();
        if let Some((channel, data)) = channels
            .iter()
            .enumerate()
            .find(|(_, data)| data.len() != expected)
        {
            return Err(AudioBufferError::ChannelLengthMismatch {
                channel,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { channels, sample_rate })
    }

    /// A zero-filled buffer
    pub fn silent(
        channel_count: usize,
        frames: usize,
        sample_rate: u32,
    ) -> Result<Self, AudioBufferError> {
        Self::new(vec![vec![0.0; frames]; channel_count], sample_rate)
    }

    /// A single-channel buffer
    pub fn from_mono(samples: Vec<Sample>, sample_rate: u32) -> Result<Self, AudioBufferError> {
        Self::new(vec![samples], sample_rate)
    }

    /// De-interleave `[c0, c1, .., c0, c1, ..]` data into a planar buffer
    pub fn from_interleaved(
        interleaved: &[Sample],
        channel_count: usize,
        sample_rate: u32,
    ) -> Result<Self, AudioBufferError> {
        if channel_count == 0 {
            return Err(AudioBufferError::NoChannels);
        }
        if interleaved.len() % channel_count != 0 {
            return Err(AudioBufferError::RaggedInterleaved {
                len: interleaved.len(),
                channels: channel_count,
            });
        }
        let frames = interleaved.len() / channel_count;
        let mut channels = vec![Vec::with_capacity(frames); channel_count];
        for frame in interleaved.chunks_exact(channel_count) {
            for (channel, &sample) in channels.iter_mut().zip(frame) {
                channel.push(sample);
            }
        }
        Self::new(channels, sample_rate)
    }

    #[inline]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of frames (samples per channel)
    #[inline]
    pub fn frame_count(&self) -> usize {
        self.channels[0].len()
    }

    /// Duration in seconds
    pub fn duration_seconds(&self) -> f64 {
        self.frame_count() as f64 / self.sample_rate as f64
    }

    /// Samples of one channel
    #[inline]
    pub fn channel(&self, index: usize) -> &[Sample] {
        &self.channels[index]
    }

    /// All channels, planar
    pub fn channels(&self) -> &[Vec<Sample>] {
        &self.channels
    }

    /// Read one frame as stereo
    ///
    /// Mono is duplicated to both sides; channels beyond the second are ignored.
    #[inline]
    pub fn stereo_frame(&self, frame: usize) -> StereoSample {
        let left = self.channels[0][frame];
        match self.channels.get(1) {
            Some(right) => StereoSample::new(left, right[frame]),
            None => StereoSample::mono(left),
        }
    }

    /// Interleave into `[c0, c1, .., c0, c1, ..]`
    pub fn to_interleaved(&self) -> Vec<Sample> {
        let channel_count = self.channel_count();
        let mut out = Vec::with_capacity(self.frame_count() * channel_count);
        for frame in 0..self.frame_count() {
            for channel in &self.channels {
                out.push(channel[frame]);
            }
        }
        out
    }
}

/// Playback state of the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

impl PlayState {
    pub(crate) fn to_u8(self) -> u8 {
        match self {
            PlayState::Stopped => 0,
            PlayState::Playing => 1,
            PlayState::Paused => 2,
        }
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => PlayState::Playing,
            2 => PlayState::Paused,
            _ => PlayState::Stopped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stereo_sample_operations() {
        let a = StereoSample::new(1.0, 2.0);
        let b = StereoSample::new(0.5, 0.5);

        let sum = a + b;
        assert_eq!(sum.left, 1.5);
        assert_eq!(sum.right, 2.5);

        let scaled = a * 0.5;
        assert_eq!(scaled.left, 0.5);
        assert_eq!(scaled.right, 1.0);
    }

    #[test]
    fn test_stereo_buffer_set_len_within_capacity() {
        let mut buffer = StereoBuffer::silence(16);
        buffer.set_len_from_capacity(4);
        assert_eq!(buffer.len(), 4);
        buffer.set_len_from_capacity(16);
        assert_eq!(buffer.len(), 16);
        assert_eq!(buffer.peak(), 0.0);
    }

    #[test]
    fn test_stereo_buffer_interleaved_view() {
        let buffer = StereoBuffer::from_vec(vec![
            StereoSample::new(1.0, 2.0),
            StereoSample::new(3.0, 4.0),
        ]);
        assert_eq!(buffer.as_interleaved(), &[1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_audio_buffer_rejects_ragged_channels() {
        let err = AudioBuffer::new(vec![vec![0.0; 4], vec![0.0; 3]], 44100).unwrap_err();
        assert_eq!(
            err,
            AudioBufferError::ChannelLengthMismatch {
                channel: 1,
                expected: 4,
                actual: 3
            }
        );
        assert_eq!(
            AudioBuffer::new(vec![], 44100).unwrap_err(),
            AudioBufferError::NoChannels
        );
        assert_eq!(
            AudioBuffer::new(vec![vec![0.0]], 0).unwrap_err(),
            AudioBufferError::ZeroSampleRate
        );
    }

    #[test]
    fn test_audio_buffer_interleave_roundtrip() {
        let buffer = AudioBuffer::from_interleaved(&[1.0, -1.0, 2.0, -2.0, 3.0, -3.0], 2, 8000)
            .unwrap();
        assert_eq!(buffer.channel_count(), 2);
        assert_eq!(buffer.frame_count(), 3);
        assert_eq!(buffer.channel(1), &[-1.0, -2.0, -3.0]);
        assert_eq!(buffer.to_interleaved(), vec![1.0, -1.0, 2.0, -2.0, 3.0, -3.0]);
    }

    #[test]
    fn test_audio_buffer_duration_and_stereo_frame() {
        let buffer = AudioBuffer::from_mono(vec![0.25; 22050], 44100).unwrap();
        assert!((buffer.duration_seconds() - 0.5).abs() < 1e-12);
        assert_eq!(buffer.stereo_frame(10), StereoSample::new(0.25, 0.25));
    }

    #[test]
    fn test_play_state_u8_roundtrip() {
        for state in [PlayState::Stopped, PlayState::Playing, PlayState::Paused] {
            assert_eq!(PlayState::from_u8(state.to_u8()), state);
        }
    }
}
