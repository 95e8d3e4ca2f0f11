//! Playback transport
//!
//! Reads the current buffer at the device rate. Buffers keep their decoded
//! sample rate; when it differs from the output rate the transport steps
//! through the source at `source_rate / output_rate` frames per output sample
//! with linear interpolation.

use basedrop::Shared;

use crate::types::{AudioBuffer, PlayState, StereoBuffer, StereoSample};

/// Outcome of rendering one block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderStatus {
    /// The end of the buffer was reached during this block
    pub finished: bool,
}

pub struct Transport {
    buffer: Option<Shared<AudioBuffer>>,
    /// Playhead in source frames (fractional)
    position: f64,
    /// Source frames per output frame
    step: f64,
    output_rate: u32,
    state: PlayState,
}

impl Transport {
    pub fn new(output_rate: u32) -> Self {
        Self {
            buffer: None,
            position: 0.0,
            step: 1.0,
            output_rate: output_rate.max(1),
            state: PlayState::Stopped,
        }
    }

    /// Replace the source; playback stops and rewinds
    ///
    /// The previous buffer is dropped here. On the audio thread that only
    /// enqueues it for the collector.
    pub fn load(&mut self, buffer: Shared<AudioBuffer>) {
        self.step = buffer.sample_rate() as f64 / self.output_rate as f64;
        self.buffer = Some(buffer);
        self.position = 0.0;
        self.state = PlayState::Stopped;
    }

    pub fn is_loaded(&self) -> bool {
        self.buffer.is_some()
    }

    pub fn state(&self) -> PlayState {
        self.state
    }

    /// Current playhead in source frames
    pub fn position(&self) -> u64 {
        self.position as u64
    }

    pub fn frame_count(&self) -> usize {
        self.buffer.as_ref().map(|b| b.frame_count()).unwrap_or(0)
    }

    /// Start or resume; ignored without a buffer
    pub fn play(&mut self) {
        if self.buffer.is_some() {
            self.state = PlayState::Playing;
        }
    }

    /// Pause; only meaningful while playing
    pub fn pause(&mut self) {
        if self.state == PlayState::Playing {
            self.state = PlayState::Paused;
        }
    }

    pub fn stop(&mut self) {
        self.state = PlayState::Stopped;
        self.position = 0.0;
    }

    /// Move the playhead, clamped to the buffer
    pub fn seek(&mut self, frame: u64) {
        let max = self.frame_count() as u64;
        self.position = frame.min(max) as f64;
    }

    /// Fill `out` from the buffer, silence when not playing
    pub fn render(&mut self, out: &mut StereoBuffer) -> RenderStatus {
        let buffer = match (&self.buffer, self.state) {
            (Some(buffer), PlayState::Playing) => buffer,
            _ => {
                out.fill_silence();
                return RenderStatus::default();
            }
        };

        let frames = buffer.frame_count();
        let mut status = RenderStatus::default();
        for sample in out.iter_mut() {
            let index = self.position as usize;
            if index >= frames {
                *sample = StereoSample::silence();
                status.finished = true;
                continue;
            }
            let frac = (self.position - index as f64) as f32;
            let current = buffer.stereo_frame(index);
            *sample = if frac > 0.0 && index + 1 < frames {
                let next = buffer.stereo_frame(index + 1);
                current * (1.0 - frac) + next * frac
            } else {
                current
            };
            self.position += self.step;
        }

        if status.finished {
            self.state = PlayState::Stopped;
            self.position = 0.0;
        }
        status
    }
}
