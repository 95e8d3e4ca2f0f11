//! Slice engine - offline beat-sliced remixing of a decoded buffer
//!
//! The engine cuts a buffer into eighth-note slices derived from a tempo and
//! reassembles them according to a pattern of slice indices. A pattern entry
//! may also be [`SlicePattern::SILENCE`], which reserves one slice of silence.
//!
//! ```text
//! source:  | s0 | s1 | s2 | s3 | s4 | s5 | s6 | s7 |..partial..|
//! pattern: [ 0, -1, 2, 99 ]
//! output:  | s0 | 00 | s2 | 00 |
//! ```
//!
//! Any index outside `[0, num_slices)` that is not the silence sentinel also
//! produces a slice of silence: the write cursor advances but nothing is copied.
//!
//! When the tempo and buffer length cannot produce a single whole slice the
//! remix is a no-op and the input is handed back unchanged.
//!
//! The engine is pure. Pattern generation (including random patterns) lives in
//! [`pattern`] and is seeded explicitly by the caller.

pub mod pattern;

pub use pattern::{PatternGenerator, PatternPreset};

use std::borrow::Cow;
use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{AudioBuffer, Sample};

/// Slices per beat (eighth notes)
pub const SLICES_PER_BEAT: f64 = 2.0;

/// Default tempo for new sessions
pub const DEFAULT_BPM: f64 = 120.0;

/// Tempo validation errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TempoError {
    #[error("Tempo must be a positive number of BPM, got {0}")]
    NotPositive(f64),

    #[error("Tempo must be finite")]
    NotFinite,
}

/// A validated tempo in beats per minute
///
/// Construction rejects zero, negative and non-finite values, so the slice
/// engine can trust any `Tempo` it receives.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
pub struct Tempo(f64);

impl Tempo {
    pub fn new(bpm: f64) -> Result<Self, TempoError> {
        if !bpm.is_finite() {
            return Err(TempoError::NotFinite);
        }
        if bpm <= 0.0 {
            return Err(TempoError::NotPositive(bpm));
        }
        Ok(Self(bpm))
    }

    #[inline]
    pub fn bpm(&self) -> f64 {
        self.0
    }

    /// Duration of one slice in seconds: `(60 / bpm) * 0.5`
    #[inline]
    pub fn slice_duration(&self) -> f64 {
        (60.0 / self.0) / SLICES_PER_BEAT
    }
}

impl Default for Tempo {
    fn default() -> Self {
        Self(DEFAULT_BPM)
    }
}

impl fmt::Display for Tempo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1} BPM", self.0)
    }
}

impl<'de> Deserialize<'de> for Tempo {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let bpm = f64::deserialize(deserializer)?;
        Tempo::new(bpm).map_err(serde::de::Error::custom)
    }
}

/// Slice segmentation of one buffer at one tempo
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SliceGrid {
    /// Slice duration in seconds
    pub slice_duration: f64,
    /// Frames per slice, `floor(slice_duration * sample_rate)`
    pub slice_frames: usize,
    /// Whole slices that fit in the buffer; a trailing partial slice is dropped
    pub num_slices: usize,
}

impl SliceGrid {
    pub fn new(buffer: &AudioBuffer, tempo: Tempo) -> Self {
        let slice_duration = tempo.slice_duration();
        let slice_frames = (slice_duration * buffer.sample_rate() as f64).floor() as usize;
        let by_duration = (buffer.duration_seconds() / slice_duration).floor() as usize;
        // Rounding in the duration ratio must never yield a slice that overruns the data
        let num_slices = match slice_frames {
            0 => 0,
            frames => by_duration.min(buffer.frame_count() / frames),
        };
        Self {
            slice_duration,
            slice_frames,
            num_slices,
        }
    }

    /// True when at least one whole, non-empty slice exists
    #[inline]
    pub fn is_usable(&self) -> bool {
        self.num_slices >= 1 && self.slice_frames > 0
    }

    /// Frame range of a slice, or `None` for silence and out-of-range entries
    #[inline]
    pub fn slice_range(&self, index: i32) -> Option<Range<usize>> {
        let index = usize::try_from(index).ok()?;
        (index < self.num_slices).then(|| {
            let start = index * self.slice_frames;
            start..start + self.slice_frames
        })
    }
}

/// Errors parsing a pattern from text
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatternParseError {
    #[error("Invalid slice index '{0}'")]
    InvalidToken(String),

    #[error("Negative slice index {0} (use -1 for silence)")]
    NegativeIndex(i32),
}

/// Ordered slice references defining a remix
///
/// Entries are slice indices or [`SlicePattern::SILENCE`]. Patterns may repeat
/// or omit indices and may be empty, which yields a zero-length remix.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlicePattern(Vec<i32>);

impl SlicePattern {
    /// Sentinel entry: one slice of silence
    pub const SILENCE: i32 = -1;

    pub fn new(entries: Vec<i32>) -> Self {
        Self(entries)
    }

    pub fn entries(&self) -> &[i32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<i32>> for SlicePattern {
    fn from(entries: Vec<i32>) -> Self {
        Self(entries)
    }
}

impl fmt::Display for SlicePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|i| i.to_string()).collect();
        write!(f, "[{}]", parts.join(", "))
    }
}

impl FromStr for SlicePattern {
    type Err = PatternParseError;

    /// Parse `"0, 1, -1, 3"` (commas and/or whitespace, optional brackets)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_start_matches('[').trim_end_matches(']');
        trimmed
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|token| !token.is_empty())
            .map(|token| {
                let value: i32 = token
                    .parse()
                    .map_err(|_| PatternParseError::InvalidToken(token.to_string()))?;
                if value < 0 && value != Self::SILENCE {
                    return Err(PatternParseError::NegativeIndex(value));
                }
                Ok(value)
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }
}

/// Remix a buffer by reassembling its eighth-note slices in pattern order
///
/// Returns `Cow::Borrowed(buffer)` when the buffer is too short for one whole
/// slice at this tempo. Otherwise returns a new buffer of
/// `pattern.len() * slice_frames` frames with the same channel count and
/// sample rate. Valid indices copy the source slice verbatim; the silence
/// sentinel and out-of-range indices leave a zero-filled slice.
pub fn remix<'a>(buffer: &'a AudioBuffer, tempo: Tempo, pattern: &SlicePattern) -> Cow<'a, AudioBuffer> {
    let grid = SliceGrid::new(buffer, tempo);
    if !grid.is_usable() {
        log::debug!(
            "remix: no whole slice at {} ({:.3}s buffer, {:.3}s slices), returning input",
            tempo,
            buffer.duration_seconds(),
            grid.slice_duration
        );
        return Cow::Borrowed(buffer);
    }

    let total_frames = pattern.len() * grid.slice_frames;
    let channels: Vec<Vec<Sample>> = buffer
        .channels()
        .par_iter()
        .map(|source| assemble_channel(source, &grid, pattern, total_frames))
        .collect();

    log::debug!(
        "remix: {} entries x {} frames ({} slices available) -> {} frames",
        pattern.len(),
        grid.slice_frames,
        grid.num_slices,
        total_frames
    );

    match AudioBuffer::new(channels, buffer.sample_rate()) {
        Ok(remixed) => Cow::Owned(remixed),
        // Unreachable: every channel is built with total_frames samples
        Err(e) => {
            log::error!("remix: assembled buffer rejected: {}", e);
            Cow::Borrowed(buffer)
        }
    }
}

fn assemble_channel(
    source: &[Sample],
    grid: &SliceGrid,
    pattern: &SlicePattern,
    total_frames: usize,
) -> Vec<Sample> {
    let mut out = vec![0.0; total_frames];
    for (dest, &entry) in out.chunks_exact_mut(grid.slice_frames).zip(pattern.entries()) {
        if let Some(range) = grid.slice_range(entry) {
            dest.copy_from_slice(&source[range]);
        }
    }
    out
}
