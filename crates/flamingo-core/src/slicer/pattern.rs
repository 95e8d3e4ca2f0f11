//! Remix pattern presets
//!
//! Presets turn a slice count into a concrete [`SlicePattern`]. Randomized
//! patterns draw from a seeded RNG owned by the generator, so the slice engine
//! stays a pure function of its inputs and tests can pin a seed.

use std::fmt;
use std::str::FromStr;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::SlicePattern;

/// Built-in remix presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternPreset {
    /// 0, 1, 2, ... (reconstructs the source)
    Straight,
    /// Slices in reverse order
    Reverse,
    /// Every slice played twice
    Stutter,
    /// Every odd step silent
    Gated,
    /// Uniform random picks, one per slice
    Randomized,
}

impl PatternPreset {
    pub const ALL: [PatternPreset; 5] = [
        PatternPreset::Straight,
        PatternPreset::Reverse,
        PatternPreset::Stutter,
        PatternPreset::Gated,
        PatternPreset::Randomized,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PatternPreset::Straight => "straight",
            PatternPreset::Reverse => "reverse",
            PatternPreset::Stutter => "stutter",
            PatternPreset::Gated => "gated",
            PatternPreset::Randomized => "random",
        }
    }
}

impl fmt::Display for PatternPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PatternPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "straight" => Ok(PatternPreset::Straight),
            "reverse" => Ok(PatternPreset::Reverse),
            "stutter" => Ok(PatternPreset::Stutter),
            "gated" | "gate" => Ok(PatternPreset::Gated),
            "random" | "randomized" => Ok(PatternPreset::Randomized),
            other => Err(format!("Unknown pattern preset: {}", other)),
        }
    }
}

/// Produces patterns from presets
pub struct PatternGenerator {
    rng: StdRng,
}

impl PatternGenerator {
    /// Generator with a fixed seed (same seed, same random patterns)
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Build a pattern for a buffer with `num_slices` slices
    ///
    /// An empty pattern is returned when `num_slices` is zero.
    pub fn generate(&mut self, preset: PatternPreset, num_slices: usize) -> SlicePattern {
        let n = index_limit(num_slices);
        let entries: Vec<i32> = match preset {
            PatternPreset::Straight => (0..n).collect(),
            PatternPreset::Reverse => (0..n).rev().collect(),
            PatternPreset::Stutter => (0..n).flat_map(|i| [i, i]).collect(),
            PatternPreset::Gated => (0..n)
                .map(|i| if i % 2 == 0 { i } else { SlicePattern::SILENCE })
                .collect(),
            PatternPreset::Randomized => {
                if n == 0 {
                    Vec::new()
                } else {
                    (0..n).map(|_| self.rng.random_range(0..n)).collect()
                }
            }
        };
        log::debug!("Generated {} pattern for {} slices", preset, num_slices);
        SlicePattern::new(entries)
    }
}

/// Slice count as an exclusive index bound; saturates at `i32::MAX`
fn index_limit(num_slices: usize) -> i32 {
    i32::try_from(num_slices).unwrap_or(i32::MAX)
}
