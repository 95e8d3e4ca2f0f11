//! Track analysis service
//!
//! Analysis results are structured text: a title, a description and an
//! ordered list of label/value pairs. [`CannedAnalysisService`] answers every
//! request with a fixed result per [`AnalysisKind`] after a simulated
//! response delay; no audio is inspected.

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Message surfaced for any failed analysis
pub const ANALYSIS_FAILED_MESSAGE: &str = "Failed to get analysis from AI.";

/// Kind of analysis to request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    KeyCharacteristics,
    MusicalAnalysis,
    ProductionSuggestions,
}

impl AnalysisKind {
    pub const ALL: [AnalysisKind; 3] = [
        AnalysisKind::KeyCharacteristics,
        AnalysisKind::MusicalAnalysis,
        AnalysisKind::ProductionSuggestions,
    ];

    /// Display label, also used in the request prompt
    pub fn label(&self) -> &'static str {
        match self {
            AnalysisKind::KeyCharacteristics => "Key Characteristics",
            AnalysisKind::MusicalAnalysis => "Musical Analysis",
            AnalysisKind::ProductionSuggestions => "Production Suggestions",
        }
    }
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for AnalysisKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "key" | "characteristics" | "key_characteristics" | "key characteristics" => {
                Ok(AnalysisKind::KeyCharacteristics)
            }
            "musical" | "music" | "musical_analysis" | "musical analysis" => Ok(AnalysisKind::MusicalAnalysis),
            "production" | "suggestions" | "production_suggestions" | "production suggestions" => {
                Ok(AnalysisKind::ProductionSuggestions)
            }
            other => Err(format!(
                "Unknown analysis kind '{}' (expected key, musical or production)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisItem {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub title: String,
    pub description: String,
    pub items: Vec<AnalysisItem>,
}

impl fmt::Display for AnalysisResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.title)?;
        writeln!(f, "{}", self.description)?;
        let width = self.items.iter().map(|i| i.label.len()).max().unwrap_or(0);
        for item in &self.items {
            writeln!(f, "  {:<width$}  {}", item.label, item.value, width = width)?;
        }
        Ok(())
    }
}

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Please upload an audio file to begin analysis.")]
    NoAudio,

    #[error("{}", ANALYSIS_FAILED_MESSAGE)]
    Failed {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Source of analysis results for a named audio file
pub trait AnalysisService: Send + Sync {
    fn analyze(&self, file_name: &str, kind: AnalysisKind) -> Result<AnalysisResult, AnalysisError>;
}

/// Request prompt for a file and analysis kind
pub fn build_prompt(file_name: &str, kind: AnalysisKind) -> String {
    format!(
        "Analyze the audio file named \"{}\" and provide its {}.",
        file_name,
        kind.label()
    )
}

/// Simulated response delay range
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LatencyRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl Default for LatencyRange {
    fn default() -> Self {
        Self {
            min_ms: 1500,
            max_ms: 2500,
        }
    }
}

impl LatencyRange {
    pub fn none() -> Self {
        Self { min_ms: 0, max_ms: 0 }
    }
}

/// Analysis service that answers with fixed results
pub struct CannedAnalysisService {
    latency: LatencyRange,
    rng: Mutex<StdRng>,
}

impl CannedAnalysisService {
    pub fn new(latency: LatencyRange, seed: u64) -> Self {
        Self {
            latency,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn delay(&self) -> Duration {
        let LatencyRange { min_ms, max_ms } = self.latency;
        if max_ms <= min_ms {
            return Duration::from_millis(min_ms);
        }
        let ms = match self.rng.lock() {
            Ok(mut rng) => rng.random_range(min_ms..max_ms),
            Err(_) => min_ms,
        };
        Duration::from_millis(ms)
    }

    /// Produce the raw JSON response for a request kind
    fn respond(&self, kind: AnalysisKind) -> &'static str {
        thread::sleep(self.delay());
        match kind {
            AnalysisKind::KeyCharacteristics => KEY_CHARACTERISTICS,
            AnalysisKind::MusicalAnalysis => MUSICAL_ANALYSIS,
            AnalysisKind::ProductionSuggestions => PRODUCTION_SUGGESTIONS,
        }
    }
}

impl Default for CannedAnalysisService {
    fn default() -> Self {
        Self::new(LatencyRange::default(), 0)
    }
}

impl AnalysisService for CannedAnalysisService {
    fn analyze(&self, file_name: &str, kind: AnalysisKind) -> Result<AnalysisResult, AnalysisError> {
        let prompt = build_prompt(file_name, kind);
        log::info!("Analysis request: {}", prompt);

        let response = self.respond(kind);
        serde_json::from_str(response).map_err(|e| {
            log::error!("Error analyzing audio: {}", e);
            AnalysisError::Failed { source: Box::new(e) }
        })
    }
}

/// Results received so far, newest first
#[derive(Debug, Clone, Default)]
pub struct AnalysisHistory {
    results: VecDeque<AnalysisResult>,
}

impl AnalysisHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, result: AnalysisResult) {
        self.results.push_front(result);
    }

    pub fn latest(&self) -> Option<&AnalysisResult> {
        self.results.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AnalysisResult> {
        self.results.iter()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn clear(&mut self) {
        self.results.clear();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Canned Responses
// ─────────────────────────────────────────────────────────────────────────────

const KEY_CHARACTERISTICS: &str = r#"{
    "title": "Key Characteristics",
    "description": "An AI-powered breakdown of the core audio features.",
    "items": [
        {"label": "Genre", "value": "Ambient Electronic"},
        {"label": "Mood", "value": "Introspective, Calm, Ethereal"},
        {"label": "Tempo", "value": "Approx. 80 BPM"},
        {"label": "Key", "value": "C Minor"},
        {"label": "Instrumentation", "value": "Synthesizer Pads, Digital Reverb, Subtle Arpeggios"}
    ]
}"#;

const MUSICAL_ANALYSIS: &str = r#"{
    "title": "Musical Analysis",
    "description": "A deeper dive into the composition and structure.",
    "items": [
        {"label": "Structure", "value": "AABA form with a slow build-up and gradual fade-out."},
        {"label": "Harmony", "value": "Uses simple diatonic chords, creating a consonant and pleasing soundscape."},
        {"label": "Rhythm", "value": "Lacks a strong percussive element, rhythm is driven by the pulsing of synth pads."},
        {"label": "Melody", "value": "A simple, recurring melodic motif is introduced in the B section."}
    ]
}"#;

const PRODUCTION_SUGGESTIONS: &str = r#"{
    "title": "Production Suggestions",
    "description": "AI-generated ideas to enhance the track's production quality.",
    "items": [
        {"label": "Mixing", "value": "Add a gentle sidechain compression to the pads triggered by a ghost kick to create more rhythmic pulse."},
        {"label": "Creative", "value": "Consider adding a recorded real-world texture, like soft rain or vinyl crackle, to add depth."},
        {"label": "Mastering", "value": "Use a multi-band compressor to control the low-mid frequencies (200-500Hz) for clarity."},
        {"label": "Arrangement", "value": "Introduce a counter-melody with a bell-like synth in the second half to maintain listener interest."}
    ]
}"#;
