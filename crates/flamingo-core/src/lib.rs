//! Flamingo Core - slice-and-remix engine and playback host for Flamingo Studio

pub mod analysis;
pub mod audio;
pub mod audio_file;
pub mod config;
pub mod effect;
pub mod engine;
pub mod host;
pub mod loader;
pub mod slicer;
pub mod types;

pub use types::*;
