//! Audio engine - transport, signal graph, command queue
//!
//! This module contains the realtime side of playback:
//! - Transport: plays the current buffer at the device rate
//! - SignalGraph: static EQ and dry/wet reverb chain
//! - Command queue and GC for lock-free control from the host
//! - AudioEngine: owns transport and graph on the audio thread

mod command;
mod engine;
pub mod gc;
mod graph;
mod transport;

pub use command::*;
pub use engine::*;
pub use graph::*;
pub use transport::*;
