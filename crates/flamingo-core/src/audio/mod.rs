//! Audio output
//!
//! The render thread owns the [`AudioEngine`](crate::engine::AudioEngine)
//! exclusively. The control thread sends commands over a lock-free
//! ringbuffer and reads playback state from relaxed atomics, so neither side
//! ever blocks the other.
//!
//! Output goes to a cpal device. Without one, a headless render thread keeps
//! the engine running at real-time pace.
//!
//! ```ignore
//! use flamingo_core::audio::{start_audio_system, AudioConfig, EngineSetup};
//!
//! let mut system = start_audio_system(&AudioConfig::default(), &EngineSetup::default())?;
//! system.command_sender.send(EngineCommand::Play)?;
//! let seconds = system.atomics.position_seconds();
//! ```

mod backend;
mod config;
mod cpal_backend;
mod device;
mod error;
mod headless;

pub use backend::{start_audio_system, AudioHandle, AudioSystemResult, CommandSender, EngineSetup};
pub use config::{AudioConfig, BufferSize, DeviceId, DEFAULT_BUFFER_SIZE, DEFAULT_SAMPLE_RATE, MAX_BUFFER_SIZE};
pub use cpal_backend::CpalAudioHandle;
pub use device::{get_output_devices, OutputDevice};
pub use error::{AudioError, AudioResult};
pub use headless::HeadlessHandle;
