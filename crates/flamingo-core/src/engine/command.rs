//! Lock-free command queue for real-time audio engine control
//!
//! The control thread (the [`PlaybackHost`](crate::host::PlaybackHost))
//! sends commands via an `rtrb` SPSC ringbuffer, and the audio thread
//! processes them at the start of each block. Push and pop are wait-free and
//! the ringbuffer is allocated once at startup.
//!
//! ```ignore
//! let (tx, rx) = command_channel();
//!
//! // Control thread: send commands (non-blocking)
//! tx.push(EngineCommand::Play);
//!
//! // Audio thread: process pending commands
//! engine.process_commands(&mut rx);
//! ```

use basedrop::Shared;

use crate::effect::EffectSettings;
use crate::types::AudioBuffer;

/// Commands sent from the control thread to the audio thread
///
/// Commands are processed at block boundaries, so state never changes
/// mid-block.
pub enum EngineCommand {
    // ─────────────────────────────────────────────────────────────
    // Source Management
    // ─────────────────────────────────────────────────────────────
    /// Swap the transport to a new buffer, stopped at position 0
    ///
    /// `generation` tags the swap so transport events from the previous
    /// buffer can be told apart.
    LoadBuffer {
        buffer: Shared<AudioBuffer>,
        generation: u64,
    },

    // ─────────────────────────────────────────────────────────────
    // Playback Control
    // ─────────────────────────────────────────────────────────────
    Play,
    Pause,
    /// Stop and rewind to the start
    Stop,
    /// Move the playhead to a source frame
    Seek { frame: u64 },

    // ─────────────────────────────────────────────────────────────
    // Effects
    // ─────────────────────────────────────────────────────────────
    /// Apply a full effect parameter set to the graph
    ///
    /// Boxed to keep the enum small; the settings carry a band list.
    ApplyEffects(Box<EffectSettings>),
}

/// Capacity of the command queue
///
/// Settings changes arrive one command per edit, so a modest queue
/// absorbs even rapid console input between audio blocks.
pub const COMMAND_QUEUE_CAPACITY: usize = 256;

/// Create a new command channel (producer/consumer pair)
///
/// Returns `(Producer, Consumer)` where:
/// - Producer: Send side, owned by the control thread
/// - Consumer: Receive side, owned by the audio thread
pub fn command_channel() -> (rtrb::Producer<EngineCommand>, rtrb::Consumer<EngineCommand>) {
    rtrb::RingBuffer::new(COMMAND_QUEUE_CAPACITY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_channel_creation() {
        let (mut tx, mut rx) = command_channel();

        assert!(tx.push(EngineCommand::Play).is_ok());

        let cmd = rx.pop().ok();
        assert!(matches!(cmd, Some(EngineCommand::Play)));
    }

    #[test]
    fn test_command_channel_empty() {
        let (_tx, mut rx) = command_channel();
        assert!(rx.pop().is_err());
    }

    #[test]
    fn test_command_size() {
        // Large payloads must be boxed or shared to keep queue slots small
        let size = std::mem::size_of::<EngineCommand>();
        assert!(size <= 24, "EngineCommand is {} bytes, expected <= 24", size);
    }
}
