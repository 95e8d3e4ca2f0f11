//! Backend-independent audio system plumbing
//!
//! Both backends share the same lock-free shape:
//! - the host sends [`EngineCommand`]s through a ringbuffer
//! - the render thread owns the [`AudioEngine`] exclusively
//! - playback state comes back through atomics and an event queue

use std::sync::Arc;

use crate::config::ReverbConfig;
use crate::effect::native::ImpulseResponse;
use crate::effect::DEFAULT_BAND_COUNT;
use crate::engine::{
    command_channel, AudioEngine, EngineCommand, EngineConfig, TransportAtomics, TransportEventReceiver,
};
use crate::types::StereoBuffer;

use super::config::{AudioConfig, MAX_BUFFER_SIZE};
use super::cpal_backend::CpalAudioHandle;
use super::error::{AudioError, AudioResult};
use super::headless::HeadlessHandle;

/// What the engine is built with, independent of the device
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSetup {
    /// Number of parametric EQ bands in the graph
    pub band_count: usize,
    pub reverb: ReverbConfig,
}

impl Default for EngineSetup {
    fn default() -> Self {
        Self {
            band_count: DEFAULT_BAND_COUNT,
            reverb: ReverbConfig::default(),
        }
    }
}

/// Result of starting the audio system
pub struct AudioSystemResult {
    /// Keeps output alive (drop to stop)
    pub handle: AudioHandle,
    /// Command sender for the control thread (lock-free)
    pub command_sender: CommandSender,
    /// Transport state for lock-free reads
    pub atomics: Arc<TransportAtomics>,
    /// Ready / state / finished notifications from the engine
    pub events: TransportEventReceiver,
    pub sample_rate: u32,
    /// Actual buffer size in frames
    pub buffer_size: u32,
    /// Output latency in milliseconds
    pub latency_ms: f32,
}

/// Handle to the active audio output
pub enum AudioHandle {
    Cpal(CpalAudioHandle),
    /// No device; a paced thread drives the engine
    Headless(HeadlessHandle),
}

impl AudioHandle {
    pub fn sample_rate(&self) -> u32 {
        match self {
            AudioHandle::Cpal(h) => h.sample_rate(),
            AudioHandle::Headless(h) => h.sample_rate(),
        }
    }

    pub fn buffer_size(&self) -> u32 {
        match self {
            AudioHandle::Cpal(h) => h.buffer_size(),
            AudioHandle::Headless(h) => h.buffer_size(),
        }
    }

    pub fn latency_ms(&self) -> f32 {
        (self.buffer_size() as f32 / self.sample_rate().max(1) as f32) * 1000.0
    }

    pub fn is_headless(&self) -> bool {
        matches!(self, AudioHandle::Headless(_))
    }
}

/// Command sender for the control thread
///
/// Wraps the lock-free producer for sending EngineCommand to the render thread.
pub struct CommandSender {
    producer: rtrb::Producer<EngineCommand>,
}

impl CommandSender {
    pub fn new(producer: rtrb::Producer<EngineCommand>) -> Self {
        Self { producer }
    }

    /// Send a command to the audio engine (non-blocking)
    ///
    /// Returns `Err(cmd)` if the queue is full.
    pub fn send(&mut self, cmd: EngineCommand) -> Result<(), EngineCommand> {
        self.producer.push(cmd).map_err(|e| match e {
            rtrb::PushError::Full(value) => value,
        })
    }

    /// Check if the queue has space for more commands
    pub fn has_space(&self) -> bool {
        self.producer.slots() > 0
    }
}

/// Render-side state: the engine, its command queue and a block buffer
pub(crate) struct AudioCallbackState {
    engine: AudioEngine,
    command_rx: rtrb::Consumer<EngineCommand>,
    block: StereoBuffer,
}

impl AudioCallbackState {
    fn new(engine: AudioEngine, command_rx: rtrb::Consumer<EngineCommand>) -> Self {
        Self {
            engine,
            command_rx,
            block: StereoBuffer::silence(MAX_BUFFER_SIZE),
        }
    }

    /// Fill an interleaved device buffer with `channels` channels per frame
    ///
    /// Large requests are rendered in several engine blocks. Channels beyond
    /// the first two are silent; a mono device gets the left channel.
    pub(crate) fn render_interleaved(&mut self, data: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        for chunk in data.chunks_mut(MAX_BUFFER_SIZE * channels) {
            let n_frames = chunk.len() / channels;
            self.block.set_len_from_capacity(n_frames);
            self.engine.process_commands(&mut self.command_rx);
            self.engine.process(&mut self.block);

            for (frame, sample) in chunk.chunks_mut(channels).zip(self.block.iter()) {
                frame[0] = sample.left;
                if channels > 1 {
                    frame[1] = sample.right;
                }
                for ch in frame.iter_mut().skip(2) {
                    *ch = 0.0;
                }
            }
        }
    }
}

/// Everything a backend needs to start rendering
pub(crate) struct EngineParts {
    pub state: AudioCallbackState,
    pub command_sender: CommandSender,
    pub atomics: Arc<TransportAtomics>,
    pub events: TransportEventReceiver,
}

/// Build the engine for a device sample rate
pub(crate) fn build_engine(setup: &EngineSetup, sample_rate: u32) -> AudioResult<EngineParts> {
    let reverb = setup.reverb.sanitized();
    let ir = ImpulseResponse::generate(sample_rate, reverb.duration, reverb.decay, reverb.seed);
    let config = EngineConfig {
        sample_rate,
        band_count: setup.band_count,
        reverb_block: reverb.block_size,
        max_block: MAX_BUFFER_SIZE,
    };

    let mut engine = AudioEngine::new(&config, &ir);
    let atomics = engine.transport_atomics();
    let events = engine
        .take_event_receiver()
        .ok_or_else(|| AudioError::ConfigError("Engine event queue unavailable".to_string()))?;
    let (command_tx, command_rx) = command_channel();

    Ok(EngineParts {
        state: AudioCallbackState::new(engine, command_rx),
        command_sender: CommandSender::new(command_tx),
        atomics,
        events,
    })
}

/// Start audio output
///
/// Uses the configured (or default) device through cpal. When no device can
/// be opened and `headless_fallback` is set, or when `headless` is set, the
/// engine runs on a paced render thread instead so playback state still
/// advances in real time.
pub fn start_audio_system(config: &AudioConfig, setup: &EngineSetup) -> AudioResult<AudioSystemResult> {
    if config.headless {
        return super::headless::start_audio_system(config, setup);
    }

    match super::cpal_backend::start_audio_system(config, setup) {
        Ok(result) => Ok(result),
        Err(e) if config.headless_fallback => {
            log::warn!("Audio output unavailable ({}), rendering headless", e);
            super::headless::start_audio_system(config, setup)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::gc::gc_handle;
    use crate::types::AudioBuffer;
    use basedrop::Shared;

    fn parts(rate: u32) -> EngineParts {
        let setup = EngineSetup {
            band_count: 2,
            reverb: ReverbConfig {
                duration: 0.05,
                block_size: 64,
                ..Default::default()
            },
        };
        build_engine(&setup, rate).unwrap()
    }

    #[test]
    fn test_command_sender_reports_full_queue() {
        let (tx, _rx) = command_channel();
        let mut sender = CommandSender::new(tx);
        for _ in 0..crate::engine::COMMAND_QUEUE_CAPACITY {
            assert!(sender.send(EngineCommand::Play).is_ok());
        }
        assert!(!sender.has_space());
        assert!(matches!(sender.send(EngineCommand::Stop), Err(EngineCommand::Stop)));
    }

    #[test]
    fn test_render_interleaved_layouts() {
        let mut parts = parts(1000);
        let buffer = Shared::new(&gc_handle(), AudioBuffer::from_mono(vec![0.5; 100], 1000).unwrap());
        parts
            .command_sender
            .send(EngineCommand::LoadBuffer { buffer, generation: 1 })
            .ok();
        parts.command_sender.send(EngineCommand::Play).ok();

        let mut quad = vec![9.0f32; 16 * 4];
        parts.state.render_interleaved(&mut quad, 4);
        assert_eq!(&quad[..4], &[0.5, 0.5, 0.0, 0.0]);
        assert_eq!(parts.atomics.position(), 16);

        let mut mono = vec![9.0f32; 8];
        parts.state.render_interleaved(&mut mono, 1);
        assert!(mono.iter().all(|s| *s == 0.5));
    }

    #[test]
    fn test_large_requests_render_in_blocks() {
        let mut parts = parts(1000);
        let frames = MAX_BUFFER_SIZE * 2 + 10;
        let buffer = Shared::new(&gc_handle(), AudioBuffer::from_mono(vec![0.25; frames + 100], 1000).unwrap());
        parts
            .command_sender
            .send(EngineCommand::LoadBuffer { buffer, generation: 1 })
            .ok();
        parts.command_sender.send(EngineCommand::Play).ok();

        let mut data = vec![0.0f32; frames * 2];
        parts.state.render_interleaved(&mut data, 2);
        assert_eq!(parts.atomics.position(), frames as u64);
        assert!(data.iter().all(|s| *s == 0.25));
    }
}
