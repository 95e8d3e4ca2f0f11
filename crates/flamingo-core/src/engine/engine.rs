//! Audio engine - owns the transport and signal graph on the audio thread
//!
//! The engine is driven by the output backend: each block it drains pending
//! [`EngineCommand`]s, renders the transport through the [`SignalGraph`],
//! publishes playback state to [`TransportAtomics`] and reports transitions
//! as [`TransportEvent`]s on a second lock-free queue.

use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use super::command::EngineCommand;
use super::graph::SignalGraph;
use super::transport::Transport;
use crate::effect::native::ImpulseResponse;
use crate::types::{PlayState, StereoBuffer};

/// Capacity of the transport event queue
pub const EVENT_QUEUE_CAPACITY: usize = 64;

/// Receiver side of the engine's event queue
pub type TransportEventReceiver = rtrb::Consumer<TransportEvent>;

/// Notifications from the audio thread
///
/// Every event carries the generation of the buffer it concerns so the
/// control side can ignore events about a buffer it has already replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportEvent {
    /// A new buffer is loaded and the graph is connected
    Ready { generation: u64 },
    /// Transport state changed
    StateChanged { state: PlayState, generation: u64 },
    /// Playback reached the end of the buffer
    Finished { generation: u64 },
}

/// Lock-free transport state for the control thread
///
/// Written by the audio thread after every block. All operations use
/// `Ordering::Relaxed` since readers only need visibility.
pub struct TransportAtomics {
    /// Playhead in source frames
    pub position: AtomicU64,
    /// 0=Stopped, 1=Playing, 2=Paused
    pub state: AtomicU8,
    /// Generation of the loaded buffer
    pub generation: AtomicU64,
    /// Frames in the loaded buffer
    pub frame_count: AtomicU64,
    /// Sample rate of the loaded buffer
    pub source_rate: AtomicU32,
}

impl TransportAtomics {
    pub fn new() -> Self {
        Self {
            position: AtomicU64::new(0),
            state: AtomicU8::new(0),
            generation: AtomicU64::new(0),
            frame_count: AtomicU64::new(0),
            source_rate: AtomicU32::new(0),
        }
    }

    #[inline]
    pub fn position(&self) -> u64 {
        self.position.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn play_state(&self) -> PlayState {
        PlayState::from_u8(self.state.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Relaxed)
    }

    /// Playhead in seconds of source audio
    pub fn position_seconds(&self) -> f64 {
        match self.source_rate.load(Ordering::Relaxed) {
            0 => 0.0,
            rate => self.position() as f64 / rate as f64,
        }
    }

    /// Length of the loaded buffer in seconds
    pub fn duration_seconds(&self) -> f64 {
        match self.source_rate.load(Ordering::Relaxed) {
            0 => 0.0,
            rate => self.frame_count.load(Ordering::Relaxed) as f64 / rate as f64,
        }
    }
}

impl Default for TransportAtomics {
    fn default() -> Self {
        Self::new()
    }
}

/// Engine construction parameters
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub sample_rate: u32,
    pub band_count: usize,
    pub reverb_block: usize,
    /// Largest block the backend will ask for
    pub max_block: usize,
}

pub struct AudioEngine {
    transport: Transport,
    graph: SignalGraph,
    atomics: Arc<TransportAtomics>,
    events: rtrb::Producer<TransportEvent>,
    event_rx: Option<TransportEventReceiver>,
    generation: u64,
    last_state: PlayState,
}

impl AudioEngine {
    pub fn new(config: &EngineConfig, ir: &ImpulseResponse) -> Self {
        let (events, event_rx) = rtrb::RingBuffer::new(EVENT_QUEUE_CAPACITY);
        log::info!(
            "AudioEngine: {} Hz, {} EQ bands, reverb block {}",
            config.sample_rate,
            config.band_count,
            config.reverb_block
        );
        Self {
            transport: Transport::new(config.sample_rate),
            graph: SignalGraph::new(
                config.sample_rate,
                config.band_count,
                ir,
                config.reverb_block,
                config.max_block,
            ),
            atomics: Arc::new(TransportAtomics::new()),
            events,
            event_rx: Some(event_rx),
            generation: 0,
            last_state: PlayState::Stopped,
        }
    }

    /// Shared atomics for lock-free reads from the control thread
    pub fn transport_atomics(&self) -> Arc<TransportAtomics> {
        self.atomics.clone()
    }

    /// Take the event receiver (only the first call returns it)
    pub fn take_event_receiver(&mut self) -> Option<TransportEventReceiver> {
        self.event_rx.take()
    }

    /// Drain all pending commands (call once per block, before `process`)
    pub fn process_commands(&mut self, rx: &mut rtrb::Consumer<EngineCommand>) {
        while let Ok(cmd) = rx.pop() {
            self.handle_command(cmd);
        }
    }

    fn handle_command(&mut self, cmd: EngineCommand) {
        match cmd {
            EngineCommand::LoadBuffer { buffer, generation } => {
                self.atomics.frame_count.store(buffer.frame_count() as u64, Ordering::Relaxed);
                self.atomics.source_rate.store(buffer.sample_rate(), Ordering::Relaxed);
                self.transport.load(buffer);
                self.graph.reset();
                self.generation = generation;
                self.atomics.generation.store(generation, Ordering::Relaxed);
                self.emit(TransportEvent::Ready { generation });
            }
            EngineCommand::Play => self.transport.play(),
            EngineCommand::Pause => self.transport.pause(),
            EngineCommand::Stop => self.transport.stop(),
            EngineCommand::Seek { frame } => {
                self.transport.seek(frame);
                self.graph.reset();
            }
            EngineCommand::ApplyEffects(settings) => self.graph.apply(&settings),
        }
        self.publish_state();
    }

    /// Render one block of output
    pub fn process(&mut self, out: &mut StereoBuffer) {
        let status = self.transport.render(out);
        self.graph.process(out);

        if status.finished {
            self.emit(TransportEvent::Finished {
                generation: self.generation,
            });
        }
        self.publish_state();
    }

    fn publish_state(&mut self) {
        let state = self.transport.state();
        self.atomics.position.store(self.transport.position(), Ordering::Relaxed);
        self.atomics.state.store(state.to_u8(), Ordering::Relaxed);
        if state != self.last_state {
            self.last_state = state;
            self.emit(TransportEvent::StateChanged {
                state,
                generation: self.generation,
            });
        }
    }

    fn emit(&mut self, event: TransportEvent) {
        // A full queue means nobody is polling; dropping is the RT-safe choice
        let _ = self.events.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::command::command_channel;
    use crate::engine::gc::gc_handle;
    use crate::types::AudioBuffer;
    use basedrop::Shared;

    fn engine() -> (AudioEngine, TransportEventReceiver) {
        let config = EngineConfig {
            sample_rate: 1000,
            band_count: 2,
            reverb_block: 16,
            max_block: 256,
        };
        let ir = ImpulseResponse::from_channels(vec![1.0], vec![1.0]);
        let mut engine = AudioEngine::new(&config, &ir);
        let events = engine.take_event_receiver().unwrap();
        (engine, events)
    }

    fn drain(rx: &mut TransportEventReceiver) -> Vec<TransportEvent> {
        std::iter::from_fn(|| rx.pop().ok()).collect()
    }

    fn buffer(frames: usize) -> Shared<AudioBuffer> {
        Shared::new(&gc_handle(), AudioBuffer::from_mono(vec![0.5; frames], 1000).unwrap())
    }

    #[test]
    fn test_load_emits_ready() {
        let (mut engine, mut events) = engine();
        let (mut tx, mut rx) = command_channel();

        assert!(tx.push(EngineCommand::LoadBuffer { buffer: buffer(100), generation: 7 }).is_ok());
        engine.process_commands(&mut rx);

        assert_eq!(drain(&mut events), vec![TransportEvent::Ready { generation: 7 }]);
        let atomics = engine.transport_atomics();
        assert_eq!(atomics.generation(), 7);
        assert!((atomics.duration_seconds() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_play_to_finish() {
        let (mut engine, mut events) = engine();
        let (mut tx, mut rx) = command_channel();
        let _ = tx.push(EngineCommand::LoadBuffer { buffer: buffer(40), generation: 1 });
        let _ = tx.push(EngineCommand::Play);
        engine.process_commands(&mut rx);

        let mut out = StereoBuffer::silence(32);
        engine.process(&mut out);
        assert_eq!(engine.transport_atomics().play_state(), PlayState::Playing);
        assert_eq!(engine.transport_atomics().position(), 32);
        engine.process(&mut out);

        assert_eq!(
            drain(&mut events),
            vec![
                TransportEvent::Ready { generation: 1 },
                TransportEvent::StateChanged { state: PlayState::Playing, generation: 1 },
                TransportEvent::Finished { generation: 1 },
                TransportEvent::StateChanged { state: PlayState::Stopped, generation: 1 },
            ]
        );
    }

    #[test]
    fn test_pause_and_stop_transitions() {
        let (mut engine, mut events) = engine();
        let (mut tx, mut rx) = command_channel();
        let _ = tx.push(EngineCommand::LoadBuffer { buffer: buffer(400), generation: 2 });
        let _ = tx.push(EngineCommand::Play);
        let _ = tx.push(EngineCommand::Pause);
        let _ = tx.push(EngineCommand::Stop);
        engine.process_commands(&mut rx);

        let states: Vec<PlayState> = drain(&mut events)
            .into_iter()
            .filter_map(|e| match e {
                TransportEvent::StateChanged { state, .. } => Some(state),
                _ => None,
            })
            .collect();
        assert_eq!(states, vec![PlayState::Playing, PlayState::Paused, PlayState::Stopped]);
    }

    #[test]
    fn test_apply_effects_reaches_graph() {
        let (mut engine, _events) = engine();
        let (mut tx, mut rx) = command_channel();
        let mut settings = crate::effect::EffectSettings::default();
        settings.reverb.mix = 0.5;
        let _ = tx.push(EngineCommand::ApplyEffects(Box::new(settings)));
        engine.process_commands(&mut rx);
        assert_eq!(engine.graph.mix(), 0.5);
    }

    #[test]
    fn test_idle_engine_outputs_silence() {
        let (mut engine, _events) = engine();
        let mut out = StereoBuffer::silence(64);
        out[5] = crate::types::StereoSample::mono(1.0);
        engine.process(&mut out);
        assert_eq!(out.peak(), 0.0);
    }
}
