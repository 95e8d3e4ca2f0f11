//! Playback host - the control-thread owner of the studio session
//!
//! The host keeps the original buffer captured at load time and the current
//! buffer the transport plays. Both are replaced wholesale, never mutated.
//! Decoding and remixing run on the [`StudioWorker`]; their results come back
//! tagged with the epoch that was current when they were requested.
//!
//! # Epochs
//!
//! Every load and every reset starts a new epoch. A worker result whose epoch
//! no longer matches is reported as [`HostEvent::Discarded`] and never touches
//! the session. Remixes do not start an epoch: they apply to the session they
//! were requested in.
//!
//! # State
//!
//! ```text
//! Idle ──load──► Ready ──play──► Playing ⇄ Paused
//!                  ▲                │        │
//!                  └──stop/finish───┴────────┘
//! ```
//!
//! A completed remix or a reset re-enters Ready at position 0.

use std::collections::VecDeque;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use basedrop::Shared;
use thiserror::Error;

use crate::audio::CommandSender;
use crate::audio_file::{self, AudioFileError};
use crate::effect::EffectSettings;
use crate::engine::gc::gc_handle;
use crate::engine::{EngineCommand, TransportAtomics, TransportEvent, TransportEventReceiver};
use crate::loader::{DecodeSource, JobKind, StudioWorker, WorkerJob, WorkerResult};
use crate::slicer::{SliceGrid, SlicePattern, Tempo, TempoError};
use crate::types::{AudioBuffer, PlayState};

/// Session state as seen by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HostState {
    /// No buffer loaded
    #[default]
    Idle,
    /// Buffer loaded, transport stopped
    Ready,
    Playing,
    Paused,
}

impl fmt::Display for HostState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HostState::Idle => "idle",
            HostState::Ready => "ready",
            HostState::Playing => "playing",
            HostState::Paused => "paused",
        };
        f.write_str(name)
    }
}

/// Host operation errors
#[derive(Error, Debug)]
pub enum HostError {
    #[error("No audio loaded")]
    NoBuffer,

    #[error("Audio command queue is full")]
    CommandQueueFull,

    #[error("Background worker is not running")]
    WorkerUnavailable,

    #[error("Invalid tempo: {0}")]
    InvalidTempo(#[from] TempoError),

    #[error(transparent)]
    File(#[from] AudioFileError),
}

/// Outcome of [`PlaybackHost::request_remix`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemixRequest {
    /// Handed to the worker; the result arrives as [`HostEvent::Remixed`]
    Dispatched { epoch: u64 },
    /// A remix or load is already outstanding
    Busy,
    /// Nothing to remix
    NoBuffer,
}

/// Notifications produced by [`PlaybackHost::poll`]
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    Loaded {
        epoch: u64,
        name: String,
        duration_seconds: f64,
        channels: usize,
        sample_rate: u32,
    },
    LoadFailed { message: String },
    Remixed {
        epoch: u64,
        duration_seconds: f64,
        /// The remix was a no-op and the original stands
        unchanged: bool,
    },
    RemixFailed { message: String },
    /// A result arrived for an epoch that is no longer current
    Discarded { epoch: u64, kind: JobKind },
    StateChanged(HostState),
    /// Playback reached the end of the current buffer
    Finished,
}

impl fmt::Display for HostEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostEvent::Loaded {
                name,
                duration_seconds,
                channels,
                sample_rate,
                ..
            } => write!(
                f,
                "Loaded {} ({:.2}s, {} ch, {} Hz)",
                name, duration_seconds, channels, sample_rate
            ),
            HostEvent::LoadFailed { message } => write!(f, "Load failed: {}", message),
            HostEvent::Remixed {
                duration_seconds,
                unchanged: false,
                ..
            } => write!(f, "Remix ready ({:.2}s)", duration_seconds),
            HostEvent::Remixed { unchanged: true, .. } => {
                write!(f, "Tempo too slow for this file, original kept")
            }
            HostEvent::RemixFailed { message } => write!(f, "Remix failed: {}", message),
            HostEvent::Discarded { epoch, kind } => {
                write!(f, "Discarded stale {:?} result (epoch {})", kind, epoch)
            }
            HostEvent::StateChanged(state) => write!(f, "State: {}", state),
            HostEvent::Finished => write!(f, "Playback finished"),
        }
    }
}

pub struct PlaybackHost {
    commands: CommandSender,
    transport_events: TransportEventReceiver,
    atomics: Arc<TransportAtomics>,
    worker: StudioWorker,

    original: Option<Shared<AudioBuffer>>,
    current: Option<Shared<AudioBuffer>>,
    source_name: Option<String>,

    state: HostState,
    /// Session counter; bumped by loads and resets
    epoch: u64,
    /// Tag of the last buffer handed to the engine
    generation: u64,
    pending_load: Option<u64>,
    pending_remix: Option<u64>,

    tempo: Tempo,
    settings: EffectSettings,
    events: VecDeque<HostEvent>,
}

impl PlaybackHost {
    pub fn new(
        commands: CommandSender,
        transport_events: TransportEventReceiver,
        atomics: Arc<TransportAtomics>,
        worker: StudioWorker,
    ) -> Self {
        Self {
            commands,
            transport_events,
            atomics,
            worker,
            original: None,
            current: None,
            source_name: None,
            state: HostState::Idle,
            epoch: 0,
            generation: 0,
            pending_load: None,
            pending_remix: None,
            tempo: Tempo::default(),
            settings: EffectSettings::default(),
            events: VecDeque::new(),
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────

    pub fn state(&self) -> HostState {
        self.state
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn tempo(&self) -> Tempo {
        self.tempo
    }

    pub fn effect_settings(&self) -> &EffectSettings {
        &self.settings
    }

    pub fn current_buffer(&self) -> Option<&AudioBuffer> {
        self.current.as_deref()
    }

    pub fn original_buffer(&self) -> Option<&AudioBuffer> {
        self.original.as_deref()
    }

    pub fn source_name(&self) -> Option<&str> {
        self.source_name.as_deref()
    }

    /// True when the current buffer is a remix rather than the original
    pub fn is_remixed(&self) -> bool {
        match (&self.original, &self.current) {
            (Some(original), Some(current)) => !std::ptr::eq::<AudioBuffer>(&**original, &**current),
            _ => false,
        }
    }

    pub fn is_remix_pending(&self) -> bool {
        self.pending_remix.is_some()
    }

    pub fn is_load_pending(&self) -> bool {
        self.pending_load.is_some()
    }

    /// Slice grid of the original buffer at the current tempo
    pub fn slice_grid(&self) -> Option<SliceGrid> {
        self.original.as_ref().map(|b| SliceGrid::new(b, self.tempo))
    }

    /// Playhead in seconds, 0 until the engine has picked up the current buffer
    pub fn position_seconds(&self) -> f64 {
        if self.current.is_none() || self.atomics.generation() != self.generation {
            return 0.0;
        }
        self.atomics.position_seconds()
    }

    pub fn duration_seconds(&self) -> f64 {
        self.current.as_ref().map(|b| b.duration_seconds()).unwrap_or(0.0)
    }

    // ─────────────────────────────────────────────────────────────
    // Loading
    // ─────────────────────────────────────────────────────────────

    /// Start decoding a file in the background
    ///
    /// The result arrives as [`HostEvent::Loaded`] or [`HostEvent::LoadFailed`].
    /// Any pending load or remix becomes stale.
    pub fn load_file(&mut self, path: impl Into<PathBuf>) -> Result<u64, HostError> {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        audio_file::validate_input(&name, None)?;
        self.dispatch_load(DecodeSource::File(path))
    }

    /// Start decoding an in-memory upload in the background
    pub fn load_bytes(
        &mut self,
        name: &str,
        content_type: Option<&str>,
        bytes: Vec<u8>,
    ) -> Result<u64, HostError> {
        let hint = audio_file::validate_input(name, content_type)?;
        self.dispatch_load(DecodeSource::Bytes {
            name: name.to_string(),
            bytes,
            hint,
        })
    }

    fn dispatch_load(&mut self, source: DecodeSource) -> Result<u64, HostError> {
        let epoch = self.begin_epoch();
        log::info!("Loading {} (epoch {})", source.name(), epoch);
        if !self.worker.submit(WorkerJob::Decode { epoch, source }) {
            return Err(HostError::WorkerUnavailable);
        }
        self.pending_load = Some(epoch);
        Ok(epoch)
    }

    /// Install an already decoded buffer as the new original
    pub fn load_buffer(&mut self, name: &str, buffer: AudioBuffer) -> Result<(), HostError> {
        self.begin_epoch();
        let shared = Shared::new(&gc_handle(), buffer);
        self.install(shared.clone())?;
        self.original = Some(shared);
        self.source_name = Some(name.to_string());
        Ok(())
    }

    /// Start a new epoch; everything in flight becomes stale
    fn begin_epoch(&mut self) -> u64 {
        self.epoch += 1;
        self.worker.set_latest_epoch(self.epoch);
        self.pending_load = None;
        self.pending_remix = None;
        self.epoch
    }

    /// Hand a buffer to the engine; the transport stops at position 0
    fn install(&mut self, buffer: Shared<AudioBuffer>) -> Result<(), HostError> {
        let generation = self.generation + 1;
        self.send(EngineCommand::LoadBuffer {
            buffer: buffer.clone(),
            generation,
        })?;
        self.generation = generation;
        self.current = Some(buffer);
        self.set_state(HostState::Ready);
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────
    // Transport
    // ─────────────────────────────────────────────────────────────

    pub fn play(&mut self) -> Result<(), HostError> {
        if self.state == HostState::Idle {
            return Err(HostError::NoBuffer);
        }
        self.send(EngineCommand::Play)?;
        self.set_state(HostState::Playing);
        Ok(())
    }

    /// Pause; ignored unless playing
    pub fn pause(&mut self) -> Result<(), HostError> {
        if self.state != HostState::Playing {
            return Ok(());
        }
        self.send(EngineCommand::Pause)?;
        self.set_state(HostState::Paused);
        Ok(())
    }

    /// Stop and rewind; ignored when idle
    pub fn stop(&mut self) -> Result<(), HostError> {
        if self.state == HostState::Idle {
            return Ok(());
        }
        self.send(EngineCommand::Stop)?;
        self.set_state(HostState::Ready);
        Ok(())
    }

    /// Move the playhead, clamped to the current buffer
    pub fn seek(&mut self, seconds: f64) -> Result<(), HostError> {
        let buffer = self.current.as_ref().ok_or(HostError::NoBuffer)?;
        let frame = (seconds.max(0.0) * buffer.sample_rate() as f64) as u64;
        self.send(EngineCommand::Seek { frame })
    }

    // ─────────────────────────────────────────────────────────────
    // Effects and Remix
    // ─────────────────────────────────────────────────────────────

    /// Push a full settings value to the graph
    ///
    /// Values are clamped. Works in any state, including Idle.
    pub fn apply_effect_settings(&mut self, settings: &EffectSettings) -> Result<(), HostError> {
        let settings = settings.sanitized();
        self.send(EngineCommand::ApplyEffects(Box::new(settings.clone())))?;
        self.settings = settings;
        Ok(())
    }

    pub fn set_tempo(&mut self, bpm: f64) -> Result<Tempo, HostError> {
        self.tempo = Tempo::new(bpm)?;
        Ok(self.tempo)
    }

    /// Slice the original buffer by `pattern` in the background
    ///
    /// Only one remix is outstanding at a time. A second request, or a request
    /// while a load is pending, is rejected as [`RemixRequest::Busy`].
    pub fn request_remix(&mut self, pattern: SlicePattern) -> Result<RemixRequest, HostError> {
        let source = match &self.original {
            Some(original) => original.clone(),
            None => return Ok(RemixRequest::NoBuffer),
        };
        if self.pending_remix.is_some() || self.pending_load.is_some() {
            return Ok(RemixRequest::Busy);
        }

        let epoch = self.epoch;
        log::info!("Remix requested: {} at {} (epoch {})", pattern, self.tempo, epoch);
        if !self.worker.submit(WorkerJob::Remix {
            epoch,
            source,
            tempo: self.tempo,
            pattern,
        }) {
            return Err(HostError::WorkerUnavailable);
        }
        self.pending_remix = Some(epoch);
        Ok(RemixRequest::Dispatched { epoch })
    }

    /// Restore the buffer captured at load time
    ///
    /// Starts a new epoch so a pending remix is discarded on arrival.
    /// Returns false when nothing is loaded, or when a load is pending: the
    /// incoming file replaces the original and still reports its result.
    pub fn reset_to_original(&mut self) -> Result<bool, HostError> {
        if self.pending_load.is_some() {
            log::debug!("Reset ignored while a load is pending");
            return Ok(false);
        }
        let original = match &self.original {
            Some(original) => original.clone(),
            None => return Ok(false),
        };
        self.begin_epoch();
        self.install(original)?;
        log::info!("Reset to original (epoch {})", self.epoch);
        Ok(true)
    }

    /// Write the current buffer to a 32-bit float WAV file
    pub fn export_current(&self, path: &Path) -> Result<(), HostError> {
        let buffer = self.current.as_ref().ok_or(HostError::NoBuffer)?;
        audio_file::write_wav(path, buffer)?;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────
    // Event Processing
    // ─────────────────────────────────────────────────────────────

    /// Drain worker results and engine notifications
    pub fn poll(&mut self) -> Vec<HostEvent> {
        while let Some(result) = self.worker.try_recv() {
            self.handle_result(result);
        }
        self.drain_transport_events();
        self.events.drain(..).collect()
    }

    /// Like [`poll`](Self::poll), but waits up to `timeout` for a worker
    /// result when one is outstanding and nothing is queued yet
    pub fn poll_blocking(&mut self, timeout: Duration) -> Vec<HostEvent> {
        let waiting = self.pending_load.is_some() || self.pending_remix.is_some();
        if self.events.is_empty() && waiting {
            if let Some(result) = self.worker.recv_timeout(timeout) {
                self.handle_result(result);
            }
        }
        self.poll()
    }

    fn handle_result(&mut self, result: WorkerResult) {
        let epoch = result.epoch();
        if epoch != self.epoch {
            log::debug!("Discarding {:?} result from epoch {} (now {})", result.kind(), epoch, self.epoch);
            self.events.push_back(HostEvent::Discarded {
                epoch,
                kind: result.kind(),
            });
            return;
        }

        match result {
            WorkerResult::Decoded { name, buffer, .. } => {
                self.pending_load = None;
                let event = HostEvent::Loaded {
                    epoch,
                    name: name.clone(),
                    duration_seconds: buffer.duration_seconds(),
                    channels: buffer.channel_count(),
                    sample_rate: buffer.sample_rate(),
                };
                let shared = Shared::new(&gc_handle(), buffer);
                match self.install(shared.clone()) {
                    Ok(()) => {
                        self.original = Some(shared);
                        self.source_name = Some(name);
                        self.events.push_back(event);
                    }
                    Err(e) => self.events.push_back(HostEvent::LoadFailed {
                        message: e.to_string(),
                    }),
                }
            }
            WorkerResult::Remixed { buffer, .. } => {
                self.pending_remix = None;
                let (shared, unchanged) = match (buffer, &self.original) {
                    (Some(buffer), _) => (Shared::new(&gc_handle(), buffer), false),
                    (None, Some(original)) => (original.clone(), true),
                    (None, None) => return,
                };
                let duration_seconds = shared.duration_seconds();
                match self.install(shared) {
                    Ok(()) => self.events.push_back(HostEvent::Remixed {
                        epoch,
                        duration_seconds,
                        unchanged,
                    }),
                    Err(e) => self.events.push_back(HostEvent::RemixFailed {
                        message: e.to_string(),
                    }),
                }
            }
            WorkerResult::Failed { kind, message, .. } => match kind {
                JobKind::Decode => {
                    self.pending_load = None;
                    self.events.push_back(HostEvent::LoadFailed { message });
                }
                JobKind::Remix => {
                    self.pending_remix = None;
                    self.events.push_back(HostEvent::RemixFailed { message });
                }
            },
            WorkerResult::Cancelled { kind, .. } => {
                // Only stale jobs are cancelled, so this is unreachable in practice
                match kind {
                    JobKind::Decode => self.pending_load = None,
                    JobKind::Remix => self.pending_remix = None,
                }
                self.events.push_back(HostEvent::Discarded { epoch, kind });
            }
        }
    }

    fn drain_transport_events(&mut self) {
        while let Ok(event) = self.transport_events.pop() {
            match event {
                TransportEvent::Ready { generation } if generation == self.generation => {
                    log::debug!("Engine picked up buffer generation {}", generation);
                }
                TransportEvent::StateChanged { state, generation } if generation == self.generation => {
                    if self.current.is_some() {
                        self.set_state(match state {
                            PlayState::Stopped => HostState::Ready,
                            PlayState::Playing => HostState::Playing,
                            PlayState::Paused => HostState::Paused,
                        });
                    }
                }
                TransportEvent::Finished { generation } if generation == self.generation => {
                    self.events.push_back(HostEvent::Finished);
                }
                _ => {}
            }
        }
    }

    fn set_state(&mut self, state: HostState) {
        if self.state != state {
            log::debug!("Host state {} -> {}", self.state, state);
            self.state = state;
            self.events.push_back(HostEvent::StateChanged(state));
        }
    }

    fn send(&mut self, cmd: EngineCommand) -> Result<(), HostError> {
        self.commands.send(cmd).map_err(|_| {
            log::warn!("Engine command queue full");
            HostError::CommandQueueFull
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_file::{AudioFormatHint, Decoder};
    use crate::effect::native::ImpulseResponse;
    use crate::engine::{command_channel, AudioEngine, EngineConfig};
    use crate::types::StereoBuffer;

    const RATE: u32 = 1000;
    const WAIT: Duration = Duration::from_secs(5);

    /// Decodes `<frames>.wav` into a ramp of that many frames, fails otherwise
    struct RampDecoder;

    impl Decoder for RampDecoder {
        fn decode_file(&self, path: &Path) -> Result<AudioBuffer, AudioFileError> {
            let frames: usize = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse().ok())
                .ok_or(AudioFileError::Empty)?;
            Ok(ramp(frames))
        }

        fn decode_bytes(&self, bytes: Vec<u8>, _hint: AudioFormatHint) -> Result<AudioBuffer, AudioFileError> {
            Ok(ramp(bytes.len()))
        }
    }

    fn ramp(frames: usize) -> AudioBuffer {
        AudioBuffer::from_mono((0..frames).map(|i| i as f32 / frames as f32).collect(), RATE).unwrap()
    }

    /// Host wired to an engine the test drives by hand
    struct Rig {
        host: PlaybackHost,
        engine: AudioEngine,
        rx: rtrb::Consumer<EngineCommand>,
    }

    impl Rig {
        fn new() -> Self {
            let config = EngineConfig {
                sample_rate: RATE,
                band_count: 3,
                reverb_block: 16,
                max_block: 256,
            };
            let ir = ImpulseResponse::from_channels(vec![1.0], vec![1.0]);
            let mut engine = AudioEngine::new(&config, &ir);
            let events = engine.take_event_receiver().unwrap();
            let atomics = engine.transport_atomics();
            let (tx, rx) = command_channel();
            let worker = StudioWorker::spawn(Arc::new(RampDecoder)).unwrap();
            let host = PlaybackHost::new(CommandSender::new(tx), events, atomics, worker);
            Self { host, engine, rx }
        }

        /// Run one audio block
        fn render(&mut self, frames: usize) {
            self.engine.process_commands(&mut self.rx);
            let mut out = StereoBuffer::silence(frames);
            self.engine.process(&mut out);
        }

        /// Poll until an event matching `pred` shows up, returning everything seen
        fn poll_until(&mut self, pred: impl Fn(&HostEvent) -> bool) -> Vec<HostEvent> {
            let mut seen = Vec::new();
            for _ in 0..500 {
                let events = self.host.poll_blocking(WAIT / 500);
                let done = events.iter().any(&pred);
                seen.extend(events);
                if done {
                    return seen;
                }
                std::thread::sleep(Duration::from_millis(10));
            }
            panic!("event never arrived, saw {:?}", seen);
        }
    }

    fn is_loaded(e: &HostEvent) -> bool {
        matches!(e, HostEvent::Loaded { .. })
    }

    fn is_remixed(e: &HostEvent) -> bool {
        matches!(e, HostEvent::Remixed { .. })
    }

    #[test]
    fn test_starts_idle() {
        let mut rig = Rig::new();
        assert_eq!(rig.host.state(), HostState::Idle);
        assert!(matches!(rig.host.play(), Err(HostError::NoBuffer)));
        assert!(rig.host.pause().is_ok());
        assert!(rig.host.stop().is_ok());
        assert_eq!(rig.host.request_remix(SlicePattern::new(vec![0])).unwrap(), RemixRequest::NoBuffer);
        assert!(!rig.host.reset_to_original().unwrap());
        assert!(rig.host.poll().is_empty());
    }

    #[test]
    fn test_load_file_enters_ready() {
        let mut rig = Rig::new();
        let epoch = rig.host.load_file("/audio/2000.wav").unwrap();
        assert!(rig.host.is_load_pending());

        let events = rig.poll_until(is_loaded);
        assert!(events.contains(&HostEvent::StateChanged(HostState::Ready)));
        assert!(events.iter().any(|ev| matches!(ev,
            HostEvent::Loaded { epoch: got, name, .. } if *got == epoch && name == "2000.wav")));
        assert_eq!(rig.host.state(), HostState::Ready);
        assert_eq!(rig.host.current_buffer().unwrap().frame_count(), 2000);
        assert_eq!(rig.host.source_name(), Some("2000.wav"));
        assert!(!rig.host.is_remixed());
    }

    #[test]
    fn test_load_rejects_non_audio() {
        let mut rig = Rig::new();
        let err = rig.host.load_file("/docs/readme.txt").unwrap_err();
        assert_eq!(err.to_string(), crate::audio_file::INVALID_AUDIO_MESSAGE);
        assert!(!rig.host.is_load_pending());
        assert_eq!(rig.host.epoch(), 0);
    }

    #[test]
    fn test_decode_failure_stays_idle() {
        let mut rig = Rig::new();
        rig.host.load_file("/audio/broken.wav").unwrap();
        let events = rig.poll_until(|e| matches!(e, HostEvent::LoadFailed { .. }));
        assert!(!events.iter().any(is_loaded));
        assert_eq!(rig.host.state(), HostState::Idle);
        assert!(rig.host.current_buffer().is_none());
    }

    #[test]
    fn test_decode_failure_keeps_prior_session() {
        let mut rig = Rig::new();
        rig.host.load_buffer("first", ramp(1000)).unwrap();
        rig.host.load_file("/audio/broken.wav").unwrap();
        rig.poll_until(|e| matches!(e, HostEvent::LoadFailed { .. }));
        assert_eq!(rig.host.state(), HostState::Ready);
        assert_eq!(rig.host.current_buffer().unwrap().frame_count(), 1000);
    }

    #[test]
    fn test_load_bytes_validates_content_type() {
        let mut rig = Rig::new();
        assert!(rig.host.load_bytes("clip", Some("image/png"), vec![0; 8]).is_err());
        rig.host.load_bytes("clip", Some("audio/wav"), vec![0; 300]).unwrap();
        rig.poll_until(is_loaded);
        assert_eq!(rig.host.current_buffer().unwrap().frame_count(), 300);
    }

    #[test]
    fn test_transport_state_machine() {
        let mut rig = Rig::new();
        rig.host.load_buffer("loop", ramp(2000)).unwrap();
        rig.render(64);

        rig.host.play().unwrap();
        assert_eq!(rig.host.state(), HostState::Playing);
        rig.render(100);
        assert!((rig.host.position_seconds() - 0.1).abs() < 1e-9);

        rig.host.pause().unwrap();
        assert_eq!(rig.host.state(), HostState::Paused);
        rig.render(100);
        assert!((rig.host.position_seconds() - 0.1).abs() < 1e-9);

        rig.host.play().unwrap();
        rig.host.stop().unwrap();
        rig.render(100);
        rig.host.poll();
        assert_eq!(rig.host.state(), HostState::Ready);
        assert_eq!(rig.host.position_seconds(), 0.0);
    }

    #[test]
    fn test_finish_returns_to_ready() {
        let mut rig = Rig::new();
        rig.host.load_buffer("short", ramp(100)).unwrap();
        rig.host.play().unwrap();
        rig.render(64);
        rig.render(64);

        let events = rig.host.poll();
        assert!(events.contains(&HostEvent::Finished));
        assert_eq!(rig.host.state(), HostState::Ready);
    }

    #[test]
    fn test_remix_replaces_current_and_rewinds() {
        let mut rig = Rig::new();
        // 2 s at 1 kHz, 120 BPM: 8 slices of 250 frames
        rig.host.load_buffer("loop", ramp(2000)).unwrap();
        rig.host.play().unwrap();
        rig.render(128);

        let request = rig.host.request_remix(SlicePattern::new(vec![1, -1])).unwrap();
        assert!(matches!(request, RemixRequest::Dispatched { .. }));
        assert!(rig.host.is_remix_pending());

        let events = rig.poll_until(is_remixed);
        assert!(events.iter().any(|e| matches!(e,
            HostEvent::Remixed { unchanged: false, duration_seconds, .. } if (*duration_seconds - 0.5).abs() < 1e-9)));
        assert_eq!(rig.host.state(), HostState::Ready);
        assert!(rig.host.is_remixed());

        let current = rig.host.current_buffer().unwrap();
        assert_eq!(current.frame_count(), 500);
        assert_eq!(current.channel(0)[0], rig.host.original_buffer().unwrap().channel(0)[250]);
        assert_eq!(current.channel(0)[300], 0.0);

        rig.render(16);
        rig.host.poll();
        assert_eq!(rig.host.position_seconds(), 0.0);
    }

    #[test]
    fn test_second_remix_is_busy() {
        let mut rig = Rig::new();
        rig.host.load_buffer("loop", ramp(2000)).unwrap();
        let first = rig.host.request_remix(SlicePattern::new(vec![0, 1])).unwrap();
        assert!(matches!(first, RemixRequest::Dispatched { .. }));
        assert_eq!(rig.host.request_remix(SlicePattern::new(vec![2])).unwrap(), RemixRequest::Busy);

        rig.poll_until(is_remixed);
        assert!(!rig.host.is_remix_pending());
        assert!(matches!(
            rig.host.request_remix(SlicePattern::new(vec![2])).unwrap(),
            RemixRequest::Dispatched { .. }
        ));
    }

    #[test]
    fn test_remix_while_load_pending_is_busy() {
        let mut rig = Rig::new();
        rig.host.load_buffer("loop", ramp(2000)).unwrap();
        rig.host.load_file("/audio/1000.wav").unwrap();
        assert_eq!(rig.host.request_remix(SlicePattern::new(vec![0])).unwrap(), RemixRequest::Busy);
    }

    #[test]
    fn test_remix_always_slices_original() {
        let mut rig = Rig::new();
        rig.host.load_buffer("loop", ramp(2000)).unwrap();
        rig.host.request_remix(SlicePattern::new(vec![7])).unwrap();
        rig.poll_until(is_remixed);
        rig.host.request_remix(SlicePattern::new(vec![7, 6])).unwrap();
        rig.poll_until(is_remixed);

        // Slice 7 of the one-slice remix would be out of range; the original has it
        let current = rig.host.current_buffer().unwrap();
        assert_eq!(current.frame_count(), 500);
        assert_eq!(current.channel(0)[0], rig.host.original_buffer().unwrap().channel(0)[1750]);
    }

    #[test]
    fn test_noop_remix_keeps_original() {
        let mut rig = Rig::new();
        rig.host.load_buffer("loop", ramp(2000)).unwrap();
        rig.host.set_tempo(1.0).unwrap();
        rig.host.request_remix(SlicePattern::new(vec![0, 0, 0])).unwrap();
        let events = rig.poll_until(is_remixed);
        assert!(events.iter().any(|e| matches!(e, HostEvent::Remixed { unchanged: true, .. })));
        assert!(!rig.host.is_remixed());
        assert_eq!(rig.host.current_buffer(), rig.host.original_buffer());
    }

    #[test]
    fn test_reload_discards_pending_remix() {
        let mut rig = Rig::new();
        rig.host.load_buffer("first", ramp(2000)).unwrap();
        let stale = match rig.host.request_remix(SlicePattern::new(vec![0, 1, 2])).unwrap() {
            RemixRequest::Dispatched { epoch } => epoch,
            other => panic!("unexpected {:?}", other),
        };

        rig.host.load_file("/audio/4000.wav").unwrap();
        let events = rig.poll_until(is_loaded);
        assert!(events.contains(&HostEvent::Discarded {
            epoch: stale,
            kind: JobKind::Remix
        }));
        assert!(!events.iter().any(is_remixed));

        // Session reflects the new file, not the remix
        assert_eq!(rig.host.current_buffer().unwrap().frame_count(), 4000);
        assert_eq!(rig.host.original_buffer().unwrap().frame_count(), 4000);
        assert!(!rig.host.is_remixed());
    }

    #[test]
    fn test_reset_discards_pending_remix() {
        let mut rig = Rig::new();
        rig.host.load_buffer("loop", ramp(2000)).unwrap();
        rig.host.request_remix(SlicePattern::new(vec![3])).unwrap();
        assert!(rig.host.reset_to_original().unwrap());
        assert!(!rig.host.is_remix_pending());

        let events = rig.poll_until(|e| matches!(e, HostEvent::Discarded { .. }));
        assert!(!events.iter().any(is_remixed));
        assert_eq!(rig.host.current_buffer().unwrap().frame_count(), 2000);
    }

    #[test]
    fn test_reset_does_not_cancel_pending_load() {
        let mut rig = Rig::new();
        rig.host.load_buffer("first", ramp(2000)).unwrap();
        let epoch = rig.host.load_file("/audio/4000.wav").unwrap();

        assert!(!rig.host.reset_to_original().unwrap());
        assert_eq!(rig.host.epoch(), epoch);
        assert!(rig.host.is_load_pending());

        let events = rig.poll_until(is_loaded);
        assert!(!events.iter().any(|e| matches!(e, HostEvent::Discarded { .. })));
        assert_eq!(rig.host.original_buffer().unwrap().frame_count(), 4000);
        assert_eq!(rig.host.source_name(), Some("4000.wav"));

        // Once the load has landed, reset works again
        assert!(rig.host.reset_to_original().unwrap());
    }

    #[test]
    fn test_reset_restores_original() {
        let mut rig = Rig::new();
        rig.host.load_buffer("loop", ramp(2000)).unwrap();
        rig.host.request_remix(SlicePattern::new(vec![0])).unwrap();
        rig.poll_until(is_remixed);
        assert!(rig.host.is_remixed());

        rig.host.play().unwrap();
        assert!(rig.host.reset_to_original().unwrap());
        assert_eq!(rig.host.state(), HostState::Ready);
        assert!(!rig.host.is_remixed());
        assert_eq!(rig.host.current_buffer().unwrap().frame_count(), 2000);
    }

    #[test]
    fn test_stale_transport_events_ignored() {
        let mut rig = Rig::new();
        rig.host.load_buffer("short", ramp(50)).unwrap();
        rig.host.play().unwrap();
        rig.render(64);

        // Finished for generation 1 is queued; a new load makes it stale
        rig.host.load_buffer("next", ramp(500)).unwrap();
        let events = rig.host.poll();
        assert!(!events.contains(&HostEvent::Finished));
        assert_eq!(rig.host.state(), HostState::Ready);
    }

    #[test]
    fn test_effect_settings_are_sanitized() {
        let mut rig = Rig::new();
        let mut settings = EffectSettings::default();
        settings.reverb.mix = 2.0;
        settings.low_shelf.gain_db = 100.0;
        rig.host.apply_effect_settings(&settings).unwrap();
        assert_eq!(rig.host.effect_settings().reverb.mix, 1.0);
        assert_eq!(rig.host.effect_settings().low_shelf.gain_db, 24.0);
    }

    #[test]
    fn test_invalid_tempo_rejected() {
        let mut rig = Rig::new();
        assert!(matches!(rig.host.set_tempo(0.0), Err(HostError::InvalidTempo(_))));
        assert!(matches!(rig.host.set_tempo(f64::NAN), Err(HostError::InvalidTempo(_))));
        assert_eq!(rig.host.tempo().bpm(), 120.0);
        assert_eq!(rig.host.set_tempo(90.0).unwrap().bpm(), 90.0);
    }

    #[test]
    fn test_slice_grid_follows_tempo() {
        let mut rig = Rig::new();
        assert!(rig.host.slice_grid().is_none());
        rig.host.load_buffer("loop", ramp(2000)).unwrap();
        assert_eq!(rig.host.slice_grid().unwrap().num_slices, 8);
        rig.host.set_tempo(60.0).unwrap();
        assert_eq!(rig.host.slice_grid().unwrap().num_slices, 4);
    }

    #[test]
    fn test_export_current() {
        let mut rig = Rig::new();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        assert!(matches!(rig.host.export_current(&path), Err(HostError::NoBuffer)));

        rig.host.load_buffer("loop", ramp(2000)).unwrap();
        rig.host.export_current(&path).unwrap();
        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().sample_rate, RATE);
        assert_eq!(reader.duration(), 2000);
    }

    #[test]
    fn test_command_queue_full() {
        let mut rig = Rig::new();
        rig.host.load_buffer("loop", ramp(100)).unwrap();
        let settings = EffectSettings::default();
        let mut result = Ok(());
        for _ in 0..crate::engine::COMMAND_QUEUE_CAPACITY {
            result = rig.host.apply_effect_settings(&settings);
        }
        assert!(matches!(result, Err(HostError::CommandQueueFull)));
        rig.render(16);
        assert!(rig.host.apply_effect_settings(&settings).is_ok());
    }
}
