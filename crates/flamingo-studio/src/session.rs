//! Studio session: executes console commands against the playback host
//!
//! The session owns everything the console talks to:
//! - **PlaybackHost**: transport, effects, loads and remixes
//! - **PatternGenerator**: turns presets into slice patterns
//! - **AnalysisService**: canned analysis text, kept newest first
//!
//! Loads and remixes run on the host's worker; the session waits for them to
//! settle so each console line reports its outcome before the next prompt.

use std::io::Write;
use std::time::{Duration, Instant};

use anyhow::Result;

use flamingo_core::analysis::{AnalysisError, AnalysisHistory, AnalysisService};
use flamingo_core::effect::EffectSettings;
use flamingo_core::host::{HostEvent, PlaybackHost, RemixRequest};
use flamingo_core::slicer::{PatternGenerator, PatternPreset};

use crate::console::{BandChange, Command, RemixChoice, HELP};

/// Longest wait for a load or remix before handing control back
const SETTLE_TIMEOUT: Duration = Duration::from_secs(60);
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Whether the console loop should keep reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct Session {
    host: PlaybackHost,
    generator: PatternGenerator,
    default_preset: PatternPreset,
    analysis: Box<dyn AnalysisService>,
    history: AnalysisHistory,
}

impl Session {
    pub fn new(
        host: PlaybackHost,
        generator: PatternGenerator,
        default_preset: PatternPreset,
        analysis: Box<dyn AnalysisService>,
    ) -> Self {
        Self {
            host,
            generator,
            default_preset,
            analysis,
            history: AnalysisHistory::new(),
        }
    }

    pub fn host(&self) -> &PlaybackHost {
        &self.host
    }

    pub fn history(&self) -> &AnalysisHistory {
        &self.history
    }

    /// Run one command, writing user-facing output to `out`
    ///
    /// Host and analysis failures are reported as errors; the session stays usable.
    pub fn execute(&mut self, command: Command, out: &mut dyn Write) -> Result<Flow> {
        self.report_events(out)?;

        match command {
            Command::Load(path) => {
                writeln!(out, "Loading {}...", path.display())?;
                self.host.load_file(path)?;
                self.settle(out)?;
            }
            Command::Play => self.host.play()?,
            Command::Pause => self.host.pause()?,
            Command::Stop => self.host.stop()?,
            Command::Seek(seconds) => {
                self.host.seek(seconds)?;
                writeln!(out, "Seek to {:.2}s", seconds)?;
            }
            Command::Tempo(bpm) => {
                let tempo = self.host.set_tempo(bpm)?;
                writeln!(out, "Tempo {}", tempo)?;
            }
            Command::Remix(choice) => self.remix(choice, out)?,
            Command::Reset => {
                if self.host.reset_to_original()? {
                    writeln!(out, "Restored original")?;
                } else if self.host.is_load_pending() {
                    writeln!(out, "Busy: a load is still running")?;
                } else {
                    writeln!(out, "Nothing loaded")?;
                }
            }
            Command::LowShelf { gain_db, frequency } => {
                self.update_effects(|fx| {
                    fx.low_shelf.gain_db = gain_db;
                    if let Some(frequency) = frequency {
                        fx.low_shelf.frequency = frequency;
                    }
                })?;
                self.print_effects(out)?;
            }
            Command::HighShelf { gain_db, frequency } => {
                self.update_effects(|fx| {
                    fx.high_shelf.gain_db = gain_db;
                    if let Some(frequency) = frequency {
                        fx.high_shelf.frequency = frequency;
                    }
                })?;
                self.print_effects(out)?;
            }
            Command::Band { index, change } => {
                let band_count = self.host.effect_settings().bands.len();
                if index >= band_count {
                    anyhow::bail!("Band {} does not exist ({} bands)", index + 1, band_count);
                }
                self.update_effects(|fx| {
                    if let Some(band) = fx.band_mut(index) {
                        match change {
                            BandChange::Enable(enabled) => band.enabled = enabled,
                            BandChange::Set { gain_db, frequency, q } => {
                                band.gain_db = gain_db;
                                if let Some(frequency) = frequency {
                                    band.frequency = frequency;
                                }
                                if let Some(q) = q {
                                    band.q = q;
                                }
                            }
                        }
                    }
                })?;
                self.print_effects(out)?;
            }
            Command::Reverb(mix) => {
                self.update_effects(|fx| fx.reverb.mix = mix)?;
                self.print_effects(out)?;
            }
            Command::Effects { reset } => {
                if reset {
                    let bands = self.host.effect_settings().bands.len();
                    let mut defaults = EffectSettings::default();
                    defaults.bands.truncate(bands);
                    self.host.apply_effect_settings(&defaults)?;
                }
                self.print_effects(out)?;
            }
            Command::Analyze(kind) => {
                let name = self
                    .host
                    .source_name()
                    .map(str::to_string)
                    .ok_or(AnalysisError::NoAudio)?;
                writeln!(out, "Analyzing {} ({})...", name, kind)?;
                let result = self.analysis.analyze(&name, kind)?;
                write!(out, "{}", result)?;
                self.history.push(result);
            }
            Command::Export(path) => {
                self.host.export_current(&path)?;
                writeln!(out, "Wrote {}", path.display())?;
            }
            Command::Status => self.print_status(out)?,
            Command::Help => writeln!(out, "{}", HELP)?,
            Command::Quit => return Ok(Flow::Quit),
        }

        self.report_events(out)?;
        Ok(Flow::Continue)
    }

    /// Print whatever the host has reported since the last command
    pub fn report_events(&mut self, out: &mut dyn Write) -> Result<()> {
        for event in self.host.poll() {
            print_event(&event, out)?;
        }
        Ok(())
    }

    fn remix(&mut self, choice: RemixChoice, out: &mut dyn Write) -> Result<()> {
        let pattern = match choice {
            RemixChoice::Pattern(pattern) => pattern,
            RemixChoice::Preset(preset) => {
                let preset = preset.unwrap_or(self.default_preset);
                let num_slices = self.host.slice_grid().map(|g| g.num_slices).unwrap_or(0);
                self.generator.generate(preset, num_slices)
            }
        };

        match self.host.request_remix(pattern.clone())? {
            RemixRequest::Dispatched { .. } => {
                writeln!(out, "Remixing {} at {}...", pattern, self.host.tempo())?;
                self.settle(out)?;
            }
            RemixRequest::Busy => writeln!(out, "Busy: a load or remix is still running")?,
            RemixRequest::NoBuffer => writeln!(out, "Load a file before remixing")?,
        }
        Ok(())
    }

    /// Wait until no load or remix is outstanding, printing events as they arrive
    fn settle(&mut self, out: &mut dyn Write) -> Result<()> {
        let deadline = Instant::now() + SETTLE_TIMEOUT;
        while self.host.is_load_pending() || self.host.is_remix_pending() {
            if Instant::now() >= deadline {
                log::warn!("Still working after {:?}; results will be shown when ready", SETTLE_TIMEOUT);
                break;
            }
            for event in self.host.poll_blocking(POLL_INTERVAL) {
                print_event(&event, out)?;
            }
        }
        Ok(())
    }

    fn update_effects(&mut self, edit: impl FnOnce(&mut EffectSettings)) -> Result<()> {
        let mut settings = self.host.effect_settings().clone();
        edit(&mut settings);
        self.host.apply_effect_settings(&settings)?;
        Ok(())
    }

    fn print_effects(&self, out: &mut dyn Write) -> Result<()> {
        let fx = self.host.effect_settings();
        writeln!(
            out,
            "Low shelf   {:>7.1} Hz  {:+5.1} dB",
            fx.low_shelf.frequency, fx.low_shelf.gain_db
        )?;
        writeln!(
            out,
            "High shelf  {:>7.1} Hz  {:+5.1} dB",
            fx.high_shelf.frequency, fx.high_shelf.gain_db
        )?;
        for (i, band) in fx.bands.iter().enumerate() {
            writeln!(
                out,
                "Band {}      {:>7.1} Hz  {:+5.1} dB  Q {:.2}{}",
                i + 1,
                band.frequency,
                band.gain_db,
                band.q,
                if band.enabled { "" } else { "  (off)" }
            )?;
        }
        writeln!(out, "Reverb mix  {:.0}%", fx.reverb.mix * 100.0)?;
        Ok(())
    }

    fn print_status(&self, out: &mut dyn Write) -> Result<()> {
        let host = &self.host;
        writeln!(out, "State:    {}", host.state())?;
        match host.source_name() {
            Some(name) => writeln!(out, "File:     {}", name)?,
            None => writeln!(out, "File:     (none)")?,
        }
        if host.current_buffer().is_some() {
            writeln!(
                out,
                "Position: {:.2}s / {:.2}s",
                host.position_seconds(),
                host.duration_seconds()
            )?;
        }
        write!(out, "Tempo:    {}", host.tempo())?;
        if let Some(grid) = host.slice_grid() {
            write!(out, " ({} slices of {:.3}s)", grid.num_slices, grid.slice_duration)?;
        }
        writeln!(out)?;
        if host.is_remixed() {
            writeln!(out, "Playing the remix (reset restores the original)")?;
        }
        if host.is_load_pending() || host.is_remix_pending() {
            writeln!(out, "Working...")?;
        }
        writeln!(out, "Analyses: {}", self.history.len())?;
        Ok(())
    }
}

fn print_event(event: &HostEvent, out: &mut dyn Write) -> Result<()> {
    match event {
        // Echoes of the command just typed
        HostEvent::StateChanged(_) => log::debug!("{}", event),
        HostEvent::Discarded { .. } => log::info!("{}", event),
        _ => writeln!(out, "{}", event)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use flamingo_core::analysis::{AnalysisKind, CannedAnalysisService, LatencyRange};
    use flamingo_core::audio::{start_audio_system, AudioConfig, AudioHandle, EngineSetup};
    use flamingo_core::audio_file::{write_wav, SymphoniaDecoder};
    use flamingo_core::config::ReverbConfig;
    use flamingo_core::host::HostState;
    use flamingo_core::loader::StudioWorker;
    use flamingo_core::AudioBuffer;

    use crate::console::parse_command;

    struct Rig {
        session: Session,
        _handle: AudioHandle,
        dir: tempfile::TempDir,
    }

    impl Rig {
        fn new() -> Self {
            let setup = EngineSetup {
                band_count: 3,
                reverb: ReverbConfig {
                    duration: 0.05,
                    block_size: 64,
                    ..Default::default()
                },
            };
            let audio = start_audio_system(&AudioConfig::headless(), &setup).unwrap();
            let worker = StudioWorker::spawn(Arc::new(SymphoniaDecoder)).unwrap();
            let host = PlaybackHost::new(audio.command_sender, audio.events, audio.atomics, worker);
            let session = Session::new(
                host,
                PatternGenerator::seeded(7),
                PatternPreset::Reverse,
                Box::new(CannedAnalysisService::new(LatencyRange::none(), 7)),
            );
            Self {
                session,
                _handle: audio.handle,
                dir: tempfile::tempdir().unwrap(),
            }
        }

        /// Write a one-second mono ramp and return its path as text
        fn ramp_file(&self, name: &str) -> String {
            let samples: Vec<f32> = (0..8000).map(|i| i as f32 / 8000.0).collect();
            let buffer = AudioBuffer::from_mono(samples, 8000).unwrap();
            let path = self.dir.path().join(name);
            write_wav(&path, &buffer).unwrap();
            path.to_string_lossy().into_owned()
        }

        fn run(&mut self, line: &str) -> Result<(Flow, String)> {
            let command = parse_command(line).map_err(anyhow::Error::msg)?.unwrap();
            let mut out = Vec::new();
            let flow = self.session.execute(command, &mut out)?;
            Ok((flow, String::from_utf8(out).unwrap()))
        }
    }

    #[test]
    fn test_load_remix_reset_export() {
        let mut rig = Rig::new();
        let file = rig.ramp_file("ramp.wav");

        let (_, out) = rig.run(&format!("load {}", file)).unwrap();
        assert!(out.contains("Loaded ramp.wav"), "{}", out);
        assert_eq!(rig.session.host().state(), HostState::Ready);

        // 120 BPM: 0.25s slices, four in one second
        let (_, out) = rig.run("remix").unwrap();
        assert!(out.contains("[3, 2, 1, 0]"), "{}", out);
        assert!(out.contains("Remix ready"), "{}", out);
        assert!(rig.session.host().is_remixed());

        let export = rig.dir.path().join("remix.wav");
        let (_, out) = rig.run(&format!("export {}", export.display())).unwrap();
        assert!(out.contains("Wrote"));
        assert!(export.exists());

        let (_, out) = rig.run("reset").unwrap();
        assert!(out.contains("Restored original"));
        assert!(!rig.session.host().is_remixed());
    }

    #[test]
    fn test_explicit_pattern_remix() {
        let mut rig = Rig::new();
        let file = rig.ramp_file("ramp.wav");
        rig.run(&format!("load {}", file)).unwrap();

        rig.run("remix 0 -1").unwrap();
        let buffer = rig.session.host().current_buffer().unwrap();
        assert_eq!(buffer.frame_count(), 4000);
        assert!(buffer.channel(0)[2000..].iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_commands_without_a_file() {
        let mut rig = Rig::new();
        assert!(rig.run("play").is_err());
        assert!(rig.run("export out.wav").is_err());

        let (_, out) = rig.run("remix").unwrap();
        assert!(out.contains("Load a file"));

        let err = rig.run("analyze key").unwrap_err();
        assert_eq!(err.to_string(), "Please upload an audio file to begin analysis.");
        assert_eq!(rig.session.host().state(), HostState::Idle);
    }

    #[test]
    fn test_rejected_upload() {
        let mut rig = Rig::new();
        let err = rig.run("load notes.txt").unwrap_err();
        assert_eq!(err.to_string(), "Please upload a valid audio file (e.g., MP3, WAV).");
        assert_eq!(rig.session.host().state(), HostState::Idle);
    }

    #[test]
    fn test_effect_edits_are_clamped() {
        let mut rig = Rig::new();
        rig.run("low 40 10").unwrap();
        rig.run("band 2 off").unwrap();
        let (_, out) = rig.run("reverb 0.25").unwrap();
        assert!(out.contains("Reverb mix  25%"), "{}", out);

        let fx = rig.session.host().effect_settings();
        assert_eq!(fx.low_shelf.gain_db, 24.0);
        assert_eq!(fx.low_shelf.frequency, 20.0);
        assert!(!fx.bands[1].enabled);

        assert!(rig.run("band 9 3").is_err());

        rig.run("fx reset").unwrap();
        assert_eq!(rig.session.host().effect_settings(), &EffectSettings::default());
    }

    #[test]
    fn test_tempo_and_analysis() {
        let mut rig = Rig::new();
        let file = rig.ramp_file("groove.wav");
        rig.run(&format!("load {}", file)).unwrap();

        let (_, out) = rig.run("tempo 60").unwrap();
        assert!(out.contains("60.0 BPM"));
        assert!(rig.run("tempo 0").is_err());
        assert_eq!(rig.session.host().tempo().bpm(), 60.0);

        let (_, out) = rig.run("analyze musical").unwrap();
        assert!(out.contains("Musical Analysis"), "{}", out);
        rig.run("analyze key").unwrap();
        assert_eq!(rig.session.history().len(), 2);
        assert_eq!(
            rig.session.history().latest().unwrap().title,
            AnalysisKind::KeyCharacteristics.label()
        );

        let (_, out) = rig.run("status").unwrap();
        assert!(out.contains("groove.wav"));
        assert!(out.contains("Analyses: 2"));
    }

    #[test]
    fn test_quit() {
        let mut rig = Rig::new();
        let (flow, _) = rig.run("quit").unwrap();
        assert_eq!(flow, Flow::Quit);
    }
}
