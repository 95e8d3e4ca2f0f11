//! Flamingo Studio - console front end for the slice-and-remix engine
//!
//! This is the main entry point. It:
//! 1. Loads `studio.yaml` (or the file given with `--config`)
//! 2. Starts audio output, falling back to headless rendering
//! 3. Spawns the background worker and builds the playback host
//! 4. Reads commands from stdin until `quit` or end of input
//!
//! ## Command line
//!
//! ```text
//! flamingo-studio [--config PATH] [--headless] [--list-devices] [FILE]
//! ```

mod console;
mod session;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};

use flamingo_core::analysis::CannedAnalysisService;
use flamingo_core::audio::{get_output_devices, start_audio_system, EngineSetup};
use flamingo_core::audio_file::SymphoniaDecoder;
use flamingo_core::config::{default_config_path, load_config, StudioConfig};
use flamingo_core::effect::DEFAULT_BAND_COUNT;
use flamingo_core::host::PlaybackHost;
use flamingo_core::loader::StudioWorker;
use flamingo_core::slicer::PatternGenerator;

use console::{parse_command, Command};
use session::{Flow, Session};

/// Parsed command line
#[derive(Debug, Default, PartialEq)]
struct Args {
    config: Option<PathBuf>,
    headless: bool,
    list_devices: bool,
    file: Option<PathBuf>,
}

impl Args {
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut parsed = Args::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" | "-c" => {
                    let path = args.next().context("--config needs a path")?;
                    parsed.config = Some(PathBuf::from(path));
                }
                "--headless" => parsed.headless = true,
                "--list-devices" => parsed.list_devices = true,
                flag if flag.starts_with("--") => anyhow::bail!("Unknown flag {}", flag),
                file => {
                    if parsed.file.is_some() {
                        anyhow::bail!("Only one input file can be given");
                    }
                    parsed.file = Some(PathBuf::from(file));
                }
            }
        }
        Ok(parsed)
    }
}

fn main() -> Result<()> {
    let args = Args::parse(std::env::args().skip(1))?;

    // Initialize logger - set RUST_LOG=debug for verbose output
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    log::info!("flamingo-studio starting up");

    if args.list_devices {
        for device in get_output_devices()? {
            println!(
                "{}{} ({} ch)",
                device.id.display_label(),
                if device.is_default { " [default]" } else { "" },
                device.max_channels
            );
        }
        return Ok(());
    }

    // Initialize Rayon before audio starts so the first remix doesn't pay for it
    if let Err(e) = rayon::ThreadPoolBuilder::new()
        .thread_name(|i| format!("rayon-remix-{}", i))
        .build_global()
    {
        log::warn!("Rayon thread pool already initialized: {}", e);
    }

    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                     Flamingo Studio                          ║");
    println!("║          beat-sliced remixing with live effects              ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    let config_path = args.config.clone().unwrap_or_else(default_config_path);
    let mut config: StudioConfig = load_config(&config_path);
    if args.headless {
        config.audio.headless = true;
    }

    let setup = EngineSetup {
        band_count: config.effects.bands.len().max(DEFAULT_BAND_COUNT),
        reverb: config.reverb.clone(),
    };
    let audio = start_audio_system(&config.audio, &setup).context("Could not start audio output")?;
    if audio.handle.is_headless() {
        println!("No audio device in use; playback runs silently in real time");
    } else {
        println!(
            "Audio output started ({} Hz, {} frames, {:.1} ms)",
            audio.sample_rate, audio.buffer_size, audio.latency_ms
        );
    }

    let worker = StudioWorker::spawn(Arc::new(SymphoniaDecoder)).context("Could not start the background worker")?;
    let mut host = PlaybackHost::new(audio.command_sender, audio.events, audio.atomics, worker);
    host.apply_effect_settings(&config.effects)?;
    host.set_tempo(config.remix.tempo.bpm())?;

    let seed = config.remix.seed.unwrap_or_else(clock_seed);
    log::info!("Pattern seed {}", seed);
    let analysis = CannedAnalysisService::new(config.analysis.latency, clock_seed());
    let mut session = Session::new(
        host,
        PatternGenerator::seeded(seed),
        config.remix.preset,
        Box::new(analysis),
    );

    let mut stdout = io::stdout();
    if let Some(file) = args.file {
        run(&mut session, Command::Load(file), &mut stdout)?;
    }
    println!("Type 'help' for commands");

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        stdout.flush()?;
        let line = match lines.next() {
            Some(line) => line?,
            None => break,
        };
        match parse_command(&line) {
            Ok(Some(command)) => {
                if run(&mut session, command, &mut stdout)? == Flow::Quit {
                    break;
                }
            }
            Ok(None) => session.report_events(&mut stdout)?,
            Err(message) => println!("{}", message),
        }
    }

    log::info!("flamingo-studio shutting down");
    // Host and worker drop before the audio handle so the stream outlives its commands
    drop(session);
    drop(audio.handle);
    Ok(())
}

/// Execute a command, reporting its failure without ending the session
fn run(session: &mut Session, command: Command, out: &mut dyn Write) -> Result<Flow> {
    match session.execute(command, out) {
        Ok(flow) => Ok(flow),
        Err(e) => {
            writeln!(out, "Error: {:#}", e)?;
            Ok(Flow::Continue)
        }
    }
}

fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}
