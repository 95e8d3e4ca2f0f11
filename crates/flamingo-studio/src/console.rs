//! Line command parsing for the studio console
//!
//! One command per line. Words are separated by whitespace; file paths take
//! the rest of the line so names with spaces work unquoted.

use std::path::PathBuf;

use flamingo_core::analysis::AnalysisKind;
use flamingo_core::slicer::{PatternPreset, SlicePattern};

/// What a `remix` line asks for
#[derive(Debug, Clone, PartialEq)]
pub enum RemixChoice {
    /// A named preset, or the configured default when `None`
    Preset(Option<PatternPreset>),
    /// An explicit index list such as `0 1 -1 3`
    Pattern(SlicePattern),
}

/// Change to one parametric band
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BandChange {
    Enable(bool),
    Set {
        gain_db: f32,
        frequency: Option<f32>,
        q: Option<f32>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Load(PathBuf),
    Play,
    Pause,
    Stop,
    Seek(f64),
    Tempo(f64),
    Remix(RemixChoice),
    Reset,
    LowShelf { gain_db: f32, frequency: Option<f32> },
    HighShelf { gain_db: f32, frequency: Option<f32> },
    /// Zero-based band index
    Band { index: usize, change: BandChange },
    Reverb(f32),
    /// Show the effect settings, or restore defaults with `fx reset`
    Effects { reset: bool },
    Analyze(AnalysisKind),
    Export(PathBuf),
    Status,
    Help,
    Quit,
}

pub const HELP: &str = "\
Commands:
  load <file>                 decode an audio file (MP3, WAV, FLAC, OGG)
  play | pause | stop         transport
  seek <seconds>              move the playhead
  tempo <bpm>                 tempo used for slicing
  remix [preset|pattern]      straight, reverse, stutter, gated, random or e.g. 0 1 -1 3
  reset                       back to the loaded original
  low <dB> [Hz]               low shelf
  high <dB> [Hz]              high shelf
  band <n> <dB> [Hz] [Q]      parametric band n (1-based), or band <n> on|off
  reverb <mix>                wet mix 0..1
  fx [reset]                  show or reset effect settings
  analyze <key|musical|production>
  export <file.wav>           write the current buffer
  status | help | quit";

/// Parse one input line
///
/// Blank lines and `#` comments yield `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<Command>, String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };
    let args: Vec<&str> = rest.split_whitespace().collect();

    let command = match word.to_ascii_lowercase().as_str() {
        "load" | "open" => Command::Load(path_arg(rest, "load <file>")?),
        "play" => Command::Play,
        "pause" => Command::Pause,
        "stop" => Command::Stop,
        "seek" => Command::Seek(number(args.first(), "seek <seconds>")?),
        "tempo" | "bpm" => Command::Tempo(number(args.first(), "tempo <bpm>")?),
        "remix" => Command::Remix(parse_remix(rest)?),
        "reset" => Command::Reset,
        "low" => {
            let (gain_db, frequency) = parse_shelf(&args, "low <dB> [Hz]")?;
            Command::LowShelf { gain_db, frequency }
        }
        "high" => {
            let (gain_db, frequency) = parse_shelf(&args, "high <dB> [Hz]")?;
            Command::HighShelf { gain_db, frequency }
        }
        "band" => parse_band(&args)?,
        "reverb" | "mix" => Command::Reverb(number(args.first(), "reverb <mix>")?),
        "fx" | "effects" => match args.first() {
            None => Command::Effects { reset: false },
            Some(arg) if arg.eq_ignore_ascii_case("reset") => Command::Effects { reset: true },
            Some(other) => return Err(format!("Unknown fx argument '{}' (usage: fx [reset])", other)),
        },
        "analyze" | "analyse" => {
            if rest.is_empty() {
                return Err("Usage: analyze <key|musical|production>".to_string());
            }
            Command::Analyze(rest.parse()?)
        }
        "export" | "save" => Command::Export(path_arg(rest, "export <file.wav>")?),
        "status" | "st" => Command::Status,
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        other => return Err(format!("Unknown command '{}' (type 'help')", other)),
    };
    Ok(Some(command))
}

fn path_arg(rest: &str, usage: &str) -> Result<PathBuf, String> {
    let path = rest.trim_matches(|c| c == '"' || c == '\'');
    if path.is_empty() {
        return Err(format!("Usage: {}", usage));
    }
    Ok(PathBuf::from(path))
}

fn number<T: std::str::FromStr>(arg: Option<&&str>, usage: &str) -> Result<T, String> {
    let arg = arg.ok_or_else(|| format!("Usage: {}", usage))?;
    arg.parse()
        .map_err(|_| format!("'{}' is not a number (usage: {})", arg, usage))
}

fn optional_number<T: std::str::FromStr>(arg: Option<&&str>, usage: &str) -> Result<Option<T>, String> {
    match arg {
        Some(_) => number(arg, usage).map(Some),
        None => Ok(None),
    }
}

fn parse_remix(rest: &str) -> Result<RemixChoice, String> {
    if rest.is_empty() {
        return Ok(RemixChoice::Preset(None));
    }
    if let Ok(preset) = rest.parse::<PatternPreset>() {
        return Ok(RemixChoice::Preset(Some(preset)));
    }
    match rest.parse::<SlicePattern>() {
        Ok(pattern) => Ok(RemixChoice::Pattern(pattern)),
        Err(e) => Err(format!("{} (expected a preset name or slice indices)", e)),
    }
}

fn parse_shelf(args: &[&str], usage: &str) -> Result<(f32, Option<f32>), String> {
    let gain_db = number(args.first(), usage)?;
    let frequency = optional_number(args.get(1), usage)?;
    Ok((gain_db, frequency))
}

fn parse_band(args: &[&str]) -> Result<Command, String> {
    const USAGE: &str = "band <n> <dB> [Hz] [Q] | band <n> on|off";
    let number_1based: usize = number(args.first(), USAGE)?;
    let index = number_1based
        .checked_sub(1)
        .ok_or_else(|| "Bands are numbered from 1".to_string())?;

    let change = match args.get(1).map(|a| a.to_ascii_lowercase()) {
        Some(arg) if arg == "on" => BandChange::Enable(true),
        Some(arg) if arg == "off" => BandChange::Enable(false),
        Some(_) => BandChange::Set {
            gain_db: number(args.get(1), USAGE)?,
            frequency: optional_number(args.get(2), USAGE)?,
            q: optional_number(args.get(3), USAGE)?,
        },
        None => return Err(format!("Usage: {}", USAGE)),
    };
    Ok(Command::Band { index, change })
}
