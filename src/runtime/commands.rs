use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub const HELP: &str = "\
Commands:
  ls [dir]           List audio files in a directory
  load <file>        Load an audio file
  play               Start or resume playback
  pause              Pause playback
  toggle             Toggle between play and pause
  stop               Stop and rewind
  seek <seconds>     Seek to a position
  volume <0-100>     Set the volume
  status             Show the current position
  list               Show the catalog
  next | prev        Play the next or previous catalog track
  goto <index|id>    Play a catalog track by position or id
  rescan             Rescan the library
  config             Show the effective configuration
  help               Show this text
  quit               Exit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Directory to list; `.` when none was given.
    Ls(PathBuf),
    Load(PathBuf),
    Play,
    Pause,
    Toggle,
    Stop,
    Seek(Duration),
    /// Percentage in `0..=100`.
    Volume(f64),
    Status,
    List,
    Next,
    Prev,
    Goto(GotoTarget),
    Rescan,
    Config,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GotoTarget {
    /// 1-based catalog position.
    Position(usize),
    Id(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command: {0}")]
    Unknown(String),

    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("invalid {what}: {value}")]
    Invalid { what: &'static str, value: String },

    #[error("volume must be between 0 and 100")]
    VolumeRange,
}

/// Parse one input line. Blank lines yield `None`.
///
/// The command word is case-insensitive. `load` takes the rest of the line
/// verbatim so file names may contain spaces.
pub fn parse_command(line: &str) -> Result<Option<Command>, CommandError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };
    let arg = rest.split_whitespace().next();

    let cmd = match word.to_lowercase().as_str() {
        "ls" if rest.is_empty() => Command::Ls(PathBuf::from(".")),
        "ls" => Command::Ls(PathBuf::from(rest)),
        "load" => {
            if rest.is_empty() {
                return Err(CommandError::Usage("load <file>"));
            }
            Command::Load(PathBuf::from(rest))
        }
        "play" => Command::Play,
        "pause" => Command::Pause,
        "toggle" => Command::Toggle,
        "stop" => Command::Stop,
        "seek" => {
            let value = arg.ok_or(CommandError::Usage("seek <seconds>"))?;
            let secs: f64 = value.parse().map_err(|_| invalid("time", value))?;
            let pos = Duration::try_from_secs_f64(secs).map_err(|_| invalid("time", value))?;
            Command::Seek(pos)
        }
        "volume" => {
            let value = arg.ok_or(CommandError::Usage("volume <0-100>"))?;
            let pct: f64 = value.parse().map_err(|_| invalid("volume", value))?;
            if !(0.0..=100.0).contains(&pct) {
                return Err(CommandError::VolumeRange);
            }
            Command::Volume(pct)
        }
        "status" => Command::Status,
        "list" => Command::List,
        "next" => Command::Next,
        "prev" => Command::Prev,
        "goto" => {
            let value = arg.ok_or(CommandError::Usage("goto <index|id>"))?;
            match value.parse::<usize>() {
                Ok(n) => Command::Goto(GotoTarget::Position(n)),
                Err(_) => Command::Goto(GotoTarget::Id(value.to_string())),
            }
        }
        "rescan" => Command::Rescan,
        "config" => Command::Config,
        "help" => Command::Help,
        "quit" | "exit" => Command::Quit,
        _ => return Err(CommandError::Unknown(word.to_string())),
    };
    Ok(Some(cmd))
}

fn invalid(what: &'static str, value: &str) -> CommandError {
    CommandError::Invalid {
        what,
        value: value.to_string(),
    }
}
