use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::catalog::{ScanResult, Scanner, Track, format_duration};
use crate::config::Settings;
use crate::playback::{EndedSignal, PlaybackSession, extension_of};

use super::commands::{Command, GotoTarget, HELP, parse_command};
use super::playlist::Playlist;

/// Whether the loop should keep reading commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// State tracked by the command loop across iterations.
pub struct CommandLoop<'a> {
    session: &'a PlaybackSession,
    scanner: &'a mut Scanner,
    settings: &'a Settings,
    playlist: Playlist,
    /// End-of-track signal of the last successful load, until reported.
    ended: Option<EndedSignal>,
}

impl<'a> CommandLoop<'a> {
    pub fn new(
        session: &'a PlaybackSession,
        scanner: &'a mut Scanner,
        settings: &'a Settings,
    ) -> Self {
        Self {
            session,
            scanner,
            settings,
            playlist: Playlist::default(),
            ended: None,
        }
    }

    /// Initial catalog scan and banner.
    pub fn startup(&mut self, incremental: bool, out: &mut impl Write) -> io::Result<()> {
        writeln!(out, "allegro")?;
        writeln!(out, "Scanning for audio files...")?;
        let result = if incremental {
            self.scanner.incremental_scan()
        } else {
            self.scanner.scan()
        };
        writeln!(out, "Found {} audio tracks", result.total_files)?;
        write_errors(out, &result)?;
        writeln!(out)?;
        writeln!(out, "{HELP}")?;
        writeln!(out)
    }

    /// Read and execute commands until `quit` or end of input.
    pub fn run(&mut self, mut input: impl BufRead, out: &mut impl Write) -> io::Result<()> {
        let mut line = String::new();
        loop {
            write!(out, "> ")?;
            out.flush()?;

            line.clear();
            match input.read_line(&mut line) {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                    self.report_ended(out)?;
                    writeln!(out, "Invalid character encoding, expected UTF-8")?;
                    continue;
                }
                Err(e) => return Err(e),
            }

            self.report_ended(out)?;
            match parse_command(&line) {
                Ok(None) => {}
                Ok(Some(cmd)) => {
                    if self.execute(cmd, out)? == Flow::Quit {
                        break;
                    }
                }
                Err(e) => writeln!(out, "{e}")?,
            }
        }
        Ok(())
    }

    pub fn execute(&mut self, cmd: Command, out: &mut impl Write) -> io::Result<Flow> {
        match cmd {
            Command::Ls(dir) => self.ls(&dir, out)?,
            Command::Load(path) => {
                self.load(&path, out)?;
            }
            Command::Play => match self.session.play() {
                Ok(()) => writeln!(out, "Playing")?,
                Err(e) => writeln!(out, "Error playing: {e}")?,
            },
            Command::Pause => {
                self.session.pause();
                writeln!(out, "Paused")?;
            }
            Command::Toggle => match self.session.toggle() {
                Ok(()) if self.session.is_playing() => writeln!(out, "Playing")?,
                Ok(()) => writeln!(out, "Paused")?,
                Err(e) => writeln!(out, "Error: {e}")?,
            },
            Command::Stop => {
                self.session.stop();
                writeln!(out, "Stopped")?;
            }
            Command::Seek(pos) => match self.session.seek(pos) {
                Ok(()) => writeln!(out, "Seeked to {}", format_duration(pos))?,
                Err(e) => writeln!(out, "Error seeking: {e}")?,
            },
            Command::Volume(pct) => {
                self.session.set_volume(pct / 100.0);
                writeln!(out, "Volume set to {pct:.0}%")?;
            }
            Command::Status => self.status(out)?,
            Command::List => self.list(out)?,
            Command::Next => {
                let len = self.scanner.tracks().len();
                match self.playlist.next(len) {
                    Some(i) => self.play_index(i, "Next track", out)?,
                    None => writeln!(out, "No tracks in catalog")?,
                }
            }
            Command::Prev => {
                let len = self.scanner.tracks().len();
                match self.playlist.prev(len) {
                    Some(i) => self.play_index(i, "Previous track", out)?,
                    None => writeln!(out, "No tracks in catalog")?,
                }
            }
            Command::Goto(target) => self.goto(target, out)?,
            Command::Rescan => self.rescan(out)?,
            Command::Config => match toml::to_string_pretty(self.settings) {
                Ok(doc) => write!(out, "{doc}")?,
                Err(e) => writeln!(out, "Cannot render configuration: {e}")?,
            },
            Command::Help => writeln!(out, "{HELP}")?,
            Command::Quit => {
                writeln!(out, "Goodbye!")?;
                return Ok(Flow::Quit);
            }
        }
        Ok(Flow::Continue)
    }

    fn report_ended(&mut self, out: &mut impl Write) -> io::Result<()> {
        if self.ended.as_ref().is_some_and(EndedSignal::is_fired) {
            self.ended = None;
            writeln!(out, "Track finished")?;
        }
        Ok(())
    }

    /// Supported audio files directly inside `dir`, as paths `load` accepts.
    fn ls(&self, dir: &Path, out: &mut impl Write) -> io::Result<()> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => return writeln!(out, "Cannot read directory {}: {e}", dir.display()),
        };
        let extensions = self.settings.library.normalized_extensions();
        let mut files: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_ok_and(|t| !t.is_dir()))
            .map(|e| e.path())
            .filter(|p| extensions.contains(&extension_of(p)))
            .collect();
        files.sort();

        if files.is_empty() {
            return writeln!(out, "No audio files found in {}", dir.display());
        }
        writeln!(out, "Audio files in {}:", dir.display())?;
        for file in &files {
            writeln!(out, "  {}", file.display())?;
        }
        Ok(())
    }

    /// Returns whether the file was loaded.
    fn load(&mut self, path: &Path, out: &mut impl Write) -> io::Result<bool> {
        let path = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
        if !path.exists() {
            writeln!(out, "File not found: {}", path.display())?;
            return Ok(false);
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        writeln!(out, "Loading: {name}")?;
        if let Err(e) = self.session.load(&path) {
            self.ended = None;
            writeln!(out, "Error loading file: {e}")?;
            return Ok(false);
        }
        self.ended = Some(self.session.on_ended());

        let duration = self.session.duration();
        if duration > Duration::ZERO {
            writeln!(out, "Loaded ({})", format_duration(duration))?;
        } else {
            writeln!(out, "Loaded")?;
        }
        Ok(true)
    }

    fn play_index(&mut self, index: usize, label: &str, out: &mut impl Write) -> io::Result<()> {
        let Some(track) = self.scanner.tracks().get(index).cloned() else {
            return writeln!(out, "No track at position {}", index + 1);
        };
        writeln!(out, "{label}: {track}")?;
        if self.load(&track.path, out)? {
            match self.session.play() {
                Ok(()) => writeln!(out, "Playing")?,
                Err(e) => writeln!(out, "Failed to play track: {e}")?,
            }
        }
        Ok(())
    }

    fn goto(&mut self, target: GotoTarget, out: &mut impl Write) -> io::Result<()> {
        let len = self.scanner.tracks().len();
        let index = match target {
            GotoTarget::Position(n) => match self.playlist.goto(n, len) {
                Some(i) => i,
                None => return writeln!(out, "Index out of range (1-{len})"),
            },
            GotoTarget::Id(id) => {
                let found = self.scanner.track_by_id(&id).and_then(|track| {
                    self.scanner
                        .tracks()
                        .iter()
                        .position(|t| Arc::ptr_eq(t, &track))
                });
                match found {
                    Some(i) => {
                        self.playlist.select(i);
                        i
                    }
                    None => return writeln!(out, "No track with id {id}"),
                }
            }
        };
        self.play_index(index, &format!("Jumping to track {}", index + 1), out)
    }

    fn status(&self, out: &mut impl Write) -> io::Result<()> {
        let state = if self.session.is_playing() {
            "playing"
        } else if self.session.is_loaded() {
            "paused"
        } else {
            "no track loaded"
        };
        let position = self.session.position();
        let duration = self.session.duration();

        writeln!(out, "Status: {state}")?;
        writeln!(out, "  Position: {}", format_duration(position))?;
        if duration > Duration::ZERO {
            writeln!(out, "  Duration: {}", format_duration(duration))?;
            let progress = position.as_secs_f64() / duration.as_secs_f64() * 100.0;
            writeln!(out, "  Progress: {progress:.1}%")?;
        }
        if let Some(v) = self.session.volume_stage() {
            if v.silent {
                writeln!(out, "  Volume: muted")?;
            } else {
                writeln!(out, "  Volume: {:.0}%", v.base.powf(v.volume) * 100.0)?;
            }
        }
        Ok(())
    }

    fn list(&self, out: &mut impl Write) -> io::Result<()> {
        let tracks = self.scanner.tracks();
        if tracks.is_empty() {
            return writeln!(out, "No tracks in catalog");
        }

        writeln!(out, "Catalog ({} tracks):", tracks.len())?;
        let current = self.playlist.current();
        for (i, track) in tracks.iter().enumerate() {
            let marker = if current == Some(i) { ">" } else { " " };
            writeln!(out, "{marker} {}. {track}", i + 1)?;
            if current == Some(i) {
                write_details(out, track)?;
            }
        }
        if let Some(i) = current {
            writeln!(out)?;
            writeln!(out, "Current track: {}", i + 1)?;
        }
        Ok(())
    }

    fn rescan(&mut self, out: &mut impl Write) -> io::Result<()> {
        writeln!(out, "Rescanning audio files...")?;
        let result = self.scanner.scan();
        writeln!(out, "Rescan completed")?;
        writeln!(out, "  Total tracks: {}", result.total_files)?;
        writeln!(out, "  New tracks: {}", result.new_tracks)?;
        writeln!(out, "  Updated tracks: {}", result.updated_tracks)?;
        writeln!(out, "  Removed tracks: {}", result.removed_tracks)?;
        write_errors(out, &result)?;
        self.playlist.clamp(result.total_files);
        Ok(())
    }
}

/// Tag fields of an already-inspected track.
fn write_details(out: &mut impl Write, track: &Arc<Track>) -> io::Result<()> {
    if !track.has_metadata() {
        return Ok(());
    }
    if let Some(artist) = track.artist() {
        writeln!(out, "    Artist: {artist}")?;
    }
    match (track.album(), track.track_number()) {
        (Some(album), Some(n)) => writeln!(out, "    Album: {album} (track {n})")?,
        (Some(album), None) => writeln!(out, "    Album: {album}")?,
        _ => {}
    }
    if let Some(genre) = track.genre() {
        writeln!(out, "    Genre: {genre}")?;
    }
    if let Some(year) = track.year() {
        writeln!(out, "    Year: {year}")?;
    }
    Ok(())
}

fn write_errors(out: &mut impl Write, result: &ScanResult) -> io::Result<()> {
    if result.errors.is_empty() {
        return Ok(());
    }
    writeln!(out, "Errors encountered:")?;
    for e in &result.errors {
        writeln!(out, "  - {e}")?;
    }
    Ok(())
}
