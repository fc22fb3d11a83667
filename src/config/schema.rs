use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level application settings loaded from `config.toml`.
///
/// File format: TOML
/// Default path (Linux/XDG): `$XDG_CONFIG_HOME/allegro/config.toml` or `~/.config/allegro/config.toml`
///
/// Precedence (highest wins):
/// 1) Environment variables (prefix `ALLEGRO__`, `__` as nested separator)
/// 2) Config file (if present)
/// 3) Struct defaults
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub library: LibrarySettings,
    pub audio: AudioSettings,
    pub cache: CacheSettings,
    pub log: LogSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LibrarySettings {
    /// Directories scanned for audio files.
    pub roots: Vec<PathBuf>,
    /// File extensions to treat as audio (case-insensitive, without dot).
    pub extensions: Vec<String>,
    /// Whether to follow symlinks during scanning.
    pub follow_links: bool,
    /// Whether to include hidden files/directories (dotfiles).
    pub include_hidden: bool,
}

impl Default for LibrarySettings {
    fn default() -> Self {
        Self {
            roots: vec![PathBuf::from("assets")],
            extensions: vec!["mp3".into(), "wav".into(), "flac".into()],
            follow_links: false,
            include_hidden: true,
        }
    }
}

impl LibrarySettings {
    /// Extensions normalised to lowercase without a leading dot.
    pub fn normalized_extensions(&self) -> Vec<String> {
        self.extensions
            .iter()
            .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AudioSettings {
    /// Output buffer depth in milliseconds.
    pub buffer_ms: u64,
    /// Logarithmic base of the volume stage. A base of 2 means one unit
    /// doubles the amplitude.
    pub volume_base: f64,
    /// Linear gain applied to the first loaded track.
    pub initial_volume: f64,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            buffer_ms: 100,
            volume_base: 2.0,
            initial_volume: 1.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Explicit cache file. When unset the location is derived from the
    /// working directory and the home directory.
    pub path: Option<PathBuf>,
    /// Files whose presence in the working directory marks a project root.
    pub project_markers: Vec<String>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            path: None,
            project_markers: vec!["Cargo.toml".into()],
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LogSettings {
    /// `tracing_subscriber::EnvFilter` directive. `RUST_LOG` wins when set.
    pub filter: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            filter: "warn".to_string(),
        }
    }
}
