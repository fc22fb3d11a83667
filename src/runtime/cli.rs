use std::path::PathBuf;

use clap::Parser;

use crate::config::Settings;

#[derive(Parser, Debug)]
#[command(name = "allegro", version, about = "Play local audio files from a scanned catalog")]
pub struct Args {
    /// Directory to scan for audio files (repeatable, replaces library.roots)
    #[arg(long = "root", value_name = "DIR")]
    pub roots: Vec<PathBuf>,

    /// Config file to load instead of ALLEGRO_CONFIG_PATH / the XDG location
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Start with an incremental scan (only picks up new files)
    #[arg(long)]
    pub incremental: bool,
}

impl Args {
    /// Fold command-line overrides into the loaded settings.
    pub fn apply(&self, settings: &mut Settings) {
        if !self.roots.is_empty() {
            settings.library.roots = self.roots.clone();
        }
    }
}
