use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::MetadataError;
use crate::playback::extension_of;

use super::metadata::{LoftyReader, MetadataReader, TagFields};

/// Formats whose tags we extract. Everything else falls back to the filename.
const TAGGED_FORMATS: &[&str] = &["mp3"];

/// Lazily populated tag data. `loaded` flips to true after the first
/// extraction attempt, successful or not.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub genre: Option<String>,
    pub year: Option<u32>,
    pub track_number: Option<u32>,
    pub loaded: bool,
}

impl Metadata {
    fn fill(&mut self, tags: TagFields) {
        self.title = tags.title;
        self.artist = tags.artist;
        self.album = tags.album;
        self.genre = tags.genre;
        self.year = tags.year;
        self.track_number = tags.track_number;
    }
}

/// One audio file in the catalog.
#[derive(Debug, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub path: PathBuf,
    pub filename: String,
    #[serde(with = "duration_ms")]
    pub duration: Duration,
    pub format: String,
    pub size: u64,
    pub modified: DateTime<Utc>,
    #[serde(skip)]
    metadata: RwLock<Metadata>,
}

impl Track {
    pub fn new(path: PathBuf, duration: Duration, size: u64, modified: DateTime<Utc>) -> Self {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self {
            id: track_id(&path),
            format: extension_of(&path),
            filename,
            path,
            duration,
            size,
            modified,
            metadata: RwLock::new(Metadata::default()),
        }
    }

    /// Same file, new contents: fresh measurements and unloaded metadata.
    pub fn refreshed(&self, duration: Duration, size: u64, modified: DateTime<Utc>) -> Self {
        Self {
            id: self.id.clone(),
            path: self.path.clone(),
            filename: self.filename.clone(),
            duration,
            format: self.format.clone(),
            size,
            modified,
            metadata: RwLock::new(Metadata::default()),
        }
    }

    /// Loaded title if there is one, else the filename. Never triggers a load.
    pub fn display_name(&self) -> String {
        let meta = self.metadata.read();
        match meta.title.as_ref() {
            Some(title) if meta.loaded => title.clone(),
            _ => self.filename.clone(),
        }
    }

    pub fn artist(&self) -> Option<String> {
        self.with_metadata(|m| m.artist.clone())
    }

    pub fn album(&self) -> Option<String> {
        self.with_metadata(|m| m.album.clone())
    }

    pub fn genre(&self) -> Option<String> {
        self.with_metadata(|m| m.genre.clone())
    }

    pub fn year(&self) -> Option<u32> {
        self.with_metadata(|m| m.year)
    }

    pub fn track_number(&self) -> Option<u32> {
        self.with_metadata(|m| m.track_number)
    }

    pub fn has_metadata(&self) -> bool {
        self.metadata.read().loaded
    }

    /// Snapshot of the current metadata without triggering a load.
    #[cfg(test)]
    pub fn metadata(&self) -> Metadata {
        self.metadata.read().clone()
    }

    fn with_metadata<T>(&self, f: impl FnOnce(&Metadata) -> T) -> T {
        self.ensure_metadata(&LoftyReader);
        f(&self.metadata.read())
    }

    /// Load metadata with `reader` unless it has already been attempted.
    /// Concurrent callers block until the single extraction finishes.
    pub fn ensure_metadata(&self, reader: &dyn MetadataReader) {
        if self.metadata.read().loaded {
            return;
        }

        let mut meta = self.metadata.write();
        // Another caller may have loaded while we waited for the write lock.
        if meta.loaded {
            return;
        }

        match self.extract(reader) {
            Ok(tags) => meta.fill(tags),
            Err(MetadataError::Unsupported(format)) => {
                tracing::debug!(path = %self.path.display(), %format, "no tag support for format");
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "metadata extraction failed");
            }
        }
        meta.loaded = true;
    }

    fn extract(&self, reader: &dyn MetadataReader) -> Result<TagFields, MetadataError> {
        if !TAGGED_FORMATS.contains(&self.format.as_str()) {
            return Err(MetadataError::Unsupported(self.format.clone()));
        }
        let mut file = File::open(&self.path)?;
        reader.read(&mut file)
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.display_name(), format_duration(self.duration))
    }
}

/// Stable identifier for a path: the first 16 hex digits of its BLAKE3 digest.
pub fn track_id(path: &Path) -> String {
    let digest = blake3::hash(path.as_os_str().as_encoded_bytes());
    digest.to_hex().as_str()[..16].to_string()
}

/// `MM:SS`, minutes uncapped.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
