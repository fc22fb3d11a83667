//! Error types shared by the playback session and the catalog.
//!
//! Playback errors surface synchronously to whoever issued the transport
//! command. Catalog errors are mostly rendered into the diagnostics list of a
//! scan result instead of aborting the scan.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the playback session and its collaborators.
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("no track loaded")]
    NoTrackLoaded,

    #[error("unsupported audio format: {0:?}")]
    UnsupportedFormat(String),

    #[error("failed to decode {}: {reason}", path.display())]
    Decode { path: PathBuf, reason: String },

    /// Requested frame lies beyond the end of the stream.
    #[error("seek position {requested} out of range (length {length})")]
    SeekOutOfRange { requested: usize, length: usize },

    #[error("seek failed: {0}")]
    Seek(String),

    #[error("audio output error: {0}")]
    Device(String),
}

/// Tag extraction failures. Never propagated past a `Track`.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("metadata extraction not supported for format: {0:?}")]
    Unsupported(String),

    #[error("failed to open file for metadata: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to read metadata: {0}")]
    Read(String),
}

/// Load/save failures of the persisted catalog cache.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to parse cache: {0}")]
    Corrupt(#[source] serde_json::Error),

    #[error("failed to encode cache: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("cache i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Per-item scan diagnostics. Collected into `ScanResult::errors`.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("failed to scan {}: {reason}", path.display())]
    RootUnavailable { path: PathBuf, reason: String },

    #[error("failed to read directory {}: {reason}", path.display())]
    DirectoryRead { path: PathBuf, reason: String },

    #[error("failed to process {}: {source}", path.display())]
    FileProcess {
        path: PathBuf,
        #[source]
        source: FileError,
    },

    #[error("failed to load cache: {0}")]
    CacheLoad(#[source] CacheError),

    #[error("failed to save cache: {0}")]
    CacheSave(#[source] CacheError),
}

/// Why a single audio file could not be cataloged.
#[derive(Debug, Error)]
pub enum FileError {
    #[error("failed to stat file: {0}")]
    Stat(#[from] std::io::Error),

    #[error("failed to get duration: {0}")]
    Duration(#[from] PlayerError),
}
