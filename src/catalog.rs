//! Track catalog.
//!
//! The `Scanner` reconciles the configured directories against a persisted
//! cache of `Track`s, using content hashes to detect modified files. Tag
//! metadata is read lazily, per track, on first access.

mod cache;
mod hash;
mod metadata;
mod scanner;
mod track;

pub use cache::CacheStore;
pub use scanner::{ScanResult, Scanner};
pub use track::{Track, format_duration, track_id};

#[cfg(test)]
pub use metadata::{MetadataReader, TagFields};
