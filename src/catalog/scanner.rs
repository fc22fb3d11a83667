use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use walkdir::WalkDir;

use crate::config::LibrarySettings;
use crate::error::{FileError, ScanError};
use crate::playback::{DecoderGateway, extension_of};

use super::cache::{CacheFile, CacheStore};
use super::hash::content_hash;
use super::track::Track;

/// Outcome of a scan. Per-item failures land in `errors`.
#[derive(Debug, Clone, Serialize)]
pub struct ScanResult {
    pub tracks: Vec<Arc<Track>>,
    pub total_files: usize,
    pub new_tracks: usize,
    pub updated_tracks: usize,
    pub removed_tracks: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    pub scan_time: DateTime<Utc>,
}

impl ScanResult {
    fn started() -> Self {
        Self {
            tracks: Vec::new(),
            total_files: 0,
            new_tracks: 0,
            updated_tracks: 0,
            removed_tracks: 0,
            errors: Vec::new(),
            scan_time: Utc::now(),
        }
    }

    fn push_error(&mut self, err: ScanError) {
        tracing::debug!(error = %err, "scan diagnostic");
        self.errors.push(err.to_string());
    }
}

/// Reconciles the configured directories against the persisted catalog.
///
/// Not safe to run two scans on one scanner at once; callers serialize them.
pub struct Scanner {
    store: CacheStore,
    roots: Vec<PathBuf>,
    extensions: Vec<String>,
    follow_links: bool,
    include_hidden: bool,
    gateway: Arc<dyn DecoderGateway>,

    tracks: Vec<Arc<Track>>,
    file_hashes: BTreeMap<PathBuf, String>,
    last_scan: Option<DateTime<Utc>>,
}

impl Scanner {
    pub fn new(
        settings: &LibrarySettings,
        store: CacheStore,
        gateway: Arc<dyn DecoderGateway>,
    ) -> Self {
        Self {
            store,
            roots: settings.roots.iter().map(|r| absolute(r)).collect(),
            extensions: settings.normalized_extensions(),
            follow_links: settings.follow_links,
            include_hidden: settings.include_hidden,
            gateway,
            tracks: Vec::new(),
            file_hashes: BTreeMap::new(),
            last_scan: None,
        }
    }

    /// Full reconciliation: add new files, refresh changed ones, evict
    /// deleted ones, then persist.
    pub fn scan(&mut self) -> ScanResult {
        let mut result = ScanResult::started();

        if let Err(e) = self.load_cache() {
            result.push_error(ScanError::CacheLoad(e));
        }

        for root in self.roots.clone() {
            self.walk(&root, &mut result, Self::reconcile_file);
        }

        self.remove_deleted(&mut result);

        if let Err(e) = self.save_cache() {
            result.push_error(ScanError::CacheSave(e));
        }

        self.finish(result)
    }

    /// Cheap path: only looks for files not yet in the catalog. Falls back to
    /// a full scan when the cache cannot be loaded or any cataloged file
    /// changed.
    pub fn incremental_scan(&mut self) -> ScanResult {
        if let Err(e) = self.load_cache() {
            tracing::info!(error = %e, "cache unavailable, running full scan");
            return self.scan();
        }

        let changed = self.tracks.iter().any(|t| self.has_changed(&t.path));
        if changed {
            tracing::info!("cataloged files changed, running full scan");
            return self.scan();
        }

        let mut result = ScanResult::started();
        for root in self.roots.clone() {
            self.walk(&root, &mut result, Self::add_if_new);
        }

        if result.new_tracks > 0 {
            if let Err(e) = self.save_cache() {
                result.push_error(ScanError::CacheSave(e));
            }
        }

        self.finish(result)
    }

    pub fn tracks(&self) -> &[Arc<Track>] {
        &self.tracks
    }

    pub fn track_by_path(&self, path: &Path) -> Option<Arc<Track>> {
        self.tracks.iter().find(|t| t.path == path).cloned()
    }

    pub fn track_by_id(&self, id: &str) -> Option<Arc<Track>> {
        self.tracks.iter().find(|t| t.id == id).cloned()
    }

    pub fn last_scan(&self) -> Option<DateTime<Utc>> {
        self.last_scan
    }

    fn finish(&self, mut result: ScanResult) -> ScanResult {
        result.tracks = self.tracks.clone();
        result.total_files = self.tracks.len();
        result.scan_time = Utc::now();
        tracing::info!(
            total = result.total_files,
            new = result.new_tracks,
            updated = result.updated_tracks,
            removed = result.removed_tracks,
            errors = result.errors.len(),
            "scan finished"
        );
        result
    }

    /// Replace in-memory state with the persisted cache. On failure the
    /// in-memory catalog is left empty.
    fn load_cache(&mut self) -> Result<(), crate::error::CacheError> {
        let cache = self.store.load().inspect_err(|_| {
            self.tracks.clear();
            self.file_hashes.clear();
            self.last_scan = None;
        })?;
        self.tracks = cache.tracks;
        self.file_hashes = cache.file_hashes;
        self.last_scan = cache.last_scan;
        Ok(())
    }

    fn save_cache(&mut self) -> Result<(), crate::error::CacheError> {
        let now = Utc::now();
        let cache = CacheFile {
            tracks: std::mem::take(&mut self.tracks),
            file_hashes: std::mem::take(&mut self.file_hashes),
            last_scan: Some(now),
        };
        let saved = self.store.save(&cache);
        self.tracks = cache.tracks;
        self.file_hashes = cache.file_hashes;
        self.last_scan = Some(now);
        saved
    }

    fn walk(
        &mut self,
        root: &Path,
        result: &mut ScanResult,
        mut visit: impl FnMut(&mut Self, &Path, &mut ScanResult),
    ) {
        let include_hidden = self.include_hidden;
        let walker = WalkDir::new(root)
            .follow_links(self.follow_links)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| include_hidden || e.depth() == 0 || !is_hidden(e.path()));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().unwrap_or(root).to_path_buf();
                    let reason = e.to_string();
                    if e.depth() == 0 {
                        result.push_error(ScanError::RootUnavailable { path, reason });
                    } else {
                        result.push_error(ScanError::DirectoryRead { path, reason });
                    }
                    continue;
                }
            };

            if !entry.file_type().is_file() && !(self.follow_links && entry.path().is_file()) {
                continue;
            }
            if !self.is_audio_file(entry.path()) {
                continue;
            }
            visit(self, entry.path(), result);
        }
    }

    fn is_audio_file(&self, path: &Path) -> bool {
        let ext = extension_of(path);
        !ext.is_empty() && self.extensions.iter().any(|e| *e == ext)
    }

    fn reconcile_file(&mut self, path: &Path, result: &mut ScanResult) {
        let hash = content_hash(path);
        let outcome = match self.position_of(path) {
            Some(i) => {
                if self.file_hashes.get(path) == Some(&hash) && !hash.is_empty() {
                    return;
                }
                self.update_track(i, path, hash).map(|_| result.updated_tracks += 1)
            }
            None => self.create_track(path, hash).map(|_| result.new_tracks += 1),
        };
        if let Err(source) = outcome {
            result.push_error(ScanError::FileProcess {
                path: path.to_path_buf(),
                source,
            });
        }
    }

    fn add_if_new(&mut self, path: &Path, result: &mut ScanResult) {
        if self.position_of(path).is_some() {
            return;
        }
        let hash = content_hash(path);
        match self.create_track(path, hash) {
            Ok(()) => result.new_tracks += 1,
            Err(source) => result.push_error(ScanError::FileProcess {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    fn create_track(&mut self, path: &Path, hash: String) -> Result<(), FileError> {
        let (size, modified) = stat(path)?;
        let duration = self.measure_duration(path)?;
        self.tracks.push(Arc::new(Track::new(
            path.to_path_buf(),
            duration,
            size,
            modified,
        )));
        self.file_hashes.insert(path.to_path_buf(), hash);
        Ok(())
    }

    fn update_track(&mut self, index: usize, path: &Path, hash: String) -> Result<(), FileError> {
        let (size, modified) = stat(path)?;
        let duration = self.measure_duration(path)?;
        let refreshed = self.tracks[index].refreshed(duration, size, modified);
        self.tracks[index] = Arc::new(refreshed);
        self.file_hashes.insert(path.to_path_buf(), hash);
        Ok(())
    }

    /// Open the file just long enough to read its length.
    fn measure_duration(&self, path: &Path) -> Result<Duration, FileError> {
        let (stream, format) = self.gateway.open(path)?;
        Ok(match stream.length() {
            Some(frames) if frames > 0 => format.duration_of(frames),
            _ => Duration::ZERO,
        })
    }

    fn has_changed(&self, path: &Path) -> bool {
        match self.file_hashes.get(path) {
            Some(last) => content_hash(path) != *last,
            None => true,
        }
    }

    fn remove_deleted(&mut self, result: &mut ScanResult) {
        let hashes = &mut self.file_hashes;
        self.tracks.retain(|t| {
            if matches!(t.path.try_exists(), Ok(false)) {
                hashes.remove(&t.path);
                result.removed_tracks += 1;
                false
            } else {
                true
            }
        });
        // Hashes without a track belong to files that failed processing.
        let tracks = &self.tracks;
        hashes.retain(|p, _| tracks.iter().any(|t| &t.path == p));
    }

    fn position_of(&self, path: &Path) -> Option<usize> {
        self.tracks.iter().position(|t| t.path == path)
    }
}

fn stat(path: &Path) -> Result<(u64, DateTime<Utc>), FileError> {
    let meta = fs::metadata(path)?;
    let modified = meta.modified().map(DateTime::<Utc>::from).unwrap_or_else(|_| Utc::now());
    Ok((meta.len(), modified))
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|s| s.to_str())
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
