//! On-disk catalog cache.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::CacheSettings;
use crate::error::CacheError;

use super::track::Track;

const CACHE_DIR: &str = ".allegro";
const CACHE_FILE: &str = "cache.json";

/// Persisted reconciliation state. Field order is the on-disk order.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CacheFile {
    #[serde(default)]
    pub tracks: Vec<Arc<Track>>,
    #[serde(default)]
    pub file_hashes: BTreeMap<PathBuf, String>,
    #[serde(default)]
    pub last_scan: Option<DateTime<Utc>>,
}

/// Reads and writes the cache file at a fixed location.
#[derive(Debug, Clone)]
pub struct CacheStore {
    path: PathBuf,
}

impl CacheStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the configured path, or wherever the location policy puts it.
    pub fn from_settings(settings: &CacheSettings) -> Self {
        match &settings.path {
            Some(p) => Self::new(p.clone()),
            None => {
                let cwd = std::env::current_dir().unwrap_or_default();
                Self::new(resolve_cache_path(
                    &cwd,
                    dirs::home_dir().as_deref(),
                    &settings.project_markers,
                ))
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file is an empty catalog; unparsable content is an error.
    pub fn load(&self) -> Result<CacheFile, CacheError> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(CacheFile::default()),
            Err(e) => return Err(CacheError::Io(e)),
        };
        serde_json::from_slice(&data).map_err(CacheError::Corrupt)
    }

    /// Write the whole cache, creating the parent directory if needed.
    ///
    /// The document goes to a sibling temp file first and is renamed into
    /// place, so readers never see a half-written cache.
    pub fn save(&self, cache: &CacheFile) -> Result<(), CacheError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let data = serde_json::to_vec_pretty(cache).map_err(CacheError::Encode)?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, data)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Cache location policy:
/// - `<cwd>/.allegro/cache.json` when `cwd` holds one of `project_markers`
/// - `<home>/.allegro/cache.json` otherwise
/// - the project-local relative path when there is no home directory
pub fn resolve_cache_path(cwd: &Path, home: Option<&Path>, project_markers: &[String]) -> PathBuf {
    let in_project = project_markers.iter().any(|m| cwd.join(m).is_file());
    if in_project {
        return cwd.join(CACHE_DIR).join(CACHE_FILE);
    }
    match home {
        Some(home) => home.join(CACHE_DIR).join(CACHE_FILE),
        None => PathBuf::from(CACHE_DIR).join(CACHE_FILE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::tempdir;

    fn markers() -> Vec<String> {
        vec!["Cargo.toml".to_string()]
    }

    #[test]
    fn cache_path_prefers_project_root() {
        let project = tempdir().unwrap();
        let home = tempdir().unwrap();
        fs::write(project.path().join("Cargo.toml"), "").unwrap();

        assert_eq!(
            resolve_cache_path(project.path(), Some(home.path()), &markers()),
            project.path().join(".allegro").join("cache.json")
        );
    }

    #[test]
    fn cache_path_falls_back_to_home_then_relative() {
        let elsewhere = tempdir().unwrap();
        let home = tempdir().unwrap();

        assert_eq!(
            resolve_cache_path(elsewhere.path(), Some(home.path()), &markers()),
            home.path().join(".allegro").join("cache.json")
        );
        assert_eq!(
            resolve_cache_path(elsewhere.path(), None, &markers()),
            PathBuf::from(".allegro").join("cache.json")
        );
    }

    #[test]
    fn explicit_cache_path_wins() {
        let settings = CacheSettings {
            path: Some(PathBuf::from("/tmp/elsewhere.json")),
            ..CacheSettings::default()
        };
        assert_eq!(
            CacheStore::from_settings(&settings).path(),
            Path::new("/tmp/elsewhere.json")
        );
    }

    #[test]
    fn missing_cache_loads_empty() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path().join("nested").join("cache.json"));
        let cache = store.load().unwrap();
        assert!(cache.tracks.is_empty());
        assert!(cache.file_hashes.is_empty());
        assert!(cache.last_scan.is_none());
    }

    #[test]
    fn corrupt_cache_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            CacheStore::new(path).load(),
            Err(CacheError::Corrupt(_))
        ));
    }

    #[test]
    fn save_creates_directories_and_round_trips() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path().join("a").join("b").join("cache.json"));
        let track_path = PathBuf::from("/music/x.mp3");
        let mut cache = CacheFile::default();
        cache.tracks.push(Arc::new(Track::new(
            track_path.clone(),
            Duration::from_millis(1_500),
            42,
            Utc::now(),
        )));
        cache.file_hashes.insert(track_path.clone(), "abc".into());
        cache.last_scan = Some(Utc::now());
        store.save(&cache).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.tracks.len(), 1);
        let t = &loaded.tracks[0];
        assert_eq!(t.path, track_path);
        assert_eq!(t.duration, Duration::from_millis(1_500));
        assert_eq!(t.size, 42);
        assert_eq!(t.format, "mp3");
        assert!(!t.has_metadata());
        assert_eq!(loaded.file_hashes.get(&track_path).map(String::as_str), Some("abc"));
        assert!(loaded.last_scan.is_some());
        assert!(!store.path().with_extension("json.tmp").exists());
    }

    #[test]
    fn saved_document_uses_the_documented_field_names() {
        let dir = tempdir().unwrap();
        let store = CacheStore::new(dir.path().join("cache.json"));
        let mut cache = CacheFile::default();
        cache.tracks.push(Arc::new(Track::new(
            PathBuf::from("/music/x.wav"),
            Duration::from_secs(2),
            7,
            Utc::now(),
        )));
        store.save(&cache).unwrap();

        let doc: serde_json::Value =
            serde_json::from_slice(&fs::read(store.path()).unwrap()).unwrap();
        assert!(doc.get("file_hashes").is_some());
        assert!(doc.get("last_scan").is_some());
        let track = &doc["tracks"][0];
        for field in ["id", "path", "filename", "duration", "format", "size", "modified"] {
            assert!(track.get(field).is_some(), "missing {field}");
        }
        assert_eq!(track["duration"], 2_000);
        assert!(track.get("metadata").is_none());
    }

    #[test]
    fn documents_missing_optional_sections_still_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(&path, r#"{"tracks": []}"#).unwrap();
        let cache = CacheStore::new(path).load().unwrap();
        assert!(cache.file_hashes.is_empty());
    }
}
