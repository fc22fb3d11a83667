use std::fs::File;
use std::io;
use std::path::Path;

/// BLAKE3 digest of the file's full contents, hex encoded.
///
/// An unreadable file hashes to the empty string, which never equals a real
/// digest and so always reads as "changed".
pub fn content_hash(path: &Path) -> String {
    match try_hash(path) {
        Ok(hash) => hash,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "content hash failed");
            String::new()
        }
    }
}

fn try_hash(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = blake3::Hasher::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hasher.finalize().to_hex().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn identical_contents_hash_identically() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.mp3");
        let b = dir.path().join("b.mp3");
        fs::write(&a, b"same bytes").unwrap();
        fs::write(&b, b"same bytes").unwrap();
        assert_eq!(content_hash(&a), content_hash(&b));
        assert_eq!(content_hash(&a).len(), 64);

        fs::write(&b, b"other bytes").unwrap();
        assert_ne!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn unreadable_file_hashes_empty() {
        let dir = tempdir().unwrap();
        assert_eq!(content_hash(&dir.path().join("missing.wav")), "");
    }
}
