//! Minification cache for incremental runs.
//!
//! Running the minifier is the slow part of a build: every invocation starts a
//! JVM. This module remembers, per source file, what the file looked like the
//! last time it was minified successfully, so unchanged files can be skipped.
//!
//! # Format
//!
//! The cache file (default `yuic.cache`) is a single JSON object keyed by the
//! canonical source path:
//!
//! ```json
//! {
//!   "/srv/site/web/js/app.js": { "modified": 1714000000, "md5": "9f86d0…" }
//! }
//! ```
//!
//! - **`modified`**: source modification time in whole seconds since the epoch.
//! - **`md5`**: lowercase hex MD5 of the post-filter content. MD5 is used as
//!   a change fingerprint only, so caches written by other tools with the same
//!   layout are reused as they are.
//!
//! An entry exists only for files that have been minified successfully at
//! least once. Failed files never get an entry, so they are retried.
//!
//! # Durability
//!
//! [`Cache::save`] is called after every successful minification and once at
//! the end of a run. Each save writes a temporary file next to the cache and
//! renames it into place, so an interrupted run leaves either the previous or
//! the new complete document on disk, never a truncated one.
//!
//! A missing cache file loads as an empty cache. So does a corrupt one, with a
//! warning: losing the cache only costs time.

use serde::{Deserialize, Serialize};
use md5::{Digest, Md5};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;

/// Default name of the cache file.
pub const DEFAULT_CACHE_FILE: &str = "yuic.cache";

/// What a source file looked like when it was last minified.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheEntry {
    /// Modification time, seconds since the epoch.
    pub modified: i64,
    /// Hex digest of the post-filter content.
    #[serde(rename = "md5")]
    pub digest: String,
}

/// In-memory view of the cache file.
///
/// Keys are kept sorted so that two saves of the same mapping produce the
/// same bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cache {
    entries: BTreeMap<String, CacheEntry>,
}

impl Cache {
    /// Create an empty cache (first run or `--no-cache`).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load the cache file. Returns an empty cache if the file doesn't exist
    /// or can't be parsed.
    pub fn load(path: &Path) -> Self {
        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Self::empty(),
            Err(e) => {
                warn!("Cannot read cache file {}: {e}", path.display());
                return Self::empty();
            }
        };
        match serde_json::from_str(&content) {
            Ok(cache) => cache,
            Err(e) => {
                warn!(
                    "Ignoring corrupt cache file {}: {e}",
                    path.display()
                );
                Self::empty()
            }
        }
    }

    /// Write the whole mapping to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;
        let json = serde_json::to_string_pretty(self)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.flush()?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    /// Entry for a canonical source path.
    pub fn get(&self, source: &Path) -> Option<&CacheEntry> {
        self.entries.get(cache_key(source).as_str())
    }

    /// Record a successful minification of `source`.
    pub fn insert(&mut self, source: &Path, entry: CacheEntry) {
        self.entries.insert(cache_key(source), entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &CacheEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

fn cache_key(source: &Path) -> String {
    source.to_string_lossy().into_owned()
}

/// MD5 of `content`, as lowercase hex.
pub fn hash_content(content: &[u8]) -> String {
    format!("{:x}", Md5::digest(content))
}

/// Modification time as whole seconds since the epoch.
///
/// Times before the epoch come out negative rather than failing.
pub fn modified_secs(metadata: &fs::Metadata) -> io::Result<i64> {
    Ok(epoch_secs(metadata.modified()?))
}

fn epoch_secs(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs() as i64,
        Err(e) => -(e.duration().as_secs() as i64),
    }
}

/// Remove the cache file. Returns whether a file was removed.
pub fn clear(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;
    use tempfile::TempDir;

    fn entry(modified: i64, digest: &str) -> CacheEntry {
        CacheEntry {
            modified,
            digest: digest.into(),
        }
    }

    // =========================================================================
    // Load / save
    // =========================================================================

    #[test]
    fn empty_cache_has_no_entries() {
        let c = Cache::empty();
        assert!(c.is_empty());
        assert_eq!(c.len(), 0);
    }

    #[test]
    fn save_and_load_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("yuic.cache");
        let mut c = Cache::empty();
        c.insert(Path::new("/src/a.js"), entry(100, "aaa"));
        c.insert(Path::new("/src/b.css"), entry(-5, "bbb"));

        c.save(&path).unwrap();
        let loaded = Cache::load(&path);

        assert_eq!(loaded, c);
        assert_eq!(loaded.get(Path::new("/src/b.css")), Some(&entry(-5, "bbb")));
    }

    #[test]
    fn saved_document_uses_modified_and_md5_keys() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("yuic.cache");
        let mut c = Cache::empty();
        c.insert(Path::new("/src/app.js"), entry(42, "d1"));
        c.save(&path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["/src/app.js"]["modified"], 42);
        assert_eq!(value["/src/app.js"]["md5"], "d1");
    }

    #[test]
    fn loads_document_written_by_other_tools() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("yuic.cache");
        fs::write(
            &path,
            r#"{"/w/app.js":{"modified":1429660000,"md5":"0cc175b9c0f1b6a831c399e269772661"}}"#,
        )
        .unwrap();

        let c = Cache::load(&path);
        assert_eq!(c.len(), 1);
        let entry = c.get(Path::new("/w/app.js")).unwrap();
        assert_eq!(entry.modified, 1429660000);
        // The stored digest is the one this tool computes for `a`
        assert_eq!(entry.digest, hash_content(b"a"));
    }

    #[test]
    fn save_is_byte_stable() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("yuic.cache");
        let mut c = Cache::empty();
        c.insert(Path::new("/z.js"), entry(1, "z"));
        c.insert(Path::new("/a.js"), entry(2, "a"));

        c.save(&path).unwrap();
        let first = fs::read(&path).unwrap();
        Cache::load(&path).save(&path).unwrap();
        assert_eq!(fs::read(&path).unwrap(), first);
    }

    #[test]
    fn save_creates_parent_directories() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("build/cache/yuic.cache");
        Cache::empty().save(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn save_overwrites_previous_state() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("yuic.cache");
        let mut c = Cache::empty();
        c.insert(Path::new("/a.js"), entry(1, "a"));
        c.save(&path).unwrap();
        c.insert(Path::new("/b.js"), entry(2, "b"));
        c.save(&path).unwrap();

        assert_eq!(Cache::load(&path).len(), 2);
        // No temporary files left behind
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 1);
    }

    #[test]
    fn load_missing_file_returns_empty() {
        let tmp = TempDir::new().unwrap();
        assert!(Cache::load(&tmp.path().join("nope.cache")).is_empty());
    }

    #[test]
    fn load_corrupt_json_returns_empty() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("yuic.cache");
        fs::write(&path, "{not json").unwrap();
        assert!(Cache::load(&path).is_empty());
    }

    #[test]
    fn load_wrong_shape_returns_empty() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("yuic.cache");
        fs::write(&path, r#"{"/a.js": {"modified": "yesterday"}}"#).unwrap();
        assert!(Cache::load(&path).is_empty());
    }

    #[test]
    fn insert_replaces_existing_entry() {
        let mut c = Cache::empty();
        let key = PathBuf::from("/a.js");
        c.insert(&key, entry(1, "old"));
        c.insert(&key, entry(2, "new"));
        assert_eq!(c.len(), 1);
        assert_eq!(c.get(&key), Some(&entry(2, "new")));
    }

    #[test]
    fn iter_is_sorted_by_path() {
        let mut c = Cache::empty();
        c.insert(Path::new("/b"), entry(1, "b"));
        c.insert(Path::new("/a"), entry(1, "a"));
        let keys: Vec<&str> = c.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["/a", "/b"]);
    }

    // =========================================================================
    // Digests and timestamps
    // =========================================================================

    #[test]
    fn hash_content_deterministic() {
        let h1 = hash_content(b"hello world");
        let h2 = hash_content(b"hello world");
        assert_eq!(h1, h2);
        assert_eq!(h1, "5eb63bbbe01eeed093cb22bb8f5acdc3");
    }

    #[test]
    fn hash_content_of_empty_input() {
        assert_eq!(hash_content(b""), "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn hash_content_changes_with_content() {
        assert_ne!(hash_content(b"version 1"), hash_content(b"version 2"));
    }

    #[test]
    fn epoch_secs_before_epoch_is_negative() {
        let t = UNIX_EPOCH - Duration::from_secs(10);
        assert_eq!(epoch_secs(t), -10);
        assert_eq!(epoch_secs(UNIX_EPOCH + Duration::from_millis(2500)), 2);
    }

    #[test]
    fn clear_removes_file_once() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("yuic.cache");
        Cache::empty().save(&path).unwrap();
        assert!(clear(&path).unwrap());
        assert!(!clear(&path).unwrap());
    }
}
