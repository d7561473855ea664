//! Change detection: decide whether a source needs minifying again.
//!
//! The check has two tiers. The modification time is compared first; when it
//! differs from the cached one, or there is no cache entry, or the target file
//! has disappeared, the file is stale outright. When the timestamp matches,
//! the content digest decides, which catches edits that kept the mtime and
//! checkouts that reset it inconsistently.
//!
//! The digest is computed in every case because a stale file needs it for
//! its new cache entry.

use crate::cache::{Cache, hash_content};
use std::fmt;
use std::path::Path;

/// Why a source has to be minified again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleReason {
    /// No cache entry: never minified successfully.
    New,
    /// The target file no longer exists.
    TargetMissing,
    /// Modification time differs from the cached one.
    Modified,
    /// Same modification time, different content.
    ContentChanged,
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StaleReason::New => "new",
            StaleReason::TargetMissing => "target missing",
            StaleReason::Modified => "modified",
            StaleReason::ContentChanged => "content changed",
        };
        f.write_str(s)
    }
}

/// Outcome of a freshness check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Freshness {
    /// Cached entry is current; nothing to do.
    Unchanged,
    /// Needs minifying. `digest` goes into the cache once that succeeds.
    Stale { digest: String, reason: StaleReason },
}

impl Freshness {
    pub fn is_stale(&self) -> bool {
        matches!(self, Freshness::Stale { .. })
    }
}

/// A source file as seen by the detector.
#[derive(Debug, Clone, Copy)]
pub struct SourceState<'a> {
    /// Canonical path, the cache key.
    pub canonical: &'a Path,
    /// Modification time in epoch seconds.
    pub modified: i64,
    /// Post-filter content.
    pub content: &'a [u8],
}

/// Compare a source against its cache entry.
pub fn check(cache: &Cache, source: SourceState<'_>, target_exists: bool) -> Freshness {
    let digest = hash_content(source.content);
    let reason = match cache.get(source.canonical) {
        None => Some(StaleReason::New),
        Some(_) if !target_exists => Some(StaleReason::TargetMissing),
        Some(entry) if entry.modified != source.modified => Some(StaleReason::Modified),
        Some(entry) if entry.digest != digest => Some(StaleReason::ContentChanged),
        Some(_) => None,
    };
    match reason {
        Some(reason) => Freshness::Stale { digest, reason },
        None => Freshness::Unchanged,
    }
}
