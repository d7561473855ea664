//! # yuic
//!
//! A build-time helper that runs YUI Compressor over a project's JavaScript
//! and CSS, skipping every file that hasn't changed since the last run.
//!
//! # How a Run Works
//!
//! ```text
//! yuic.toml ─→ batches ─→ per file: filter → freshness check ─┬─ unchanged → skip
//!                                                              └─ stale → java -jar … → yuic.cache
//! ```
//!
//! A config declares batches of sources, either explicit file lists or
//! directory scans with include/exclude patterns. Each source is read, passed
//! through the configured filter chains, and checked against `yuic.cache`.
//! Stale files are handed to the minifier one at a time; each success is
//! recorded in the cache immediately.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`config`] | `yuic.toml` loading, defaults, validation and path resolution |
//! | [`batch`] | Expands file lists and file sets into ordered source lists |
//! | [`filter`] | Content transforms applied before digesting and minifying |
//! | [`cache`] | The persistent `yuic.cache` map of source → (mtime, digest) |
//! | [`freshness`] | Two-tier change detection against the cache |
//! | [`naming`] | `{{dirname}}/{{filename}}.min.{{extension}}` target templates |
//! | [`minifier`] | The [`minifier::Minifier`] seam and the YUI Compressor subprocess |
//! | [`process`] | The run itself: ordering, failure policy, cache persistence |
//! | [`output`] | CLI summary formatting for `run` and `check` |
//!
//! # Design Decisions
//!
//! ## Timestamp First, Digest Second
//!
//! A file is unchanged only when both its modification time and its content
//! digest match the cache. A touched-but-identical file is re-minified once and
//! its new timestamp recorded; after that it is skipped again. The digest is
//! taken over post-filter content, so editing a filter's tokens invalidates
//! every file the filter affects even though no source changed on disk.
//!
//! ## Per-File Failure Isolation
//!
//! Minifier failures are logged with the tool's output and the run moves on.
//! A failed file gets no cache entry, so it is retried on the next run. The
//! only run-level precondition is that the jar exists; when it doesn't,
//! nothing is read and the cache file is left alone.
//!
//! ## Deterministic Cache File
//!
//! The cache is a sorted JSON object keyed by canonical source path, written
//! atomically. Two runs over unchanged sources produce byte-identical files,
//! so the cache can be committed alongside the minified output.

pub mod batch;
pub mod cache;
pub mod config;
pub mod filter;
pub mod freshness;
pub mod minifier;
pub mod naming;
pub mod output;
pub mod process;

#[cfg(test)]
pub(crate) mod test_helpers;
