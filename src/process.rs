//! The minification run.
//!
//! Batches are processed strictly in order (file lists, then file sets) and
//! files one at a time within each batch:
//!
//! ```text
//! read source ─→ filter chains ─→ freshness check ─┬─ unchanged → skip
//!                                                  └─ stale → minify → cache insert → cache save
//! ```
//!
//! ## Failure handling
//!
//! | Failure | Effect |
//! |---------|--------|
//! | Minifier jar missing | [`ProcessError::Precondition`]; nothing is read, the cache file is untouched |
//! | Batch can't be resolved | Warning, batch skipped, next batch runs |
//! | A file can't be read, filtered or minified | Error logged, no cache entry; then [`FailurePolicy`] decides |
//!
//! The cache is saved after every successful minification and once more at
//! the end, so a run killed halfway keeps everything it finished.

use crate::batch::{Batch, BatchError, BatchId, resolve_file_list, resolve_file_set};
use crate::cache::{Cache, CacheEntry, modified_secs};
use crate::config::{FailurePolicy, MinifyConfig};
use crate::filter::{FilterError, apply_chains};
use crate::freshness::{self, Freshness, SourceState, StaleReason};
use crate::minifier::{MinifyError, Minifier, YuiCompressor};
use crate::naming;
use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Errors that stop the whole run.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("{0}")]
    Precondition(MinifyError),
    #[error("cannot write cache file {path}: {source}")]
    CacheSave {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Errors confined to a single source file.
#[derive(Error, Debug)]
pub enum FileError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{path}: {source}")]
    Filter {
        path: PathBuf,
        #[source]
        source: FilterError,
    },
    #[error("cannot stage filtered copy of {path}: {source}")]
    Stage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Minify(#[from] MinifyError),
}

impl FileError {
    /// Tool output attached to the failure, if any.
    pub fn output(&self) -> Option<&str> {
        match self {
            FileError::Minify(e) => e.output(),
            _ => None,
        }
    }
}

/// Per-run switches that don't belong in the config file.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Consult the existing cache. When false every file is minified and the
    /// cache is rewritten from this run's results.
    pub use_cache: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self { use_cache: true }
    }
}

/// A file that was minified in this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinifiedFile {
    pub source: PathBuf,
    pub target: PathBuf,
    pub reason: StaleReason,
}

/// A file that failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    pub source: PathBuf,
    pub message: String,
    pub output: Option<String>,
}

/// Summary of a run.
#[derive(Debug, Default)]
pub struct RunReport {
    pub minified: Vec<MinifiedFile>,
    pub unchanged: usize,
    pub failures: Vec<FileFailure>,
    /// Messages of batches that could not be resolved.
    pub batch_failures: Vec<String>,
    /// Set when `on_error = "abort-run"` stopped processing early.
    pub aborted: bool,
}

impl RunReport {
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty() || !self.batch_failures.is_empty()
    }

    pub fn total(&self) -> usize {
        self.minified.len() + self.unchanged + self.failures.len()
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} minified, {} unchanged",
            self.minified.len(),
            self.unchanged
        )?;
        if !self.failures.is_empty() {
            write!(f, ", {} failed", self.failures.len())?;
        }
        if !self.batch_failures.is_empty() {
            write!(f, ", {} batch(es) skipped", self.batch_failures.len())?;
        }
        write!(f, " ({} total)", self.total())
    }
}

/// Everything known about one source before deciding what to do with it.
#[derive(Debug)]
pub struct InspectedFile {
    pub source: PathBuf,
    pub canonical: PathBuf,
    pub target: PathBuf,
    pub modified: i64,
    /// Post-filter content.
    pub content: Vec<u8>,
    /// True when filters changed the content, so the minifier must be fed a
    /// staged copy instead of the source.
    pub filtered: bool,
    pub freshness: Freshness,
}

/// The YUI Compressor described by `config`.
pub fn yui_compressor(config: &MinifyConfig) -> YuiCompressor {
    YuiCompressor::new(&config.java, &config.jar).with_extra_args(config.extra_args.clone())
}

/// Run with the YUI Compressor described by `config`.
pub fn run(config: &MinifyConfig, options: &RunOptions) -> Result<RunReport, ProcessError> {
    run_with_minifier(&yui_compressor(config), config, options)
}

/// Run with a specific minifier (allows testing with a mock).
pub fn run_with_minifier(
    minifier: &impl Minifier,
    config: &MinifyConfig,
    options: &RunOptions,
) -> Result<RunReport, ProcessError> {
    minifier.preflight().map_err(ProcessError::Precondition)?;

    let mut cache = if options.use_cache {
        Cache::load(&config.cache_file)
    } else {
        Cache::empty()
    };
    let mut report = RunReport::default();

    'batches: for batch in resolve_batches(config) {
        let batch = match batch {
            Ok(b) => b,
            Err(e) => {
                warn!("{e}");
                report.batch_failures.push(e.to_string());
                continue;
            }
        };
        debug!(
            "{}: {} file(s) in {}",
            batch.id,
            batch.files.len(),
            batch.dir.display()
        );

        for (source, relative) in batch.sources() {
            match minify_file(minifier, config, &cache, &batch, relative) {
                Ok(FileOutcome::Unchanged) => {
                    debug!("No change in {}", source.display());
                    report.unchanged += 1;
                }
                Ok(FileOutcome::Minified {
                    canonical,
                    entry,
                    file,
                }) => {
                    cache.insert(&canonical, entry);
                    if let Err(e) = cache.save(&config.cache_file) {
                        warn!(
                            "Cannot save cache file {}: {e}",
                            config.cache_file.display()
                        );
                    }
                    report.minified.push(file);
                }
                Err(e) => {
                    error!("{e}");
                    if let Some(output) = e.output() {
                        error!("{output}");
                    }
                    report.failures.push(FileFailure {
                        source: source.clone(),
                        message: e.to_string(),
                        output: e.output().map(str::to_string),
                    });
                    match config.on_error {
                        FailurePolicy::Continue => {}
                        FailurePolicy::AbortBatch => {
                            warn!("{}: skipping remaining files after failure", batch.id);
                            break;
                        }
                        FailurePolicy::AbortRun => {
                            warn!("Stopping after failure in {}", source.display());
                            report.aborted = true;
                            break 'batches;
                        }
                    }
                }
            }
        }
    }

    cache
        .save(&config.cache_file)
        .map_err(|e| ProcessError::CacheSave {
            path: config.cache_file.clone(),
            source: e,
        })?;
    Ok(report)
}

/// Resolve every batch, file lists first, in config order.
///
/// File sets never yield files this tool writes or reads for itself: the
/// target of any source in the run, the cache file and the config file. A set
/// scanning its own output directory would otherwise pick up `app.min.js` as
/// a new source on the next run.
pub fn resolve_batches(config: &MinifyConfig) -> Vec<Result<Batch, BatchError>> {
    let lists = config
        .file_lists
        .iter()
        .enumerate()
        .map(|(i, l)| resolve_file_list(BatchId::FileList(i + 1), l));
    let sets = config
        .file_sets
        .iter()
        .enumerate()
        .map(|(i, s)| resolve_file_set(BatchId::FileSet(i + 1), s));
    let mut batches: Vec<_> = lists.chain(sets).collect();

    let mut own_files: HashSet<PathBuf> = batches
        .iter()
        .flatten()
        .flat_map(|batch| {
            batch.files.iter().map(move |f| {
                naming::target_path(
                    &config.name_template,
                    f,
                    &batch.dir,
                    config.target_dir.as_deref(),
                )
            })
        })
        .collect();
    own_files.insert(naming::normalize(&config.cache_file));
    if let Some(path) = &config.path {
        own_files.insert(naming::normalize(path));
    }

    for batch in batches.iter_mut().flatten() {
        if !matches!(batch.id, BatchId::FileSet(_)) {
            continue;
        }
        let id = batch.id;
        let dir = batch.dir.clone();
        batch.files.retain(|f| {
            let own = own_files.contains(&naming::normalize(&dir.join(f)));
            if own {
                debug!("{id}: skipping {}, written by this tool", f.display());
            }
            !own
        });
    }
    batches
}

enum FileOutcome {
    Unchanged,
    Minified {
        canonical: PathBuf,
        entry: CacheEntry,
        file: MinifiedFile,
    },
}

fn minify_file(
    minifier: &impl Minifier,
    config: &MinifyConfig,
    cache: &Cache,
    batch: &Batch,
    relative: &Path,
) -> Result<FileOutcome, FileError> {
    let inspected = inspect_file(config, cache, batch, relative)?;
    let (digest, reason) = match inspected.freshness {
        Freshness::Unchanged => return Ok(FileOutcome::Unchanged),
        Freshness::Stale { digest, reason } => (digest, reason),
    };

    info!(
        "Minifying {} to {}",
        inspected.source.display(),
        inspected.target.display()
    );

    let staged = if inspected.filtered {
        Some(stage_filtered(&inspected.source, &inspected.content)?)
    } else {
        None
    };
    let input = staged
        .as_ref()
        .map_or(inspected.source.as_path(), |s| s.path());
    minifier
        .minify(input, &inspected.target)
        .map_err(|e| match &staged {
            Some(s) => attribute_to_source(e, s.path(), &inspected.source),
            None => e,
        })?;

    Ok(FileOutcome::Minified {
        canonical: inspected.canonical,
        entry: CacheEntry {
            modified: inspected.modified,
            digest,
        },
        file: MinifiedFile {
            source: inspected.source,
            target: inspected.target,
            reason,
        },
    })
}

/// Read, filter and check one source without minifying it.
pub fn inspect_file(
    config: &MinifyConfig,
    cache: &Cache,
    batch: &Batch,
    relative: &Path,
) -> Result<InspectedFile, FileError> {
    let source = batch.dir.join(relative);
    let read_err = |e| FileError::Read {
        path: source.clone(),
        source: e,
    };

    let raw = fs::read(&source).map_err(read_err)?;
    let metadata = fs::metadata(&source).map_err(read_err)?;
    let modified = modified_secs(&metadata).map_err(read_err)?;
    let canonical = fs::canonicalize(&source).map_err(read_err)?;

    let changed = match apply_chains(&config.filter_chains, &raw) {
        Ok(Cow::Owned(filtered)) if filtered != raw => Some(filtered),
        Ok(_) => None,
        Err(e) => {
            return Err(FileError::Filter {
                path: source.clone(),
                source: e,
            });
        }
    };
    let (content, filtered) = match changed {
        Some(c) => (c, true),
        None => (raw, false),
    };

    let target = naming::target_path(
        &config.name_template,
        relative,
        &batch.dir,
        config.target_dir.as_deref(),
    );
    let freshness = freshness::check(
        cache,
        SourceState {
            canonical: &canonical,
            modified,
            content: &content,
        },
        target.exists(),
    );

    Ok(InspectedFile {
        source,
        canonical,
        target,
        modified,
        content,
        filtered,
        freshness,
    })
}

/// Write filtered content to a temp file with the source's extension, which
/// the minifier uses to pick JS or CSS mode.
fn stage_filtered(source: &Path, content: &[u8]) -> Result<tempfile::NamedTempFile, FileError> {
    let stage_err = |e| FileError::Stage {
        path: source.to_path_buf(),
        source: e,
    };
    let suffix = source
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let mut file = tempfile::Builder::new()
        .prefix("yuic-")
        .suffix(&suffix)
        .tempfile()
        .map_err(stage_err)?;
    file.write_all(content).map_err(stage_err)?;
    file.flush().map_err(stage_err)?;
    Ok(file)
}

/// Point a failure on a staged copy back at the real source, so messages and
/// tool output name the file the user edits.
fn attribute_to_source(err: MinifyError, staged: &Path, source: &Path) -> MinifyError {
    match err {
        MinifyError::Failed { status, output, .. } => MinifyError::Failed {
            path: source.to_path_buf(),
            status,
            output: output.replace(&*staged.to_string_lossy(), &source.to_string_lossy()),
        },
        other => other,
    }
}

// =============================================================================
// Dry run
// =============================================================================

/// What a run would do with one file.
#[derive(Debug)]
pub struct PlannedFile {
    pub batch: BatchId,
    pub batch_dir: PathBuf,
    pub source: PathBuf,
    pub outcome: Result<(PathBuf, Freshness), String>,
}

/// Result of [`plan`].
#[derive(Debug, Default)]
pub struct Plan {
    pub files: Vec<PlannedFile>,
    pub batch_failures: Vec<String>,
}

impl Plan {
    pub fn stale_count(&self) -> usize {
        self.files
            .iter()
            .filter(|f| matches!(&f.outcome, Ok((_, fr)) if fr.is_stale()))
            .count()
    }
}

/// Work out what a run would do, without minifying or writing the cache.
pub fn plan(
    minifier: &impl Minifier,
    config: &MinifyConfig,
    options: &RunOptions,
) -> Result<Plan, ProcessError> {
    minifier.preflight().map_err(ProcessError::Precondition)?;

    let cache = if options.use_cache {
        Cache::load(&config.cache_file)
    } else {
        Cache::empty()
    };
    let mut plan = Plan::default();

    for batch in resolve_batches(config) {
        let batch = match batch {
            Ok(b) => b,
            Err(e) => {
                warn!("{e}");
                plan.batch_failures.push(e.to_string());
                continue;
            }
        };
        for (source, relative) in batch.sources() {
            let outcome = inspect_file(config, &cache, &batch, relative)
                .map(|i| (i.target, i.freshness))
                .map_err(|e| e.to_string());
            plan.files.push(PlannedFile {
                batch: batch.id,
                batch_dir: batch.dir.clone(),
                source,
                outcome,
            });
        }
    }
    Ok(plan)
}
