//! Batch resolution: turn `[[filelist]]` and `[[fileset]]` blocks into
//! concrete lists of source files.
//!
//! A [`Batch`] is a base directory plus file paths relative to it. The
//! relative path is what the name template sees (`{{dirname}}` of
//! `vendor/lib.js` is `vendor`), the base directory is where sources are read
//! from and, without a `target_dir`, where output goes.
//!
//! Resolution problems (missing directory, unreadable list file, bad glob)
//! fail the whole batch with a [`BatchError`]. The orchestrator logs those
//! and carries on with the next batch. A file list naming a file that does
//! not exist is not a batch error: that file fails on its own when read.

use crate::config::{FileListConfig, FileSetConfig};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// Patterns excluded from file sets unless `default_excludes = false`.
const DEFAULT_EXCLUDES: &[&str] = &[
    "*~",
    r"\#*#",
    ".#*",
    "%*%",
    "._*",
    ".DS_Store",
    "CVS/",
    ".cvsignore",
    "SCCS/",
    "vssver.scc",
    ".svn/",
    ".git/",
    ".gitignore",
    ".gitattributes",
    ".gitmodules",
    ".hg/",
    ".hgignore",
    ".bzr/",
    ".bzrignore",
];

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("{batch}: directory {dir} does not exist")]
    MissingDir { batch: BatchId, dir: PathBuf },
    #[error("{batch}: {dir} is not a directory")]
    NotADirectory { batch: BatchId, dir: PathBuf },
    #[error("{batch}: cannot read list file {path}: {source}")]
    ListFile {
        batch: BatchId,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{batch}: invalid pattern `{pattern}`: {message}")]
    Pattern {
        batch: BatchId,
        pattern: String,
        message: String,
    },
    #[error("{batch}: cannot scan directory: {source}")]
    Walk {
        batch: BatchId,
        #[source]
        source: walkdir::Error,
    },
}

/// Which config block a batch came from, 1-based like the config file reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchId {
    FileList(usize),
    FileSet(usize),
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchId::FileList(n) => write!(f, "filelist #{n}"),
            BatchId::FileSet(n) => write!(f, "fileset #{n}"),
        }
    }
}

/// A resolved collection of source files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub id: BatchId,
    pub dir: PathBuf,
    /// Paths relative to `dir`, in processing order.
    pub files: Vec<PathBuf>,
}

impl Batch {
    /// Absolute (or `dir`-relative) path of every file.
    pub fn sources(&self) -> impl Iterator<Item = (PathBuf, &Path)> {
        self.files.iter().map(|f| (self.dir.join(f), f.as_path()))
    }
}

fn check_dir(batch: BatchId, dir: &Path) -> Result<(), BatchError> {
    if !dir.exists() {
        return Err(BatchError::MissingDir {
            batch,
            dir: dir.to_path_buf(),
        });
    }
    if !dir.is_dir() {
        return Err(BatchError::NotADirectory {
            batch,
            dir: dir.to_path_buf(),
        });
    }
    Ok(())
}

/// Resolve a file list: inline `files` first, then `list_file` entries.
pub fn resolve_file_list(batch: BatchId, config: &FileListConfig) -> Result<Batch, BatchError> {
    check_dir(batch, &config.dir)?;

    let mut files: Vec<PathBuf> = config
        .files
        .iter()
        .map(|f| f.trim())
        .filter(|f| !f.is_empty())
        .map(PathBuf::from)
        .collect();

    if let Some(list_file) = &config.list_file {
        let content = fs::read_to_string(list_file).map_err(|e| BatchError::ListFile {
            batch,
            path: list_file.clone(),
            source: e,
        })?;
        files.extend(parse_list_file(&content));
    }

    Ok(Batch {
        id: batch,
        dir: config.dir.clone(),
        files,
    })
}

fn parse_list_file(content: &str) -> impl Iterator<Item = PathBuf> + '_ {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(PathBuf::from)
}

/// Resolve a file set by walking `dir`. Results are sorted by path.
pub fn resolve_file_set(batch: BatchId, config: &FileSetConfig) -> Result<Batch, BatchError> {
    check_dir(batch, &config.dir)?;

    let includes = if config.includes.is_empty() {
        None
    } else {
        Some(build_matcher(batch, &config.dir, config.includes.iter().map(String::as_str))?)
    };
    let mut exclude_patterns: Vec<&str> = config.excludes.iter().map(String::as_str).collect();
    if config.default_excludes {
        exclude_patterns.extend_from_slice(DEFAULT_EXCLUDES);
    }
    let excludes = build_matcher(batch, &config.dir, exclude_patterns)?;

    let walker = WalkDir::new(&config.dir)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            !entry.file_type().is_dir()
                || entry
                    .path()
                    .strip_prefix(&config.dir)
                    .map(|rel| !excludes.matched(rel, true).is_ignore())
                    .unwrap_or(true)
        });

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|e| BatchError::Walk { batch, source: e })?;
        if !entry.path().is_file() {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(&config.dir) else {
            continue;
        };
        let included = includes
            .as_ref()
            .is_none_or(|m| m.matched_path_or_any_parents(rel, false).is_ignore());
        if included && !excludes.matched_path_or_any_parents(rel, false).is_ignore() {
            files.push(rel.to_path_buf());
        }
    }
    files.sort();

    Ok(Batch {
        id: batch,
        dir: config.dir.clone(),
        files,
    })
}

fn build_matcher<'a>(
    batch: BatchId,
    root: &Path,
    patterns: impl IntoIterator<Item = &'a str>,
) -> Result<Gitignore, BatchError> {
    let mut builder = GitignoreBuilder::new(root);
    for pattern in patterns {
        builder
            .add_line(None, pattern)
            .map_err(|e| BatchError::Pattern {
                batch,
                pattern: pattern.to_string(),
                message: e.to_string(),
            })?;
    }
    builder.build().map_err(|e| BatchError::Pattern {
        batch,
        pattern: String::new(),
        message: e.to_string(),
    })
}
