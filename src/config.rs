//! Configuration loading.
//!
//! A run is described by a single TOML file, `yuic.toml` by default:
//!
//! ```toml
//! java = "java"
//! jar = "vendor/bin/yuicompressor.jar"
//! target_dir = "public/min"            # optional; default = next to each source
//! cache_file = "yuic.cache"
//! name_template = "{{dirname}}/{{filename}}.min.{{extension}}"
//! on_error = "continue"                # continue | abort-batch | abort-run
//! extra_args = ["--charset", "utf-8"]
//!
//! [[filelist]]
//! dir = "web/js"
//! files = ["jquery.js", "app.js"]
//!
//! [[fileset]]
//! dir = "web/css"
//! includes = ["**/*.css"]
//! excludes = ["*.min.css"]
//!
//! [[filterchain]]
//! filters = [{ type = "replace-tokens", tokens = { VERSION = "1.4.2" } }]
//! ```
//!
//! Every key is optional. Unknown keys are rejected to catch typos early.
//! Relative paths are resolved against the directory holding the config file,
//! so a build behaves the same wherever it is started from.

use crate::cache::DEFAULT_CACHE_FILE;
use crate::filter::FilterChain;
use crate::naming::DEFAULT_NAME_TEMPLATE;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default config file name.
pub const DEFAULT_CONFIG_FILE: &str = "yuic.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("config file not found: {0} (run `yuic gen-config` to create one)")]
    NotFound(PathBuf),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// What a per-file minification failure does to the rest of the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Log the failure and move on to the next file.
    #[default]
    Continue,
    /// Skip the rest of the current batch, continue with the next one.
    AbortBatch,
    /// Stop processing. Progress made so far is still saved.
    AbortRun,
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MinifyConfig {
    /// Program used to run the jar.
    pub java: String,
    /// Path to `yuicompressor.jar`. Must exist or the run aborts.
    pub jar: PathBuf,
    /// Root for minified output. `None` writes next to each batch's sources.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_dir: Option<PathBuf>,
    /// Where the change-detection cache lives.
    pub cache_file: PathBuf,
    /// Output file name template, see [`crate::naming`].
    pub name_template: String,
    /// Per-file failure handling.
    pub on_error: FailurePolicy,
    /// Extra minifier arguments, passed before `-o`.
    pub extra_args: Vec<String>,
    /// Explicit, ordered file collections.
    #[serde(rename = "filelist")]
    pub file_lists: Vec<FileListConfig>,
    /// Directory-scanned file collections.
    #[serde(rename = "fileset")]
    pub file_sets: Vec<FileSetConfig>,
    /// Content transforms applied before digesting and minifying.
    #[serde(rename = "filterchain")]
    pub filter_chains: Vec<FilterChain>,
    /// File this config was loaded from, if any.
    #[serde(skip)]
    pub path: Option<PathBuf>,
}

impl Default for MinifyConfig {
    fn default() -> Self {
        Self {
            java: "java".to_string(),
            jar: PathBuf::from("vendor/bin/yuicompressor.jar"),
            target_dir: None,
            cache_file: PathBuf::from(DEFAULT_CACHE_FILE),
            name_template: DEFAULT_NAME_TEMPLATE.to_string(),
            on_error: FailurePolicy::default(),
            extra_args: Vec::new(),
            file_lists: Vec::new(),
            file_sets: Vec::new(),
            filter_chains: Vec::new(),
            path: None,
        }
    }
}

/// An explicit list of files under `dir`, processed in the given order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileListConfig {
    pub dir: PathBuf,
    /// File names relative to `dir`.
    #[serde(default)]
    pub files: Vec<String>,
    /// File with one name per line; `#` comments and blank lines ignored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_file: Option<PathBuf>,
}

/// Files found by scanning `dir` with include/exclude globs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileSetConfig {
    pub dir: PathBuf,
    /// Gitignore-style patterns; a file must match one. Empty means all.
    #[serde(default = "default_includes")]
    pub includes: Vec<String>,
    /// Gitignore-style patterns; a matching file is dropped.
    #[serde(default)]
    pub excludes: Vec<String>,
    /// Also drop VCS metadata and editor droppings.
    #[serde(default = "default_true")]
    pub default_excludes: bool,
}

fn default_includes() -> Vec<String> {
    vec!["**".to_string()]
}

fn default_true() -> bool {
    true
}

impl MinifyConfig {
    /// Validate values that deserialize fine but can't work.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.java.trim().is_empty() {
            return Err(ConfigError::Validation("java must not be empty".into()));
        }
        if self.jar.as_os_str().is_empty() {
            return Err(ConfigError::Validation("jar must not be empty".into()));
        }
        if self.cache_file.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "cache_file must not be empty".into(),
            ));
        }
        if self.name_template.trim().is_empty() {
            return Err(ConfigError::Validation(
                "name_template must not be empty".into(),
            ));
        }
        for (i, list) in self.file_lists.iter().enumerate() {
            if list.dir.as_os_str().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "filelist #{}: dir must not be empty",
                    i + 1
                )));
            }
        }
        for (i, set) in self.file_sets.iter().enumerate() {
            if set.dir.as_os_str().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "fileset #{}: dir must not be empty",
                    i + 1
                )));
            }
        }
        Ok(())
    }

    /// Make every relative path absolute against `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.jar);
        resolve(&mut self.cache_file);
        if let Some(dir) = self.target_dir.as_mut() {
            resolve(dir);
        }
        for list in &mut self.file_lists {
            resolve(&mut list.dir);
            if let Some(f) = list.list_file.as_mut() {
                resolve(f);
            }
        }
        for set in &mut self.file_sets {
            resolve(&mut set.dir);
        }
    }
}

/// Parse config text without touching the filesystem.
pub fn parse_config(content: &str) -> Result<MinifyConfig, ConfigError> {
    let config: MinifyConfig = toml::from_str(content)?;
    config.validate()?;
    Ok(config)
}

/// Load, validate and path-resolve a config file.
pub fn load_config(path: &Path) -> Result<MinifyConfig, ConfigError> {
    if !path.is_file() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }
    let content = fs::read_to_string(path)?;
    let mut config = parse_config(&content)?;
    let base = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => std::env::current_dir()?,
    };
    config.resolve_paths(&base);
    config.path = path.file_name().map(|name| base.join(name));
    Ok(config)
}

/// Returns a fully-commented stock `yuic.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# yuic configuration
# ==================
# All settings are optional. Values shown are the defaults.
# Relative paths are resolved against the directory holding this file.
# Unknown keys will cause an error.

# Program used to run the minifier jar.
java = "java"

# Path to yuicompressor.jar. The run aborts if it does not exist.
jar = "vendor/bin/yuicompressor.jar"

# Root directory for minified files. When unset, output is written next to
# the sources of each file list / file set.
# target_dir = "public/min"

# Change-detection cache. Delete it (or run `yuic clear-cache`) to force a
# full rebuild.
cache_file = "yuic.cache"

# Output file name. Tokens: {{dirname}} {{basename}} {{filename}} {{extension}}
# Unknown tokens are left as-is.
name_template = "{{dirname}}/{{filename}}.min.{{extension}}"

# What a failed minification does to the rest of the run:
#   "continue"     log it and go on with the next file
#   "abort-batch"  skip the rest of the current file list / file set
#   "abort-run"    stop; everything minified so far stays cached
on_error = "continue"

# Extra arguments for the minifier, placed before `-o`.
extra_args = []

# ---------------------------------------------------------------------------
# File lists: explicit files, processed in the order given.
# ---------------------------------------------------------------------------
# [[filelist]]
# dir = "web/js"
# files = ["jquery.js", "app.js"]
# list_file = "web/js/bundle.txt"   # one name per line, '#' comments allowed

# ---------------------------------------------------------------------------
# File sets: directory scans with gitignore-style include/exclude patterns.
# ---------------------------------------------------------------------------
# [[fileset]]
# dir = "web/css"
# includes = ["**/*.css"]
# excludes = ["*.min.css"]
# default_excludes = true            # skip .git/, .svn/, *~, .DS_Store, ...

# ---------------------------------------------------------------------------
# Filter chains: applied to every file, in order, before minifying.
# ---------------------------------------------------------------------------
# [[filterchain]]
# filters = [
#     { type = "replace-tokens", begin = "@", end = "@", tokens = { VERSION = "1.0" } },
#     { type = "strip-line-comments", prefixes = ["//"] },
#     { type = "tab-to-spaces", width = 4 },
#     { type = "prefix-lines", prefix = "" },
# ]
"##
}
