//! Shared test utilities for the yuic test suite.
//!
//! Builds throwaway source trees and configs rooted in a temp directory.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! let src = write_source(tmp.path(), "web/app.js", "var a = 1;");
//! set_mtime(&src, 1_700_000_000);
//!
//! let config = config_with_list(tmp.path(), "web", &["app.js"]);
//! let report = run_with_minifier(&MockMinifier::new(), &config, &RunOptions::default()).unwrap();
//! assert_eq!(report.minified.len(), 1);
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::cache::DEFAULT_CACHE_FILE;
use crate::config::{FileListConfig, MinifyConfig};

// =========================================================================
// Source files
// =========================================================================

/// Write `content` to `root/relative`, creating parent directories.
pub fn write_source(root: &Path, relative: &str, content: &str) -> PathBuf {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, content).unwrap();
    path
}

/// Pin a file's modification time to `secs` after the epoch.
pub fn set_mtime(path: &Path, secs: u64) {
    let file = fs::File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
        .unwrap();
}

// =========================================================================
// Configs
// =========================================================================

/// Default config with the cache file and jar placed under `root`.
pub fn base_config(root: &Path) -> MinifyConfig {
    MinifyConfig {
        jar: root.join("yuicompressor.jar"),
        cache_file: root.join(DEFAULT_CACHE_FILE),
        ..MinifyConfig::default()
    }
}

/// Config with a single file list over `root/dir`.
pub fn config_with_list(root: &Path, dir: &str, files: &[&str]) -> MinifyConfig {
    let mut config = base_config(root);
    config.file_lists.push(FileListConfig {
        dir: root.join(dir),
        files: files.iter().map(|f| f.to_string()).collect(),
        list_file: None,
    });
    config
}
