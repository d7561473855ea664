//! Minifier invocation.
//!
//! The [`Minifier`] trait is the seam between the orchestrator and the tool
//! that does the actual work. The production implementation,
//! [`YuiCompressor`], runs the YUI Compressor jar through a JVM:
//!
//! ```text
//! java -jar vendor/bin/yuicompressor.jar [extra args] -o <target> <source>
//! ```
//!
//! Exit code 0 is success. Anything else is a per-file failure carrying the
//! tool's combined stdout/stderr, which the orchestrator logs before moving
//! on to the next file.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;
use tracing::trace;

#[derive(Error, Debug)]
pub enum MinifyError {
    /// The minifier archive is missing. Fatal for the whole run.
    #[error("minifier not found at {0}; set `jar` to the path of yuicompressor.jar")]
    JarNotFound(PathBuf),
    #[error("failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to minify {path} ({status})")]
    Failed {
        path: PathBuf,
        status: String,
        /// Captured stdout and stderr of the tool.
        output: String,
    },
}

impl MinifyError {
    /// Diagnostic output captured from the tool, if any.
    pub fn output(&self) -> Option<&str> {
        match self {
            MinifyError::Failed { output, .. } if !output.is_empty() => Some(output),
            _ => None,
        }
    }
}

/// Something that turns a source file into a minified target file.
pub trait Minifier {
    /// Run-level precondition, checked once before any file is touched.
    fn preflight(&self) -> Result<(), MinifyError> {
        Ok(())
    }

    /// Minify `source` into `target`. The target's directory may not exist.
    fn minify(&self, source: &Path, target: &Path) -> Result<(), MinifyError>;
}

/// YUI Compressor run as `java -jar`.
#[derive(Debug, Clone)]
pub struct YuiCompressor {
    java: OsString,
    jar: PathBuf,
    extra_args: Vec<String>,
}

impl YuiCompressor {
    pub fn new(java: impl Into<OsString>, jar: impl Into<PathBuf>) -> Self {
        Self {
            java: java.into(),
            jar: jar.into(),
            extra_args: Vec::new(),
        }
    }

    /// Extra arguments placed before `-o`, e.g. `--line-break 500`.
    pub fn with_extra_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }

    fn command(&self, source: &Path, target: &Path) -> Command {
        let mut cmd = Command::new(&self.java);
        cmd.arg("-jar")
            .arg(&self.jar)
            .args(&self.extra_args)
            .arg("-o")
            .arg(target)
            .arg(source);
        cmd
    }
}

impl Minifier for YuiCompressor {
    fn preflight(&self) -> Result<(), MinifyError> {
        if self.jar.exists() {
            Ok(())
        } else {
            Err(MinifyError::JarNotFound(self.jar.clone()))
        }
    }

    fn minify(&self, source: &Path, target: &Path) -> Result<(), MinifyError> {
        // A failure here resurfaces as the tool failing to write its output.
        if let Some(dir) = target.parent() {
            let _ = fs::create_dir_all(dir);
        }

        let mut cmd = self.command(source, target);
        trace!("Executing: {}", render_command(&cmd));

        let output = cmd.output().map_err(|e| MinifyError::Spawn {
            program: self.java.to_string_lossy().into_owned(),
            source: e,
        })?;
        if output.status.success() {
            return Ok(());
        }

        let mut captured = String::from_utf8_lossy(&output.stdout).into_owned();
        captured.push_str(&String::from_utf8_lossy(&output.stderr));
        Err(MinifyError::Failed {
            path: source.to_path_buf(),
            status: match output.status.code() {
                Some(code) => format!("exit code {code}"),
                None => "terminated by signal".to_string(),
            },
            output: captured.trim_end().to_string(),
        })
    }
}

/// Shell-like rendering of a command for log output.
fn render_command(cmd: &Command) -> String {
    std::iter::once(cmd.get_program())
        .chain(cmd.get_args())
        .map(|a| {
            let a = a.to_string_lossy();
            if a.is_empty() || a.contains(char::is_whitespace) || a.contains('\'') {
                format!("'{}'", a.replace('\'', r"'\''"))
            } else {
                a.into_owned()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
