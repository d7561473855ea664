//! CLI output formatting for `run` and `check`.
//!
//! Logging (via `tracing`) narrates progress while a run is underway. The
//! functions here print the summary afterwards, on stdout, so it can be piped
//! or diffed independently of the log stream on stderr.
//!
//! # Output Format
//!
//! ## Run
//!
//! ```text
//! Minified
//!     web/js/app.js → web/js/app.min.js (modified)
//!     web/css/site.css → web/css/site.min.css (new)
//!
//! Failed
//!     web/js/broken.js
//!         failed to minify web/js/broken.js (exit code 2)
//!         [ERROR] 3:12:missing ; before statement
//!
//! 2 minified, 14 unchanged, 1 failed (17 total)
//! ```
//!
//! ## Check
//!
//! ```text
//! filelist #1 (web/js)
//!     web/js/app.js → web/js/app.min.js: modified
//!     web/js/util.js → web/js/util.min.js: unchanged
//! fileset #1 (web/css)
//!     web/css/site.css → web/css/site.min.css: new
//!
//! 2 of 3 file(s) would be minified
//! ```
//!
//! Each output has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout.

use crate::batch::BatchId;
use crate::freshness::Freshness;
use crate::process::{Plan, RunReport};
use std::path::Path;

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Display `path` relative to `base` when it lives underneath it.
fn relative_display(path: &Path, base: Option<&Path>) -> String {
    base.and_then(|b| path.strip_prefix(b).ok())
        .unwrap_or(path)
        .display()
        .to_string()
}

// ============================================================================
// Run
// ============================================================================

/// Format the summary of a completed run.
///
/// Paths are shown relative to `base` (usually the config directory).
pub fn format_run_report(report: &RunReport, base: Option<&Path>) -> Vec<String> {
    let mut lines = Vec::new();

    if !report.minified.is_empty() {
        lines.push("Minified".to_string());
        for file in &report.minified {
            lines.push(format!(
                "{}{} → {} ({})",
                indent(1),
                relative_display(&file.source, base),
                relative_display(&file.target, base),
                file.reason
            ));
        }
        lines.push(String::new());
    }

    if !report.failures.is_empty() || !report.batch_failures.is_empty() {
        lines.push("Failed".to_string());
        for message in &report.batch_failures {
            lines.push(format!("{}{}", indent(1), message));
        }
        for failure in &report.failures {
            lines.push(format!(
                "{}{}",
                indent(1),
                relative_display(&failure.source, base)
            ));
            lines.push(format!("{}{}", indent(2), failure.message));
            if let Some(output) = &failure.output {
                lines.extend(output.lines().map(|l| format!("{}{}", indent(2), l)));
            }
        }
        lines.push(String::new());
    }

    if report.aborted {
        lines.push("Run stopped after the first failure".to_string());
    }
    lines.push(report.to_string());
    lines
}

pub fn print_run_report(report: &RunReport, base: Option<&Path>) {
    for line in format_run_report(report, base) {
        println!("{}", line);
    }
}

// ============================================================================
// Check
// ============================================================================

/// Format a dry-run plan, grouped by batch.
pub fn format_check_output(plan: &Plan, base: Option<&Path>) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current: Option<BatchId> = None;

    for file in &plan.files {
        if current != Some(file.batch) {
            current = Some(file.batch);
            lines.push(format!(
                "{} ({})",
                file.batch,
                relative_display(&file.batch_dir, base)
            ));
        }
        let name = relative_display(&file.source, base);
        match &file.outcome {
            Ok((target, freshness)) => {
                let status = match freshness {
                    Freshness::Unchanged => "unchanged".to_string(),
                    Freshness::Stale { reason, .. } => reason.to_string(),
                };
                lines.push(format!(
                    "{}{} → {}: {}",
                    indent(1),
                    name,
                    relative_display(target, base),
                    status
                ));
            }
            Err(message) => {
                lines.push(format!("{}{}: error", indent(1), name));
                lines.push(format!("{}{}", indent(2), message));
            }
        }
    }

    for message in &plan.batch_failures {
        lines.push(message.clone());
    }

    lines.push(String::new());
    lines.push(format!(
        "{} of {} file(s) would be minified",
        plan.stale_count(),
        plan.files.len()
    ));
    lines
}

pub fn print_check_output(plan: &Plan, base: Option<&Path>) {
    for line in format_check_output(plan, base) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================
