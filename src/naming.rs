//! Output path naming for minified files.
//!
//! Every minified file gets its name from a template such as
//! `{{dirname}}/{{filename}}.min.{{extension}}`. The source path (relative to
//! its batch directory) is decomposed into four parts and each `{{key}}` token
//! in the template is replaced with the matching part:
//!
//! | Token | `css/site/app.css` | `robots.txt` |
//! |-------|--------------------|--------------|
//! | `{{dirname}}` | `css/site` | `.` |
//! | `{{basename}}` | `app.css` | `robots.txt` |
//! | `{{filename}}` | `app` | `robots` |
//! | `{{extension}}` | `css` | `txt` |
//!
//! A source without an extension has no `extension` part, so `{{extension}}`
//! stays in the rendered name verbatim, as does any unrecognized token. A bad
//! template shows up as an odd-looking target path rather than an error.

use std::path::{Component, Path, PathBuf};

/// Default template: `css/app.css` → `css/app.min.css`.
pub const DEFAULT_NAME_TEMPLATE: &str = "{{dirname}}/{{filename}}.min.{{extension}}";

/// A source path split into the parts a name template can refer to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathParts {
    /// Directory part, `.` when the path has none.
    pub dirname: String,
    /// Final component including extension.
    pub basename: String,
    /// Final component without its extension.
    pub filename: String,
    /// Extension without the dot, if any.
    pub extension: Option<String>,
}

impl PathParts {
    /// Decompose a (usually batch-relative) source path.
    pub fn from_path(path: &Path) -> Self {
        let dirname = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => to_slash(p),
            _ => ".".to_string(),
        };
        let basename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let filename = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().into_owned());
        Self {
            dirname,
            basename,
            filename,
            extension,
        }
    }

    /// `(key, value)` pairs for every part that is present.
    fn bindings(&self) -> Vec<(&'static str, &str)> {
        let mut out = vec![
            ("dirname", self.dirname.as_str()),
            ("basename", self.basename.as_str()),
            ("filename", self.filename.as_str()),
        ];
        if let Some(ext) = &self.extension {
            out.push(("extension", ext.as_str()));
        }
        out
    }
}

/// Substitute every recognized `{{key}}` token in `template`.
pub fn render_template(template: &str, parts: &PathParts) -> String {
    let mut name = template.to_string();
    for (key, value) in parts.bindings() {
        name = name.replace(&format!("{{{{{key}}}}}"), value);
    }
    name
}

/// Resolve the target path for `relative_source`.
///
/// The rendered name is joined onto `target_dir` when one is configured,
/// otherwise onto the batch directory the source came from. `.` components
/// (from a `{{dirname}}` of a top-level file) are dropped.
pub fn target_path(
    template: &str,
    relative_source: &Path,
    batch_dir: &Path,
    target_dir: Option<&Path>,
) -> PathBuf {
    let parts = PathParts::from_path(relative_source);
    let name = render_template(template, &parts);
    let base = target_dir.unwrap_or(batch_dir);
    normalize(&base.join(name))
}

/// Drop `.` components so equal paths compare equal.
pub fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

fn to_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
