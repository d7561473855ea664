//! Filter chains: content transforms applied before a file is digested and
//! minified.
//!
//! A config may declare any number of `[[filterchain]]` blocks, each with an
//! ordered `filters` list. Every chain is applied to every file, in
//! declaration order:
//!
//! ```toml
//! [[filterchain]]
//! filters = [
//!     { type = "replace-tokens", tokens = { VERSION = "1.4.2" } },
//!     { type = "strip-line-comments", prefixes = ["//"] },
//! ]
//! ```
//!
//! Filters work on text. With no filters configured the raw bytes pass
//! through untouched, so binary-ish or non-UTF-8 sources are only a problem
//! when a chain is actually present.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FilterError {
    #[error("filters need UTF-8 content: {0}")]
    NotUtf8(#[from] std::str::Utf8Error),
}

/// A single content transform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Filter {
    /// Replace `{begin}KEY{end}` with the token's value. Unknown keys stay.
    ReplaceTokens {
        #[serde(default = "default_delimiter")]
        begin: String,
        #[serde(default = "default_delimiter")]
        end: String,
        tokens: BTreeMap<String, String>,
    },
    /// Drop lines that start (after indentation) with one of `prefixes`.
    StripLineComments { prefixes: Vec<String> },
    /// Expand every tab to `width` spaces.
    TabToSpaces {
        #[serde(default = "default_tab_width")]
        width: usize,
    },
    /// Prepend `prefix` to every line.
    PrefixLines { prefix: String },
}

fn default_delimiter() -> String {
    "@".to_string()
}

fn default_tab_width() -> usize {
    8
}

impl Filter {
    pub fn apply(&self, text: &str) -> String {
        match self {
            Filter::ReplaceTokens { begin, end, tokens } => {
                let mut out = text.to_string();
                for (key, value) in tokens {
                    out = out.replace(&format!("{begin}{key}{end}"), value);
                }
                out
            }
            Filter::StripLineComments { prefixes } => text
                .split_inclusive('\n')
                .filter(|line| {
                    let trimmed = line.trim_start();
                    !prefixes
                        .iter()
                        .any(|p| !p.is_empty() && trimmed.starts_with(p.as_str()))
                })
                .collect(),
            Filter::TabToSpaces { width } => text.replace('\t', &" ".repeat(*width)),
            Filter::PrefixLines { prefix } => text
                .split_inclusive('\n')
                .map(|line| format!("{prefix}{line}"))
                .collect(),
        }
    }
}

/// An ordered list of filters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilterChain {
    pub filters: Vec<Filter>,
}

/// Run `content` through every chain in order.
///
/// Borrows the input when no chain has any filter.
pub fn apply_chains<'a>(
    chains: &[FilterChain],
    content: &'a [u8],
) -> Result<Cow<'a, [u8]>, FilterError> {
    let mut filters = chains.iter().flat_map(|c| c.filters.iter()).peekable();
    if filters.peek().is_none() {
        return Ok(Cow::Borrowed(content));
    }
    let mut text = std::str::from_utf8(content)?.to_string();
    for filter in filters {
        text = filter.apply(&text);
    }
    Ok(Cow::Owned(text.into_bytes()))
}
