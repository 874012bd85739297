//! Output naming and input filtering

use std::ffi::OsStr;
use std::path::Path;

use crate::config::{default_suffix, BatchConfig};

/// Maps an input file name to its output file name: `<stem><suffix>.<ext>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingRule {
    /// Extension of inputs to pick up, without the dot
    extension: String,
    suffix: String,
}

impl NamingRule {
    pub fn new(extension: impl Into<String>, suffix: impl Into<String>) -> Self {
        let extension = extension.into();
        Self {
            extension: extension.trim_start_matches('.').to_string(),
            suffix: suffix.into(),
        }
    }

    pub fn from_config(config: &BatchConfig) -> Self {
        Self::new(&config.extension, &config.suffix)
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// True when `path` carries the input extension (case-insensitive)
    pub fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(OsStr::to_str)
            .is_some_and(|ext| ext.eq_ignore_ascii_case(&self.extension))
    }

    /// Output file name for an input stem, e.g. `deck` -> `deck_converted.html`
    pub fn output_name(&self, stem: &str) -> String {
        format!("{}{}.{}", stem, self.suffix, self.extension)
    }

    /// Output file name for an input path, `None` if it has no usable stem
    pub fn output_name_for(&self, input: &Path) -> Option<String> {
        input
            .file_stem()
            .and_then(OsStr::to_str)
            .filter(|stem| !stem.is_empty())
            .map(|stem| self.output_name(stem))
    }
}

impl Default for NamingRule {
    fn default() -> Self {
        Self::new("html", default_suffix())
    }
}
