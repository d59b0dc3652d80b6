//! Path prefixing for a virtual root inside a container

use crate::{Error, Result};

const SEPARATOR: char = '/';

fn is_separator(c: char) -> bool {
    c == '/' || c == '\\'
}

/// Prepends a fixed namespace to logical paths and strips it back off.
///
/// The stored prefix never starts with a separator and always ends with
/// exactly one `/`. An empty prefix means paths pass through untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathPrefixer {
    prefix: Option<String>,
}

impl PathPrefixer {
    /// Create a prefixer, normalizing `prefix`
    pub fn new(prefix: &str) -> Self {
        let mut prefixer = Self::default();
        prefixer.set_prefix(prefix);
        prefixer
    }

    /// Replace the stored prefix
    pub fn set_prefix(&mut self, prefix: &str) {
        let trimmed = prefix.trim_matches(is_separator);
        self.prefix = if trimmed.is_empty() {
            None
        } else {
            Some(format!("{}{}", trimmed, SEPARATOR))
        };
    }

    /// The normalized prefix, or `""` when none is set
    pub fn prefix(&self) -> &str {
        self.prefix.as_deref().unwrap_or("")
    }

    /// Map a logical path to a blob name
    pub fn prefix_path(&self, path: &str) -> String {
        format!("{}{}", self.prefix(), path.trim_start_matches(is_separator))
    }

    /// Map a logical directory path to a listing prefix ending in `/`
    ///
    /// Returns the empty string for the root of an unprefixed adapter so
    /// that listings cover the whole container.
    pub fn prefix_directory_path(&self, path: &str) -> String {
        let prefixed = self.prefix_path(path.trim_end_matches(is_separator));
        if prefixed.is_empty() || prefixed.ends_with(SEPARATOR) {
            prefixed
        } else {
            format!("{}{}", prefixed, SEPARATOR)
        }
    }

    /// Map a blob name back to a logical path
    ///
    /// Fails with [`Error::InvalidPath`] when `full_path` lies outside the
    /// prefix instead of slicing past its end.
    pub fn strip_prefix(&self, full_path: &str) -> Result<String> {
        full_path
            .strip_prefix(self.prefix())
            .map(str::to_string)
            .ok_or_else(|| Error::InvalidPath {
                path: full_path.to_string(),
                reason: format!("not under prefix {:?}", self.prefix()),
            })
    }

    /// Map a listing prefix back to a logical directory path
    pub fn strip_directory_prefix(&self, full_path: &str) -> Result<String> {
        self.strip_prefix(full_path)
            .map(|path| path.trim_end_matches(is_separator).to_string())
    }
}
