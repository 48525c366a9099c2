//! Exclude pattern matching for sync operations.
//!
//! A path is excluded when any pattern matches the whole path or any single
//! `/`-separated segment of it. `*` and `?` never cross a separator; `**`
//! does, and `{a,b}` is an alternation.

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use tracing::warn;

use crate::sync::path::normalize;

/// Pattern matching for file exclusion.
#[derive(Debug, Clone)]
pub struct ExcludePatterns {
    /// Compiled glob set for matching.
    glob_set: GlobSet,
    /// Raw pattern strings that compiled (for display/logging).
    patterns: Vec<String>,
}

impl Default for ExcludePatterns {
    fn default() -> Self {
        Self::new()
    }
}

impl ExcludePatterns {
    /// Create a new empty exclude pattern set.
    pub fn new() -> Self {
        Self {
            glob_set: GlobSet::empty(),
            patterns: Vec::new(),
        }
    }

    /// Create from a list of patterns.
    ///
    /// Patterns are normalized first. A malformed pattern is logged and left
    /// out of the set, so it can never match anything.
    pub fn from_patterns<S: AsRef<str>>(patterns: &[S]) -> Self {
        let mut builder = GlobSetBuilder::new();
        let mut pattern_list = Vec::new();

        for raw in patterns {
            let pattern = normalize(raw.as_ref());
            let glob = GlobBuilder::new(&pattern)
                .literal_separator(true)
                .backslash_escape(false)
                .build();
            match glob {
                Ok(glob) => {
                    builder.add(glob);
                    pattern_list.push(pattern);
                }
                Err(e) => warn!(pattern = %pattern, error = %e, "ignoring invalid exclude pattern"),
            }
        }

        let glob_set = builder.build().unwrap_or_else(|e| {
            warn!(error = %e, "failed to compile exclude patterns, excluding nothing");
            GlobSet::empty()
        });

        Self {
            glob_set,
            patterns: pattern_list,
        }
    }

    /// Check if a path should be excluded.
    pub fn is_excluded(&self, path: &str) -> bool {
        if self.glob_set.is_empty() {
            return false;
        }

        let path = normalize(path);
        if self.glob_set.is_match(path.as_str()) {
            return true;
        }

        path.split('/')
            .filter(|segment| !segment.is_empty())
            .any(|segment| self.glob_set.is_match(segment))
    }

    /// Get the list of patterns that compiled.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
