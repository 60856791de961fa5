//! Glob-based file exclusion
//!
//! Decides whether a workspace path should be excluded from analysis based on
//! a list of user-supplied glob patterns (globstar and brace alternation
//! supported).

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

/// Compiled exclusion patterns for a scan run.
///
/// Paths are matched with forward-slash separators: backslashes in the input
/// path are normalized to `/` before matching, so Windows-style paths match
/// the same patterns as POSIX ones. Matching is case-sensitive. `*` and `?`
/// never cross a `/` boundary; `**` does.
pub struct FileFilter {
    set: GlobSet,
    pattern_count: usize,
}

impl FileFilter {
    /// Compile a list of exclusion patterns.
    ///
    /// Blank patterns are ignored. Patterns that fail to compile are skipped
    /// with a warning and can never match anything.
    pub fn new(patterns: &[String]) -> Self {
        let mut builder = GlobSetBuilder::new();
        let mut pattern_count = 0;
        for pattern in patterns {
            if pattern.trim().is_empty() {
                continue;
            }
            match GlobBuilder::new(pattern).literal_separator(true).build() {
                Ok(glob) => {
                    builder.add(glob);
                    pattern_count += 1;
                }
                Err(e) => {
                    log::warn!("skipping invalid exclusion pattern '{}': {}", pattern, e);
                }
            }
        }
        let set = builder.build().unwrap_or_else(|e| {
            log::warn!("failed to compile exclusion patterns: {}", e);
            GlobSet::empty()
        });
        Self { set, pattern_count }
    }

    /// True when the path matches at least one compiled pattern.
    pub fn is_excluded(&self, path: &str) -> bool {
        if path.is_empty() || self.pattern_count == 0 {
            return false;
        }
        self.set.is_match(normalize_separators(path))
    }

    /// Number of patterns that compiled successfully.
    pub fn pattern_count(&self) -> usize {
        self.pattern_count
    }
}

/// Shell-style exclusion check: true iff any pattern glob-matches the path.
///
/// An empty path or an empty pattern list is never excluded. See
/// [`FileFilter`] for the matching semantics.
pub fn should_exclude_file(path: &str, patterns: &[String]) -> bool {
    FileFilter::new(patterns).is_excluded(path)
}

fn normalize_separators(path: &str) -> String {
    path.replace('\\', "/")
}


// Include the test module
#[cfg(test)]
#[path = "exclude.test.rs"]
mod exclude_test;
