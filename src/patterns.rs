//! Glob matching of file names against inclusion and exclusion rules
//!
//! Supports `*`, `?` and `[...]` character classes. Matching is case-sensitive
//! except on Windows, where file names are compared case-insensitively like
//! the filesystem does.

use crate::error::{CleanError, Result};
use globset::{Glob, GlobBuilder, GlobSet, GlobSetBuilder};

/// Compiled set of glob patterns
#[derive(Debug, Clone)]
pub struct PatternSet {
    glob_set: GlobSet,
    patterns: Vec<String>,
}

impl Default for PatternSet {
    fn default() -> Self {
        Self::empty()
    }
}

impl PatternSet {
    /// A set that matches nothing
    pub fn empty() -> Self {
        Self {
            glob_set: GlobSet::empty(),
            patterns: Vec::new(),
        }
    }

    /// Compile a list of patterns, failing on the first invalid glob
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        let mut pattern_list = Vec::with_capacity(patterns.len());

        for pattern in patterns {
            let pattern = pattern.as_ref();
            let glob = compile(pattern).map_err(|e| CleanError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })?;
            builder.add(glob);
            pattern_list.push(pattern.to_string());
        }

        let glob_set = builder.build().map_err(|e| CleanError::InvalidPattern {
            pattern: pattern_list.join(", "),
            reason: e.to_string(),
        })?;

        Ok(Self {
            glob_set,
            patterns: pattern_list,
        })
    }

    /// Check a bare file name (not a path) against the set
    pub fn is_match(&self, name: &str) -> bool {
        !self.patterns.is_empty() && self.glob_set.is_match(name)
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

fn compile(pattern: &str) -> std::result::Result<Glob, globset::Error> {
    GlobBuilder::new(pattern)
        .case_insensitive(cfg!(windows))
        .build()
}

/// True if `name` matches any of `patterns`.
///
/// Invalid patterns never match; an empty pattern list matches nothing.
pub fn matches<S: AsRef<str>>(name: &str, patterns: &[S]) -> bool {
    patterns.iter().any(|pattern| {
        compile(pattern.as_ref())
            .map(|glob| glob.compile_matcher().is_match(name))
            .unwrap_or(false)
    })
}
