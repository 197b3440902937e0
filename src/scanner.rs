//! Directory scanning and candidate selection
//!
//! Walks the target tree without following directory symlinks and applies the
//! selection rule to every regular file. The result is always sorted by path so
//! repeated dry-runs over an unchanged tree print the same list.

use crate::deleter::QUARANTINE_DIR;
use crate::error::{CleanError, Result};
use crate::logging::Logger;
use crate::patterns::PatternSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use walkdir::{DirEntry, WalkDir};

/// What makes a file eligible for deletion
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionRule {
    pub inclusion_patterns: Vec<String>,
    pub exclusion_patterns: Vec<String>,
    pub min_age_seconds: u64,
    /// 0 = unbounded
    pub max_size_bytes: u64,
}

/// A file selected by a scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFile {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub modified_at: SystemTime,
}

impl CandidateFile {
    pub fn size_human(&self) -> String {
        bytesize::to_string(self.size_bytes, true)
    }
}

/// Applies a [`SelectionRule`] to a directory tree
#[derive(Debug, Clone)]
pub struct Selector {
    rule: SelectionRule,
    include: PatternSet,
    exclude: PatternSet,
    now: SystemTime,
}

impl Selector {
    /// Compile the rule's patterns; ages are measured from the current time
    pub fn new(rule: SelectionRule) -> Result<Self> {
        let include = PatternSet::new(&rule.inclusion_patterns)?;
        let exclude = PatternSet::new(&rule.exclusion_patterns)?;
        Ok(Self {
            rule,
            include,
            exclude,
            now: SystemTime::now(),
        })
    }

    /// Measure file ages from `now` instead of the construction time
    pub fn with_reference_time(mut self, now: SystemTime) -> Self {
        self.now = now;
        self
    }

    pub fn rule(&self) -> &SelectionRule {
        &self.rule
    }

    /// Newest modification time a file may have and still be selected
    fn cutoff(&self) -> SystemTime {
        self.now
            .checked_sub(Duration::from_secs(self.rule.min_age_seconds))
            .unwrap_or(UNIX_EPOCH)
    }

    /// Decide a single file from its name, size and modification time
    pub fn selects(&self, name: &str, size_bytes: u64, modified: SystemTime) -> bool {
        // Exclusion wins over everything else
        if self.exclude.is_match(name) {
            return false;
        }

        // A size ceiling on its own is enough to make a file eligible
        let size_limited = self.rule.max_size_bytes > 0;
        if !self.include.is_match(name) && !size_limited {
            return false;
        }

        if modified > self.cutoff() {
            return false;
        }

        !(size_limited && size_bytes > self.rule.max_size_bytes)
    }

    /// Walk `root` and return every selected file, sorted by path.
    ///
    /// Unreadable entries are logged and skipped; only a missing root fails.
    pub fn scan(&self, root: &Path, logger: &dyn Logger) -> Result<Vec<CandidateFile>> {
        if !root.is_dir() {
            logger.error(&format!("Directory {} does not exist", root.display()));
            return Err(CleanError::NotFound {
                path: root.to_path_buf(),
            });
        }
        let root = absolute(root)?;

        let mut candidates = Vec::new();

        for entry in WalkDir::new(&root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_quarantine(e))
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    let location = err
                        .path()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| root.display().to_string());
                    logger.warn(&format!("Skipping {}: {}", location, err));
                    continue;
                }
            };

            if entry.file_type().is_dir() {
                continue;
            }

            // Follows file symlinks; a link to a directory shows up as a dir and is skipped
            let metadata = match fs::metadata(entry.path()) {
                Ok(m) => m,
                Err(err) => {
                    logger.warn(&format!("Skipping {}: {}", entry.path().display(), err));
                    continue;
                }
            };
            if !metadata.is_file() {
                continue;
            }

            let modified = match metadata.modified() {
                Ok(t) => t,
                Err(err) => {
                    logger.warn(&format!(
                        "Skipping {}: no modification time ({})",
                        entry.path().display(),
                        err
                    ));
                    continue;
                }
            };

            let name = entry.file_name().to_string_lossy();
            if self.selects(&name, metadata.len(), modified) {
                logger.debug(&format!("Selected {}", entry.path().display()));
                candidates.push(CandidateFile {
                    path: entry.path().to_path_buf(),
                    size_bytes: metadata.len(),
                    modified_at: modified,
                });
            }
        }

        candidates.sort_by(|a, b| a.path.cmp(&b.path));
        logger.info(&format!("Files to delete: {}", candidates.len()));

        Ok(candidates)
    }
}

/// Convenience wrapper: compile `rule` and scan `root` relative to now
pub fn scan(root: &Path, rule: &SelectionRule, logger: &dyn Logger) -> Result<Vec<CandidateFile>> {
    Selector::new(rule.clone())?.scan(root, logger)
}

fn is_quarantine(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_type().is_dir() && entry.file_name() == QUARANTINE_DIR
}

pub(crate) fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir()
        .map_err(|e| CleanError::io("Failed to resolve current directory", e))?;
    Ok(cwd.join(path))
}
