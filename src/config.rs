//! Selection configuration
//!
//! Built-in defaults, optionally overridden by a JSON file and then by explicit
//! command line flags. The result is turned into a [`SelectionRule`] before a
//! scan starts.

use crate::error::{CleanError, Result};
use crate::scanner::SelectionRule;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Patterns cleaned when nothing else is configured
pub const DEFAULT_PATTERNS: &[&str] = &[
    "*~",
    "*.tmp",
    "*.temp",
    "*.log",
    "*.bak",
    "*.old",
    "Thumbs.db",
    ".DS_Store",
    ".thumb",
];

pub const DEFAULT_MIN_DAYS: u64 = 7;

/// 0 means no size ceiling
pub const DEFAULT_MAX_SIZE_KB: f64 = 0.0;

const SECONDS_PER_DAY: u64 = 86_400;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub patterns: Vec<String>,
    pub exclude: Vec<String>,
    pub min_days: u64,
    pub max_size_kb: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            patterns: DEFAULT_PATTERNS.iter().map(|p| p.to_string()).collect(),
            exclude: Vec::new(),
            min_days: DEFAULT_MIN_DAYS,
            max_size_kb: DEFAULT_MAX_SIZE_KB,
        }
    }
}

impl Config {
    /// Load a JSON config file. Missing fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| CleanError::io(format!("Failed to read config {}", path.display()), e))?;
        Self::from_json(&content, path)
    }

    /// Parse config text; `origin` is only used in error messages
    pub fn from_json(content: &str, origin: &Path) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| CleanError::ConfigParse {
            path: origin.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Apply flags given explicitly on the command line
    pub fn apply_cli_overrides(&mut self, min_days: Option<u64>, max_size_kb: Option<f64>) {
        if let Some(days) = min_days {
            self.min_days = days;
        }
        if let Some(size) = max_size_kb {
            self.max_size_kb = size;
        }
    }

    /// Add `*.<ext>` patterns from a comma separated list such as `"py,txt"`
    pub fn add_extensions(&mut self, list: &str) {
        for ext in list.split(',') {
            let ext = ext.trim().trim_start_matches('.');
            if ext.is_empty() {
                continue;
            }
            let pattern = format!("*.{}", ext);
            if !self.patterns.contains(&pattern) {
                self.patterns.push(pattern);
            }
        }
    }

    pub fn add_exclusions<I, S>(&mut self, patterns: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude.extend(patterns.into_iter().map(Into::into));
    }

    /// Convert days and kilobytes into the rule the scanner works with
    pub fn to_rule(&self) -> Result<SelectionRule> {
        if !self.max_size_kb.is_finite() || self.max_size_kb < 0.0 {
            return Err(CleanError::InvalidConfig(format!(
                "max_size_kb must be a non-negative number, got {}",
                self.max_size_kb
            )));
        }

        // Round down so the ceiling never admits a larger file
        let max_size_bytes = (self.max_size_kb * 1024.0).floor() as u64;
        if self.max_size_kb > 0.0 && max_size_bytes == 0 {
            return Err(CleanError::InvalidConfig(format!(
                "max_size_kb {} is below one byte",
                self.max_size_kb
            )));
        }

        Ok(SelectionRule {
            inclusion_patterns: self.patterns.clone(),
            exclusion_patterns: self.exclude.clone(),
            min_age_seconds: self.min_days.saturating_mul(SECONDS_PER_DAY),
            max_size_bytes,
        })
    }
}
