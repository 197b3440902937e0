//! Reversible per-file deletion
//!
//! Every target is first renamed to a sibling backup path. If that rename
//! fails nothing has been destroyed and the record says so. Only after the
//! rename succeeds is the backup disposed of, either removed right away or
//! moved into a quarantine directory that survives until an explicit purge.

use crate::error::{CleanError, Result};
use crate::logging::Logger;
use crate::scanner::CandidateFile;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Reserved suffix appended to a file name while it is being deleted
pub const BACKUP_SUFFIX: &str = ".bak";

/// Directory under the cleaned root that holds retained backups
pub const QUARANTINE_DIR: &str = ".file_cleaner_quarantine";

/// What happens to the backup copy once the rename succeeded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackupPolicy {
    /// Remove the backup immediately
    #[default]
    Discard,
    /// Keep the backup under [`QUARANTINE_DIR`] until `purge`
    Quarantine,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeletionOutcome {
    Succeeded,
    Failed(String),
}

/// Where the backup copy ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupState {
    /// The rename never happened
    Absent,
    /// Backup was removed from disk
    Removed,
    /// Backup still exists at `backup_path`
    Retained,
}

/// Result of one delete attempt. Never modified after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionRecord {
    pub original_path: PathBuf,
    pub backup_path: PathBuf,
    pub size_bytes: u64,
    pub outcome: DeletionOutcome,
    pub backup: BackupState,
}

impl DeletionRecord {
    pub fn is_success(&self) -> bool {
        self.outcome == DeletionOutcome::Succeeded
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match &self.outcome {
            DeletionOutcome::Failed(reason) => Some(reason.as_str()),
            DeletionOutcome::Succeeded => None,
        }
    }
}

/// Deletes candidates one at a time using rename-then-dispose
pub struct BackupDeleter<'a> {
    root: PathBuf,
    policy: BackupPolicy,
    logger: &'a dyn Logger,
}

impl<'a> BackupDeleter<'a> {
    /// `root` is the scanned directory; quarantined backups live beneath it
    pub fn new(root: impl Into<PathBuf>, policy: BackupPolicy, logger: &'a dyn Logger) -> Self {
        Self {
            root: root.into(),
            policy,
            logger,
        }
    }

    pub fn policy(&self) -> BackupPolicy {
        self.policy
    }

    /// Delete a single file. Never touches anything but the target and its backup.
    pub fn delete(&self, file: &CandidateFile) -> DeletionRecord {
        let original = file.path.clone();
        let backup = unique_path(&with_backup_suffix(&original));

        if let Err(source) = fs::rename(&original, &backup) {
            let permission = source.kind() == io::ErrorKind::PermissionDenied;
            let err = CleanError::Rename {
                path: original.clone(),
                source,
            };
            let message = format!("Failed to delete {}: {}", original.display(), err);
            if permission {
                self.logger.warn(&message);
            } else {
                self.logger.error(&message);
            }
            return DeletionRecord {
                original_path: original,
                backup_path: backup,
                size_bytes: file.size_bytes,
                outcome: DeletionOutcome::Failed(err.to_string()),
                backup: BackupState::Absent,
            };
        }

        let (backup_path, state) = match self.policy {
            BackupPolicy::Discard => self.discard(&backup),
            BackupPolicy::Quarantine => self.quarantine(&original, &backup),
        };

        self.logger.info(&format!("Deleted: {}", original.display()));

        DeletionRecord {
            original_path: original,
            backup_path,
            size_bytes: file.size_bytes,
            outcome: DeletionOutcome::Succeeded,
            backup: state,
        }
    }

    fn discard(&self, backup: &Path) -> (PathBuf, BackupState) {
        match fs::remove_file(backup) {
            Ok(()) => (backup.to_path_buf(), BackupState::Removed),
            Err(err) => {
                self.logger.warn(&format!(
                    "Could not remove backup {}: {}; rename it back to recover the file",
                    backup.display(),
                    err
                ));
                (backup.to_path_buf(), BackupState::Retained)
            }
        }
    }

    fn quarantine(&self, original: &Path, backup: &Path) -> (PathBuf, BackupState) {
        let relative = original
            .strip_prefix(&self.root)
            .ok()
            .map(Path::to_path_buf)
            .or_else(|| original.file_name().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("unnamed"));
        let target = unique_path(&self.root.join(QUARANTINE_DIR).join(relative));

        let moved = target
            .parent()
            .map_or(Ok(()), |dir| fs::create_dir_all(dir))
            .and_then(|()| fs::rename(backup, &target));

        match moved {
            Ok(()) => {
                self.logger
                    .debug(&format!("Quarantined {} at {}", original.display(), target.display()));
                (target, BackupState::Retained)
            }
            Err(err) => {
                self.logger.warn(&format!(
                    "Could not quarantine {}: {}; backup left at {}",
                    original.display(),
                    err,
                    backup.display()
                ));
                (backup.to_path_buf(), BackupState::Retained)
            }
        }
    }
}

/// `dir/name` → `dir/name.bak`
pub fn with_backup_suffix(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(BACKUP_SUFFIX);
    PathBuf::from(name)
}

/// First of `path`, `path.1`, `path.2`, … that does not exist yet
fn unique_path(path: &Path) -> PathBuf {
    if fs::symlink_metadata(path).is_err() {
        return path.to_path_buf();
    }
    (1u32..)
        .map(|n| {
            let mut candidate = path.as_os_str().to_owned();
            candidate.push(format!(".{}", n));
            PathBuf::from(candidate)
        })
        .find(|candidate| fs::symlink_metadata(candidate).is_err())
        .unwrap_or_else(|| path.to_path_buf())
}

/// Remove the quarantine directory under `root`; returns how many files it held
pub fn purge_quarantine(root: &Path, logger: &dyn Logger) -> Result<usize> {
    if !root.is_dir() {
        return Err(CleanError::NotFound {
            path: root.to_path_buf(),
        });
    }

    let quarantine = root.join(QUARANTINE_DIR);
    if !quarantine.is_dir() {
        logger.info(&format!("No quarantine in {}", root.display()));
        return Ok(0);
    }

    let count = WalkDir::new(&quarantine)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                logger.warn(&format!("Skipping unreadable quarantine entry: {}", err));
                None
            }
        })
        .filter(|e| !e.file_type().is_dir())
        .count();

    fs::remove_dir_all(&quarantine).map_err(|e| {
        CleanError::io(format!("Failed to purge {}", quarantine.display()), e)
    })?;

    logger.info(&format!(
        "Purged {} quarantined files from {}",
        count,
        quarantine.display()
    ));
    Ok(count)
}
