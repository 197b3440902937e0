//! One cleaning session: scan, apply the mode policy, delete, write the restore script
//!
//! ```text
//! Idle → Scanning → DryRunReport                      (no mutation)
//!                 → AwaitingBatchConfirm → Completed  (one prompt for everything)
//!                 → PerFileConfirm       → Completed  (one prompt per file)
//! ```
//!
//! The candidate list is a snapshot taken while scanning; changes to the tree
//! after that point are not picked up.

use crate::deleter::{BackupDeleter, BackupPolicy, DeletionRecord};
use crate::error::Result;
use crate::logging::Logger;
use crate::prompt::Confirm;
use crate::restore;
use crate::scanner::{self, CandidateFile, SelectionRule, Selector};
use std::fmt;
use std::path::PathBuf;
use std::time::SystemTime;

/// How candidates are confirmed before deletion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Report only, never delete
    DryRun,
    /// One yes/no for the whole candidate set
    Batch,
    /// One yes/no per candidate
    PerFile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Scanning,
    DryRunReport,
    AwaitingBatchConfirm,
    PerFileConfirm,
    Completed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Scanning => "scanning",
            SessionState::DryRunReport => "dry-run report",
            SessionState::AwaitingBatchConfirm => "awaiting batch confirmation",
            SessionState::PerFileConfirm => "per-file confirmation",
            SessionState::Completed => "completed",
        };
        f.write_str(name)
    }
}

/// Everything a finished session produced
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub mode: Mode,
    /// Terminal state: `DryRunReport` or `Completed`
    pub state: SessionState,
    pub candidates: Vec<CandidateFile>,
    pub records: Vec<DeletionRecord>,
    pub restore_script: Option<PathBuf>,
    /// Set when the batch prompt was answered "no"
    pub cancelled: bool,
}

impl SessionReport {
    fn new(mode: Mode) -> Self {
        Self {
            mode,
            state: SessionState::Idle,
            candidates: Vec::new(),
            records: Vec::new(),
            restore_script: None,
            cancelled: false,
        }
    }

    pub fn deleted(&self) -> impl Iterator<Item = &DeletionRecord> {
        self.records.iter().filter(|r| r.is_success())
    }

    pub fn failed(&self) -> impl Iterator<Item = &DeletionRecord> {
        self.records.iter().filter(|r| !r.is_success())
    }

    pub fn deleted_count(&self) -> usize {
        self.deleted().count()
    }

    pub fn failed_count(&self) -> usize {
        self.failed().count()
    }

    pub fn bytes_freed(&self) -> u64 {
        self.deleted().map(|r| r.size_bytes).sum()
    }

    pub fn candidate_bytes(&self) -> u64 {
        self.candidates.iter().map(|c| c.size_bytes).sum()
    }
}

/// Drives one scan-confirm-delete pass over a directory
pub struct Session<'a> {
    root: PathBuf,
    selector: Selector,
    mode: Mode,
    policy: BackupPolicy,
    script_dir: Option<PathBuf>,
    logger: &'a dyn Logger,
    confirm: &'a mut dyn Confirm,
    state: SessionState,
}

impl<'a> Session<'a> {
    /// Fails only if the rule contains an invalid pattern
    pub fn new(
        root: impl Into<PathBuf>,
        rule: SelectionRule,
        mode: Mode,
        logger: &'a dyn Logger,
        confirm: &'a mut dyn Confirm,
    ) -> Result<Self> {
        Ok(Self {
            root: root.into(),
            selector: Selector::new(rule)?,
            mode,
            policy: BackupPolicy::default(),
            script_dir: None,
            logger,
            confirm,
            state: SessionState::Idle,
        })
    }

    pub fn with_backup_policy(mut self, policy: BackupPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Measure file ages from `now` instead of the current time
    pub fn with_reference_time(mut self, now: SystemTime) -> Self {
        self.selector = self.selector.with_reference_time(now);
        self
    }

    /// Write the restore script here instead of the scanned directory
    pub fn with_script_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.script_dir = Some(dir.into());
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn transition(&mut self, next: SessionState) {
        self.logger
            .debug(&format!("Session state: {} -> {}", self.state, next));
        self.state = next;
    }

    /// Run the session to its terminal state.
    ///
    /// A missing root, an invalid rule or a failure to write the restore script
    /// end the run with an error. Per-file failures only show up in the records.
    /// `state()` reports the terminal state afterwards.
    pub fn run(&mut self) -> Result<SessionReport> {
        let mut report = SessionReport::new(self.mode);

        self.transition(SessionState::Scanning);
        let candidates = self.selector.scan(&self.root, self.logger)?;
        let root = scanner::absolute(&self.root)?;

        if self.mode == Mode::DryRun {
            self.transition(SessionState::DryRunReport);
            self.logger.info("Dry-run mode: nothing will be deleted.");
            report.state = self.state;
            report.candidates = candidates;
            return Ok(report);
        }

        if candidates.is_empty() {
            self.logger.info("Nothing to delete.");
            self.transition(SessionState::Completed);
            report.state = self.state;
            return Ok(report);
        }

        let approved: Vec<CandidateFile> = match self.mode {
            Mode::DryRun => Vec::new(),
            Mode::Batch => {
                self.transition(SessionState::AwaitingBatchConfirm);
                let total: u64 = candidates.iter().map(|c| c.size_bytes).sum();
                let question = format!(
                    "Delete {} files ({})?",
                    candidates.len(),
                    bytesize::to_string(total, true)
                );
                if self.confirm.confirm(&question) {
                    candidates.clone()
                } else {
                    self.logger.info("Cancelled by user.");
                    report.cancelled = true;
                    Vec::new()
                }
            }
            Mode::PerFile => {
                self.transition(SessionState::PerFileConfirm);
                let mut approved = Vec::new();
                for candidate in &candidates {
                    let question = format!(
                        "Delete {} ({})?",
                        candidate.path.display(),
                        candidate.size_human()
                    );
                    if self.confirm.confirm(&question) {
                        approved.push(candidate.clone());
                    } else {
                        self.logger
                            .debug(&format!("Kept {}", candidate.path.display()));
                    }
                }
                approved
            }
        };

        let deleter = BackupDeleter::new(&root, self.policy, self.logger);
        report.records = approved.iter().map(|file| deleter.delete(file)).collect();
        report.candidates = candidates;

        self.transition(SessionState::Completed);
        report.state = self.state;

        if report.failed_count() > 0 {
            self.logger.warn(&format!(
                "{} of {} files could not be deleted",
                report.failed_count(),
                report.records.len()
            ));
        }

        if report.deleted_count() > 0 {
            let dir = self.script_dir.clone().unwrap_or(root);
            match restore::generate(&report.records, &dir, self.logger) {
                Ok(path) => report.restore_script = Some(path),
                Err(err) => {
                    self.logger
                        .error(&format!("Failed to write restore script: {}", err));
                    return Err(err);
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deleter::{BackupState, QUARANTINE_DIR};
    use crate::error::CleanError;
    use crate::logging::{LogLevel, MemoryLogger};
    use crate::prompt::ScriptedConfirm;
    use std::fs::{self, File};
    use std::path::Path;
    use std::time::Duration;
    use tempfile::TempDir;

    const DAY: u64 = 86_400;

    fn write_aged(dir: &Path, name: &str, age_days: u64) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, name).unwrap();
        let mtime = SystemTime::now() - Duration::from_secs(age_days * DAY);
        File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(mtime)
            .unwrap();
        path
    }

    fn log_rule() -> SelectionRule {
        SelectionRule {
            inclusion_patterns: vec!["*.log".to_string()],
            exclusion_patterns: Vec::new(),
            min_age_seconds: 7 * DAY,
            max_size_bytes: 0,
        }
    }

    fn listing(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    fn scripts(dir: &Path) -> Vec<String> {
        listing(dir)
            .into_iter()
            .filter(|n| n.starts_with("restore_"))
            .collect()
    }

    #[test]
    fn test_new_session_is_idle() {
        let logger = MemoryLogger::new();
        let mut confirm = ScriptedConfirm::default();
        let session = Session::new("/tmp", log_rule(), Mode::DryRun, &logger, &mut confirm).unwrap();
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn test_dry_run_never_mutates() {
        let dir = TempDir::new().unwrap();
        write_aged(dir.path(), "a.log", 40);
        write_aged(dir.path(), "b.log", 30);
        let before = listing(dir.path());

        let logger = MemoryLogger::new();
        let mut confirm = ScriptedConfirm::new([true, true]);
        let first = Session::new(dir.path(), log_rule(), Mode::DryRun, &logger, &mut confirm)
            .unwrap()
            .run()
            .unwrap();
        let mut confirm = ScriptedConfirm::new([true, true]);
        let second = Session::new(dir.path(), log_rule(), Mode::DryRun, &logger, &mut confirm)
            .unwrap()
            .run()
            .unwrap();

        assert_eq!(first.state, SessionState::DryRunReport);
        assert_eq!(first.candidates.len(), 2);
        assert_eq!(first.candidates, second.candidates);
        assert!(first.records.is_empty());
        assert!(first.restore_script.is_none());
        assert!(confirm.asked().is_empty());
        assert_eq!(listing(dir.path()), before);
    }

    #[test]
    fn test_batch_declined_deletes_nothing() {
        let dir = TempDir::new().unwrap();
        let file = write_aged(dir.path(), "a.log", 40);

        let logger = MemoryLogger::new();
        let mut confirm = ScriptedConfirm::new([false]);
        let report = Session::new(dir.path(), log_rule(), Mode::Batch, &logger, &mut confirm)
            .unwrap()
            .run()
            .unwrap();

        assert_eq!(report.state, SessionState::Completed);
        assert!(report.cancelled);
        assert!(report.records.is_empty());
        assert!(report.restore_script.is_none());
        assert!(file.exists());
        assert!(scripts(dir.path()).is_empty());
        assert_eq!(confirm.asked().len(), 1);
        assert!(confirm.asked()[0].starts_with("Delete 1 files"));
        assert!(logger.contains(LogLevel::Info, "Cancelled"));
    }

    #[test]
    fn test_batch_accepted_deletes_all_and_writes_script() {
        let dir = TempDir::new().unwrap();
        let a = write_aged(dir.path(), "a.log", 40);
        let b = write_aged(dir.path(), "b.log", 40);
        let keep = write_aged(dir.path(), "keep.txt", 40);

        let logger = MemoryLogger::new();
        let mut confirm = ScriptedConfirm::new([true]);
        let report = Session::new(dir.path(), log_rule(), Mode::Batch, &logger, &mut confirm)
            .unwrap()
            .run()
            .unwrap();

        assert_eq!(report.deleted_count(), 2);
        assert_eq!(report.failed_count(), 0);
        assert_eq!(report.bytes_freed(), 10);
        assert!(!a.exists() && !b.exists());
        assert!(keep.exists());

        let script = report.restore_script.expect("restore script");
        assert_eq!(script.parent().unwrap(), dir.path());
        let content = fs::read_to_string(&script).unwrap();
        let b_pos = content.find("b.log.bak").unwrap();
        let a_pos = content.find("a.log.bak").unwrap();
        assert!(b_pos < a_pos, "restore order must reverse deletion order");
    }

    #[test]
    fn test_per_file_decline_does_not_abort() {
        let dir = TempDir::new().unwrap();
        let a = write_aged(dir.path(), "a.log", 40);
        let b = write_aged(dir.path(), "b.log", 40);
        let c = write_aged(dir.path(), "c.log", 40);

        let logger = MemoryLogger::new();
        let mut confirm = ScriptedConfirm::new([false, true, false]);
        let report = Session::new(dir.path(), log_rule(), Mode::PerFile, &logger, &mut confirm)
            .unwrap()
            .run()
            .unwrap();

        assert_eq!(confirm.asked().len(), 3);
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].original_path, b);
        assert!(a.exists() && !b.exists() && c.exists());
        assert!(report.restore_script.is_some());
    }

    #[test]
    fn test_per_file_all_declined_writes_no_script() {
        let dir = TempDir::new().unwrap();
        write_aged(dir.path(), "a.log", 40);

        let logger = MemoryLogger::new();
        let mut confirm = ScriptedConfirm::new([false]);
        let report = Session::new(dir.path(), log_rule(), Mode::PerFile, &logger, &mut confirm)
            .unwrap()
            .run()
            .unwrap();

        assert_eq!(report.state, SessionState::Completed);
        assert!(report.records.is_empty());
        assert!(report.restore_script.is_none());
        assert!(scripts(dir.path()).is_empty());
    }

    #[test]
    fn test_nothing_to_delete_skips_prompt() {
        let dir = TempDir::new().unwrap();
        write_aged(dir.path(), "fresh.log", 1);

        let logger = MemoryLogger::new();
        let mut confirm = ScriptedConfirm::new([true]);
        let report = Session::new(dir.path(), log_rule(), Mode::Batch, &logger, &mut confirm)
            .unwrap()
            .run()
            .unwrap();

        assert_eq!(report.state, SessionState::Completed);
        assert!(report.candidates.is_empty());
        assert!(confirm.asked().is_empty());
        assert!(logger.contains(LogLevel::Info, "Nothing to delete"));
    }

    #[test]
    fn test_missing_root_fails_without_prompt() {
        let dir = TempDir::new().unwrap();
        let logger = MemoryLogger::new();
        let mut confirm = ScriptedConfirm::new([true]);
        let err = Session::new(
            dir.path().join("gone"),
            log_rule(),
            Mode::Batch,
            &logger,
            &mut confirm,
        )
        .unwrap()
        .run()
        .unwrap_err();

        assert!(matches!(err, CleanError::NotFound { .. }));
        assert!(confirm.asked().is_empty());
    }

    #[test]
    fn test_quarantine_policy_and_script_dir() {
        let dir = TempDir::new().unwrap();
        let scripts_dir = TempDir::new().unwrap();
        write_aged(dir.path(), "a.log", 40);

        let logger = MemoryLogger::new();
        let mut confirm = ScriptedConfirm::new([true]);
        let report = Session::new(dir.path(), log_rule(), Mode::Batch, &logger, &mut confirm)
            .unwrap()
            .with_backup_policy(BackupPolicy::Quarantine)
            .with_script_dir(scripts_dir.path())
            .run()
            .unwrap();

        let record = &report.records[0];
        assert_eq!(record.backup, BackupState::Retained);
        assert!(record.backup_path.starts_with(dir.path().join(QUARANTINE_DIR)));
        assert!(record.backup_path.exists());
        assert_eq!(
            report.restore_script.unwrap().parent().unwrap(),
            scripts_dir.path()
        );
    }

    #[test]
    fn test_reference_time_makes_fresh_files_old() {
        let dir = TempDir::new().unwrap();
        write_aged(dir.path(), "fresh.log", 0);

        let logger = MemoryLogger::new();
        let mut confirm = ScriptedConfirm::default();
        let report = Session::new(dir.path(), log_rule(), Mode::DryRun, &logger, &mut confirm)
            .unwrap()
            .with_reference_time(SystemTime::now() + Duration::from_secs(8 * DAY))
            .run()
            .unwrap();

        assert_eq!(report.candidates.len(), 1);
    }

    #[test]
    fn test_script_write_failure_is_error() {
        let dir = TempDir::new().unwrap();
        write_aged(dir.path(), "a.log", 40);

        let logger = MemoryLogger::new();
        let mut confirm = ScriptedConfirm::new([true]);
        let err = Session::new(dir.path(), log_rule(), Mode::Batch, &logger, &mut confirm)
            .unwrap()
            .with_script_dir(dir.path().join("no-such-dir"))
            .run()
            .unwrap_err();

        assert!(matches!(err, CleanError::Io { .. }));
        assert!(logger.contains(LogLevel::Error, "restore script"));
    }

    fn state_changes(logger: &MemoryLogger) -> Vec<String> {
        logger
            .messages(LogLevel::Debug)
            .into_iter()
            .filter_map(|m| m.strip_prefix("Session state: ").map(str::to_string))
            .collect()
    }

    #[test]
    fn test_batch_state_sequence() {
        let dir = TempDir::new().unwrap();
        write_aged(dir.path(), "a.log", 40);

        let logger = MemoryLogger::new();
        let mut confirm = ScriptedConfirm::new([true]);
        let mut session =
            Session::new(dir.path(), log_rule(), Mode::Batch, &logger, &mut confirm).unwrap();
        let report = session.run().unwrap();

        assert_eq!(session.state(), SessionState::Completed);
        assert_eq!(report.state, session.state());
        assert_eq!(
            state_changes(&logger),
            vec![
                "idle -> scanning",
                "scanning -> awaiting batch confirmation",
                "awaiting batch confirmation -> completed",
            ]
        );
    }

    #[test]
    fn test_per_file_and_dry_run_state_sequence() {
        let dir = TempDir::new().unwrap();
        write_aged(dir.path(), "a.log", 40);

        let logger = MemoryLogger::new();
        let mut confirm = ScriptedConfirm::new([false]);
        let mut session =
            Session::new(dir.path(), log_rule(), Mode::PerFile, &logger, &mut confirm).unwrap();
        session.run().unwrap();
        assert_eq!(session.state(), SessionState::Completed);
        assert_eq!(
            state_changes(&logger),
            vec![
                "idle -> scanning",
                "scanning -> per-file confirmation",
                "per-file confirmation -> completed",
            ]
        );

        let logger = MemoryLogger::new();
        let mut confirm = ScriptedConfirm::default();
        let mut session =
            Session::new(dir.path(), log_rule(), Mode::DryRun, &logger, &mut confirm).unwrap();
        session.run().unwrap();
        assert_eq!(session.state(), SessionState::DryRunReport);
        assert_eq!(
            state_changes(&logger),
            vec!["idle -> scanning", "scanning -> dry-run report"]
        );
    }

    /// Approves everything, removing `victim` from disk when asked about it
    struct VanishingConfirm {
        victim: PathBuf,
    }

    impl Confirm for VanishingConfirm {
        fn confirm(&mut self, question: &str) -> bool {
            if question.contains(&*self.victim.to_string_lossy()) {
                fs::remove_file(&self.victim).unwrap();
            }
            true
        }
    }

    #[test]
    fn test_file_vanishing_mid_session_does_not_abort() {
        let dir = TempDir::new().unwrap();
        let a = write_aged(dir.path(), "a.log", 40);
        let b = write_aged(dir.path(), "b.log", 40);
        let c = write_aged(dir.path(), "c.log", 40);

        let logger = MemoryLogger::new();
        let mut confirm = VanishingConfirm { victim: b.clone() };
        let report = Session::new(dir.path(), log_rule(), Mode::PerFile, &logger, &mut confirm)
            .unwrap()
            .run()
            .unwrap();

        assert_eq!(report.state, SessionState::Completed);
        assert_eq!(report.records.len(), 3);
        assert_eq!(report.deleted_count(), 2);
        assert_eq!(report.failed_count(), 1);

        let failed: Vec<_> = report.failed().collect();
        assert_eq!(failed[0].original_path, b);
        assert_eq!(failed[0].backup, BackupState::Absent);
        assert!(failed[0].failure_reason().is_some());
        assert!(!a.exists() && !c.exists());

        let content = fs::read_to_string(report.restore_script.unwrap()).unwrap();
        assert!(content.contains("a.log.bak"));
        assert!(content.contains("c.log.bak"));
        assert!(!content.contains("b.log"));
    }
}
