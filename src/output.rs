use crate::deleter::{BackupState, QUARANTINE_DIR};
use crate::session::{Mode, SessionReport, SessionState};
use chrono::{DateTime, Local};
use colored::*;
use std::path::Path;

/// Output verbosity mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Quiet,   // Only errors
    Normal,  // Standard output
    Verbose, // Adds sizes and modification times
}

impl OutputMode {
    pub fn from_flags(verbose: u8, quiet: bool) -> Self {
        if quiet {
            OutputMode::Quiet
        } else if verbose > 0 {
            OutputMode::Verbose
        } else {
            OutputMode::Normal
        }
    }
}

/// Print whatever the session produced
pub fn print_report(report: &SessionReport, mode: OutputMode) {
    if mode == OutputMode::Quiet {
        return;
    }
    let lines = if report.state == SessionState::DryRunReport {
        render_dry_run(report, mode)
    } else {
        render_summary(report, mode)
    };
    for line in lines {
        println!("{}", line);
    }
}

/// One line per candidate plus a total
pub fn render_dry_run(report: &SessionReport, mode: OutputMode) -> Vec<String> {
    let mut lines = Vec::with_capacity(report.candidates.len() + 2);

    for candidate in &report.candidates {
        let mut line = format!("{} -> {}", "DRY-RUN".yellow(), candidate.path.display());
        if mode == OutputMode::Verbose {
            let modified: DateTime<Local> = candidate.modified_at.into();
            line.push_str(&format!(
                "  {}  {}",
                candidate.size_human().cyan(),
                modified.format("%Y-%m-%d %H:%M").to_string().dimmed()
            ));
        }
        lines.push(line);
    }

    lines.push(String::new());
    lines.push(format!(
        "[DRY RUN] {} files would be deleted ({})",
        report.candidates.len().to_string().bold(),
        bytesize::to_string(report.candidate_bytes(), true).cyan()
    ));
    lines
}

/// Deleted and failed files, totals, and where the restore script went
pub fn render_summary(report: &SessionReport, mode: OutputMode) -> Vec<String> {
    let mut lines = Vec::new();

    if report.cancelled {
        lines.push("Cancelled.".dimmed().to_string());
        return lines;
    }
    if report.candidates.is_empty() {
        lines.push("Nothing to clean.".green().to_string());
        return lines;
    }
    if report.records.is_empty() {
        lines.push("No files were deleted.".dimmed().to_string());
        return lines;
    }

    for record in &report.records {
        match record.failure_reason() {
            None => {
                let mut line = format!("{}: {}", "Deleted".green(), record.original_path.display());
                if mode == OutputMode::Verbose {
                    line.push_str(&format!(
                        "  {}",
                        bytesize::to_string(record.size_bytes, true).cyan()
                    ));
                }
                lines.push(line);
            }
            Some(reason) => lines.push(format!(
                "{}: {} ({})",
                "Failed".red(),
                record.original_path.display(),
                reason
            )),
        }
    }

    lines.push(String::new());
    let freed = bytesize::to_string(report.bytes_freed(), true);
    if report.failed_count() > 0 {
        lines.push(format!(
            "[WARNING] Cleanup complete: {} files deleted ({}), {} errors",
            report.deleted_count().to_string().green(),
            freed.green(),
            report.failed_count().to_string().red()
        ));
    } else {
        lines.push(format!(
            "[OK] Cleanup complete: {} files deleted, {} freed",
            report.deleted_count().to_string().green(),
            freed.green()
        ));
    }

    if let Some(script) = &report.restore_script {
        lines.push(format!("Restore script: {}", script.display()).dimmed().to_string());
    }

    let quarantined = report
        .deleted()
        .filter(|r| r.backup == BackupState::Retained)
        .any(|r| r.backup_path.components().any(|c| c.as_os_str() == QUARANTINE_DIR));
    if quarantined {
        lines.push(
            format!(
                "Backups kept in {}; run `file-cleaner purge` on this directory to free the space",
                QUARANTINE_DIR
            )
            .dimmed()
            .to_string(),
        );
    }

    lines
}

/// Result of `purge`
pub fn print_purge(count: usize, root: &Path, mode: OutputMode) {
    if mode == OutputMode::Quiet {
        return;
    }
    if count == 0 {
        println!("{}", "Nothing to purge.".dimmed());
    } else {
        println!(
            "[OK] Purged {} backups from {}",
            count.to_string().green(),
            root.display()
        );
    }
}

/// Short label used in log lines
pub fn mode_label(mode: Mode) -> &'static str {
    match mode {
        Mode::DryRun => "dry-run",
        Mode::Batch => "batch confirm",
        Mode::PerFile => "per-file confirm",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deleter::{DeletionOutcome, DeletionRecord};
    use crate::scanner::CandidateFile;
    use std::path::PathBuf;
    use std::time::SystemTime;

    fn candidate(path: &str, size: u64) -> CandidateFile {
        CandidateFile {
            path: PathBuf::from(path),
            size_bytes: size,
            modified_at: SystemTime::now(),
        }
    }

    fn record(path: &str, size: u64, outcome: DeletionOutcome, backup: &str) -> DeletionRecord {
        DeletionRecord {
            original_path: PathBuf::from(path),
            backup_path: PathBuf::from(backup),
            size_bytes: size,
            backup: if outcome == DeletionOutcome::Succeeded {
                BackupState::Removed
            } else {
                BackupState::Absent
            },
            outcome,
        }
    }

    fn report(state: SessionState, mode: Mode) -> SessionReport {
        SessionReport {
            mode,
            state,
            candidates: vec![candidate("/d/a.log", 1024), candidate("/d/b.log", 1024)],
            records: Vec::new(),
            restore_script: None,
            cancelled: false,
        }
    }

    #[test]
    fn test_output_mode_from_flags() {
        assert_eq!(OutputMode::from_flags(0, true), OutputMode::Quiet);
        assert_eq!(OutputMode::from_flags(0, false), OutputMode::Normal);
        assert_eq!(OutputMode::from_flags(2, false), OutputMode::Verbose);
    }

    #[test]
    fn test_dry_run_lists_every_candidate() {
        colored::control::set_override(false);
        let lines = render_dry_run(
            &report(SessionState::DryRunReport, Mode::DryRun),
            OutputMode::Normal,
        );
        assert_eq!(lines[0], "DRY-RUN -> /d/a.log");
        assert_eq!(lines[1], "DRY-RUN -> /d/b.log");
        assert!(lines.last().unwrap().contains("2 files would be deleted"));
    }

    #[test]
    fn test_summary_counts_failures() {
        colored::control::set_override(false);
        let mut r = report(SessionState::Completed, Mode::Batch);
        r.records = vec![
            record("/d/a.log", 1024, DeletionOutcome::Succeeded, "/d/a.log.bak"),
            record(
                "/d/b.log",
                1024,
                DeletionOutcome::Failed("denied".to_string()),
                "/d/b.log.bak",
            ),
        ];
        r.restore_script = Some(PathBuf::from("/d/restore_20240101_000000.sh"));

        let lines = render_summary(&r, OutputMode::Normal);
        assert_eq!(lines[0], "Deleted: /d/a.log");
        assert_eq!(lines[1], "Failed: /d/b.log (denied)");
        assert!(lines.iter().any(|l| l.contains("1 files deleted") && l.contains("1 errors")));
        assert!(lines.iter().any(|l| l.contains("restore_20240101_000000.sh")));
        assert!(!lines.iter().any(|l| l.contains("purge")));
    }

    #[test]
    fn test_summary_mentions_quarantine() {
        colored::control::set_override(false);
        let mut r = report(SessionState::Completed, Mode::PerFile);
        let mut kept = record(
            "/d/a.log",
            10,
            DeletionOutcome::Succeeded,
            "/d/.file_cleaner_quarantine/a.log",
        );
        kept.backup = BackupState::Retained;
        r.records = vec![kept];

        let lines = render_summary(&r, OutputMode::Normal);
        assert!(lines.iter().any(|l| l.contains("purge")));
    }

    #[test]
    fn test_summary_cancelled() {
        colored::control::set_override(false);
        let mut r = report(SessionState::Completed, Mode::Batch);
        r.cancelled = true;
        assert_eq!(render_summary(&r, OutputMode::Normal), vec!["Cancelled.".to_string()]);
    }

    #[test]
    fn test_mode_label() {
        assert_eq!(mode_label(Mode::DryRun), "dry-run");
        assert_eq!(mode_label(Mode::PerFile), "per-file confirm");
    }
}
