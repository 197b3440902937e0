//! Restore script generation
//!
//! After a session deletes anything, a shell script is written next to the
//! cleaned files. Running it moves every backup copy back to its original
//! path, undoing the deletions in reverse order. It can only bring back
//! backups that still exist on disk (see [`crate::deleter::BackupPolicy`]).

use crate::deleter::DeletionRecord;
use crate::error::{CleanError, Result};
use crate::logging::Logger;
use chrono::{DateTime, Local};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Script dialect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptFlavor {
    /// `/bin/sh` script
    Posix,
    /// Windows batch file
    Batch,
}

impl ScriptFlavor {
    /// The flavor that runs natively on this host
    pub fn host() -> Self {
        if cfg!(windows) {
            ScriptFlavor::Batch
        } else {
            ScriptFlavor::Posix
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ScriptFlavor::Posix => "sh",
            ScriptFlavor::Batch => "bat",
        }
    }

    fn line_ending(&self) -> &'static str {
        match self {
            ScriptFlavor::Posix => "\n",
            ScriptFlavor::Batch => "\r\n",
        }
    }
}

/// Write a restore script for the host platform into `output_dir`
pub fn generate(records: &[DeletionRecord], output_dir: &Path, logger: &dyn Logger) -> Result<PathBuf> {
    generate_with(records, output_dir, ScriptFlavor::host(), Local::now(), logger)
}

/// Write a restore script with an explicit flavor and timestamp.
///
/// Only succeeded records are included. Fails with
/// [`CleanError::NothingToRestore`] when there are none.
pub fn generate_with(
    records: &[DeletionRecord],
    output_dir: &Path,
    flavor: ScriptFlavor,
    timestamp: DateTime<Local>,
    logger: &dyn Logger,
) -> Result<PathBuf> {
    if !records.iter().any(DeletionRecord::is_success) {
        return Err(CleanError::NothingToRestore);
    }

    if flavor == ScriptFlavor::Batch {
        for record in records.iter().filter(|r| r.is_success()) {
            if record.original_path.to_str().is_none() || record.backup_path.to_str().is_none() {
                logger.warn(&format!(
                    "Path is not valid Unicode, restore line may be wrong: {}",
                    record.original_path.display()
                ));
            }
        }
    }

    let content = render(records, flavor);
    let stem = format!("restore_{}", timestamp.format("%Y%m%d_%H%M%S"));
    let (script_path, mut file) = create_unique(output_dir, &stem, flavor.extension())?;

    file.write_all(&content)
        .map_err(|e| CleanError::io(format!("Failed to write {}", script_path.display()), e))?;
    drop(file);

    make_executable(&script_path)?;

    logger.info(&format!("Restore script: {}", script_path.display()));
    Ok(script_path)
}

/// Script bytes: one reversal per succeeded record, newest deletion first.
///
/// POSIX scripts carry paths byte for byte, so names that are not valid
/// UTF-8 still point at the right file.
pub fn render(records: &[DeletionRecord], flavor: ScriptFlavor) -> Vec<u8> {
    let mut lines: Vec<Vec<u8>> = Vec::new();

    match flavor {
        ScriptFlavor::Posix => {
            lines.push(b"#!/bin/sh".to_vec());
            lines.push(b"# Generated by file-cleaner: moves deleted files back into place".to_vec());
        }
        ScriptFlavor::Batch => {
            lines.push(b"@echo off".to_vec());
            lines.push(b"rem Generated by file-cleaner: moves deleted files back into place".to_vec());
        }
    }

    for record in records.iter().rev().filter(|r| r.is_success()) {
        let original = &record.original_path;
        let parent = original.parent().unwrap_or_else(|| Path::new("."));

        match flavor {
            ScriptFlavor::Posix => {
                let mut line = b"mkdir -p ".to_vec();
                line.extend(sh_quote(parent));
                line.extend_from_slice(b" && mv ");
                line.extend(sh_quote(&record.backup_path));
                line.push(b' ');
                line.extend(sh_quote(original));
                lines.push(line);
            }
            ScriptFlavor::Batch => {
                lines.push(
                    format!(
                        "if not exist {} mkdir {}",
                        bat_quote(parent),
                        bat_quote(parent)
                    )
                    .into_bytes(),
                );
                lines.push(
                    format!(
                        "move /y {} {}",
                        bat_quote(&record.backup_path),
                        bat_quote(original)
                    )
                    .into_bytes(),
                );
            }
        }
    }

    let eol = flavor.line_ending().as_bytes();
    let mut script = lines.join(eol);
    script.extend_from_slice(eol);
    script
}

#[cfg(unix)]
fn path_bytes(path: &Path) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;

    path.as_os_str().as_bytes().to_vec()
}

#[cfg(not(unix))]
fn path_bytes(path: &Path) -> Vec<u8> {
    path.to_string_lossy().into_owned().into_bytes()
}

/// Single-quote a path for `/bin/sh`
fn sh_quote(path: &Path) -> Vec<u8> {
    let mut quoted = vec![b'\''];
    for byte in path_bytes(path) {
        if byte == b'\'' {
            quoted.extend_from_slice(b"'\\''");
        } else {
            quoted.push(byte);
        }
    }
    quoted.push(b'\'');
    quoted
}

/// Double-quote a path for cmd.exe; `%` must be doubled inside batch files
fn bat_quote(path: &Path) -> String {
    format!("\"{}\"", path.to_string_lossy().replace('%', "%%"))
}

/// Create `<stem>.<ext>`, or `<stem>_1.<ext>`, … if a script already exists
fn create_unique(dir: &Path, stem: &str, ext: &str) -> Result<(PathBuf, fs::File)> {
    for attempt in 0u32.. {
        let name = if attempt == 0 {
            format!("{}.{}", stem, ext)
        } else {
            format!("{}_{}.{}", stem, attempt, ext)
        };
        let path = dir.join(name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => {
                return Err(CleanError::io(
                    format!("Failed to create restore script {}", path.display()),
                    e,
                ))
            }
        }
    }
    Err(CleanError::io(
        format!("No free restore script name in {}", dir.display()),
        io::Error::from(io::ErrorKind::AlreadyExists),
    ))
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
        .map_err(|e| CleanError::io(format!("Failed to mark {} executable", path.display()), e))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    // .bat files are runnable by extension
    Ok(())
}
