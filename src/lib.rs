//! file-cleaner library crate
//!
//! Scans a directory for junk files, deletes the ones the user approves and
//! writes a script that puts them back. The binary in `main.rs` is a thin
//! wrapper around [`cli::Cli`].

pub mod cli;
pub mod config;
pub mod deleter;
pub mod error;
pub mod logging;
pub mod output;
pub mod patterns;
pub mod prompt;
pub mod restore;
pub mod scanner;
pub mod session;

pub use deleter::{BackupDeleter, BackupPolicy, BackupState, DeletionOutcome, DeletionRecord};
pub use error::CleanError;
pub use logging::{LogLevel, Logger, MemoryLogger, TracingLogger};
pub use scanner::{CandidateFile, SelectionRule, Selector};
pub use session::{Mode, Session, SessionReport, SessionState};
