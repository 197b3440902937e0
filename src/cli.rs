use anyhow::Context;
use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::deleter::{self, BackupPolicy};
use crate::logging::{self, Logger, TracingLogger};
use crate::output::{self, OutputMode};
use crate::prompt::LineConfirm;
use crate::session::{Mode, Session};

#[derive(Parser)]
#[command(name = "file-cleaner")]
#[command(version)]
#[command(about = "Delete old temporary files and keep a script to undo it")]
#[command(long_about = "file-cleaner scans a directory for junk files (temporary files, logs, \
    backups) older than a minimum age and deletes them. Every destructive run writes a \
    restore script into the cleaned directory.\n\n\
    Examples:\n  \
    file-cleaner clean ~/Downloads                # List what would be deleted\n  \
    file-cleaner clean ~/Downloads --confirm      # Ask before each file\n  \
    file-cleaner clean . --batch --days 30        # One prompt, files older than 30 days\n  \
    file-cleaner clean . --batch --keep-backups   # Keep backups until purge\n  \
    file-cleaner purge .                          # Drop kept backups")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase output verbosity (-v, -vv for more)
    #[arg(short = 'v', long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Find junk files and delete them (dry-run unless --batch or --confirm is given)
    #[command(visible_alias = "c")]
    Clean(CleanArgs),

    /// Permanently remove backups kept by --keep-backups
    Purge {
        /// Directory that was cleaned
        path: PathBuf,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct CleanArgs {
    /// Directory to clean
    pub path: PathBuf,

    /// Only list what would be deleted (default)
    #[arg(long, conflicts_with_all = ["batch", "confirm"])]
    pub dry_run: bool,

    /// Ask once before deleting everything found
    #[arg(long, conflicts_with = "confirm")]
    pub batch: bool,

    /// Ask before deleting each file
    #[arg(long)]
    pub confirm: bool,

    /// Minimum age in days [default: 7]
    #[arg(long, value_name = "DAYS")]
    pub days: Option<u64>,

    /// Maximum size in KB, 0 = no limit [default: 0]
    #[arg(long, value_name = "KB")]
    pub size: Option<f64>,

    /// Extra extensions to clean, comma separated without dots (e.g. "py,cache")
    #[arg(long, value_name = "EXTS")]
    pub ext: Option<String>,

    /// Never delete files matching this pattern (repeatable)
    #[arg(long, value_name = "PATTERN")]
    pub exclude: Vec<String>,

    /// JSON file with patterns, exclude, min_days and max_size_kb
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Keep deleted files in a quarantine folder until `purge`
    #[arg(long)]
    pub keep_backups: bool,

    /// Write the restore script here instead of the cleaned directory
    #[arg(long, value_name = "DIR")]
    pub script_dir: Option<PathBuf>,
}

impl CleanArgs {
    pub fn mode(&self) -> Mode {
        if self.confirm {
            Mode::PerFile
        } else if self.batch {
            Mode::Batch
        } else {
            Mode::DryRun
        }
    }

    pub fn backup_policy(&self) -> BackupPolicy {
        if self.keep_backups {
            BackupPolicy::Quarantine
        } else {
            BackupPolicy::Discard
        }
    }

    /// Defaults, then the config file, then explicit flags
    pub fn build_config(&self) -> anyhow::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(&expand_home(path))
                .with_context(|| format!("Invalid configuration file {}", path.display()))?,
            None => Config::default(),
        };

        config.apply_cli_overrides(self.days, self.size);
        if let Some(ext) = &self.ext {
            config.add_extensions(ext);
        }
        config.add_exclusions(self.exclude.iter().cloned());

        Ok(config)
    }
}

impl Cli {
    pub fn output_mode(&self) -> OutputMode {
        OutputMode::from_flags(self.verbose, self.quiet)
    }

    pub fn stdout_level(&self) -> tracing_subscriber::filter::LevelFilter {
        logging::stdout_level(self.verbose, self.quiet)
    }

    pub fn run(self) -> anyhow::Result<()> {
        let output_mode = self.output_mode();
        let logger = TracingLogger;
        logger.debug(&format!("Log file: {}", logging::log_file_path().display()));

        match self.command {
            Commands::Clean(args) => {
                let config = args.build_config()?;
                let rule = config.to_rule()?;
                let root = expand_home(&args.path);
                let mode = args.mode();

                logger.info(&format!(
                    "Cleaning {} ({}, min age {} days)",
                    root.display(),
                    output::mode_label(mode),
                    config.min_days
                ));

                let mut confirm = LineConfirm::stdio();
                let mut session = Session::new(&root, rule, mode, &logger, &mut confirm)?
                    .with_backup_policy(args.backup_policy());
                if let Some(dir) = &args.script_dir {
                    session = session.with_script_dir(expand_home(dir));
                }

                let report = session
                    .run()
                    .with_context(|| format!("Cleaning {} failed", root.display()))?;

                output::print_report(&report, output_mode);
                Ok(())
            }
            Commands::Purge { path } => {
                let root = expand_home(&path);
                let count = deleter::purge_quarantine(&root, &logger)
                    .with_context(|| format!("Purging {} failed", root.display()))?;
                output::print_purge(count, &root, output_mode);
                Ok(())
            }
        }
    }
}

/// Replace a leading `~` with the home directory
pub fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => directories::BaseDirs::new()
            .map(|dirs| dirs.home_dir().join(rest))
            .unwrap_or_else(|| path.to_path_buf()),
        Err(_) => path.to_path_buf(),
    }
}
