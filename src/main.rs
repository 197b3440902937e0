use clap::Parser;
use file_cleaner::cli::Cli;
use file_cleaner::logging;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Held until exit so buffered lines reach the log file
    let guard = match logging::init_logging(cli.stdout_level()) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("[WARNING] Logging disabled: {:#}", e);
            None
        }
    };

    match cli.run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if guard.is_some() {
                tracing::error!("{:#}", e);
            } else {
                eprintln!("Error: {:#}", e);
            }
            ExitCode::FAILURE
        }
    }
}
