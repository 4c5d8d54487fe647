//! IVR harness - end-to-end tests for voice flows
//!
//! Submits conversations described as observation graphs to the execution
//! backend, waits for the results and reports a verdict per scenario.

use clap::Parser;
use ivr_harness::common::{config::Config, logging};
use ivr_harness::{cli, commands::Commands};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ivr-harness", about = "End-to-end test harness for IVR flows")]
#[command(version, long_about = None)]
struct Cli {
    /// Configuration file (default: platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Also write logs to a file (default location when no path is given)
    #[arg(long, global = true, num_args = 0..=1)]
    log_file: Option<Option<PathBuf>>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Keep the file writer alive until exit
    let _guard = match cli.log_file.map(|p| p.or_else(logging::default_log_file)) {
        Some(Some(path)) => match logging::init_with_file(&path) {
            Ok(guard) => Some(guard),
            Err(e) => {
                eprintln!("Warning: Could not open log file {}: {}", path.display(), e);
                logging::init_cli();
                None
            }
        },
        _ => {
            logging::init_cli();
            None
        }
    };

    let config = match cli.config.as_deref() {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };

    let result = match config {
        Ok(config) => cli::dispatch(cli.command, &config).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
