//! opm command-line entry point

use anyhow::Result;
use clap::Parser;
use opm_cli::cli;
use opm_cli::core::{OpmError, user_friendly_error};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Exit status when some targets of a batch failed.
const EXIT_PARTIAL: i32 = 2;
/// Exit status after Ctrl-C.
const EXIT_INTERRUPTED: i32 = 130;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter()));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false).without_time())
        .with(filter)
        .init();

    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    // Dropping the command future removes any staging directory in flight
    let outcome = tokio::select! {
        result = cli.execute() => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };
    let Some(result) = outcome else {
        eprintln!("Interrupted");
        std::process::exit(EXIT_INTERRUPTED);
    };

    match result {
        Ok(()) => Ok(()),
        Err(e) => {
            let partial = matches!(e.downcast_ref::<OpmError>(), Some(OpmError::BatchFailed { .. }));
            let error_ctx = user_friendly_error(e);
            error_ctx.display();
            std::process::exit(if partial { EXIT_PARTIAL } else { 1 });
        }
    }
}
