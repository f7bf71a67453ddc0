//! lsnet - list network interfaces as seen from other processes and containers
//!
//! Each argument is a process id or a 12-character container id; the
//! interfaces of that target's network namespace are printed as a table.

use clap::Parser;
use std::io::IsTerminal;
use std::process;
use tracing_subscriber::EnvFilter;

mod cli;
mod run;
mod table;

use cli::Cli;

#[tokio::main]
async fn main() {
    // Parse command-line arguments
    let cli = Cli::parse();

    // Setup logging based on verbosity; RUST_LOG wins when set.
    // Logs go to stderr, stdout carries the table.
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .init();

    if let Err(e) = run::execute(cli).await {
        eprintln!("❌ Error: {e:#}");
        process::exit(1);
    }
}
