//! Bytecov CLI: coverage instrumentation for JVM class files
//!
//! ## Usage
//!
//! ```bash
//! bytecov instrument Widget.class -o out/Widget.class   # Add probes
//! bytecov inspect Widget.class --format json            # Show CFG and plan
//! bytecov verify build/classes/                          # Round-trip check
//! ```

use bytecov_cli::handlers::{execute_inspect, execute_instrument, execute_verify};
use bytecov_cli::{init_tracing, Cli, CliConfig, CliResult, Commands, Verbosity};
use clap::Parser;
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();
    let config = build_config(&cli)?;
    init_tracing(config.verbosity);

    match &cli.command {
        Commands::Instrument(args) => execute_instrument(&config, args),
        Commands::Inspect(args) => execute_inspect(&config, args),
        Commands::Verify(args) => execute_verify(&config, args),
    }
}

fn build_config(cli: &Cli) -> CliResult<CliConfig> {
    let config = CliConfig::new().with_verbosity(Verbosity::from_flags(cli.verbose, cli.quiet));
    match &cli.config {
        Some(path) => config.load_instrument(path),
        None => Ok(config),
    }
}
