//! CLI command definitions using clap

use bytecov::config::Granularity;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Bytecov: line and branch coverage for JVM class files
#[derive(Parser, Debug)]
#[command(name = "bytecov")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv, -vvv); `RUST_LOG` takes precedence
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Instrumentation config file (JSON); flags override its values
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Rewrite a class file with coverage probes
    Instrument(InstrumentArgs),

    /// Show the control-flow graph and probe plan of a class
    Inspect(InspectArgs),

    /// Check that classes round-trip and instrument cleanly
    Verify(VerifyArgs),
}

/// Arguments for the instrument command
#[derive(Parser, Debug)]
pub struct InstrumentArgs {
    /// Class file to instrument
    pub input: PathBuf,

    /// Output path [default: <input>.instrumented.class]
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Probe placement
    #[arg(short, long)]
    pub granularity: Option<GranularityArg>,

    /// Method name to leave alone (repeatable)
    #[arg(long = "exclude", value_name = "METHOD")]
    pub exclude: Vec<String>,

    /// Instrument methods carrying the opt-out annotation too
    #[arg(long)]
    pub ignore_skip_annotation: bool,

    /// Skip re-decoding the rewritten class
    #[arg(long)]
    pub no_self_check: bool,

    /// Write the probe metadata record (JSON) here
    #[arg(long, value_name = "PATH")]
    pub metadata: Option<PathBuf>,

    /// Print the per-method summary as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the inspect command
#[derive(Parser, Debug)]
pub struct InspectArgs {
    /// Class file to inspect
    pub input: PathBuf,

    /// Probe placement to plan with
    #[arg(short, long)]
    pub granularity: Option<GranularityArg>,

    /// Only show methods with this name
    #[arg(short, long)]
    pub method: Option<String>,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: InspectFormat,
}

/// Arguments for the verify command
#[derive(Parser, Debug)]
pub struct VerifyArgs {
    /// Class files, or directories of them
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Stop at the first failing file
    #[arg(long)]
    pub fail_fast: bool,
}

/// Probe placement argument
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GranularityArg {
    /// One probe per basic block
    #[default]
    Block,
    /// One probe per source line
    Line,
}

impl From<GranularityArg> for Granularity {
    fn from(arg: GranularityArg) -> Self {
        match arg {
            GranularityArg::Block => Self::BasicBlock,
            GranularityArg::Line => Self::Line,
        }
    }
}

/// Inspect output format
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InspectFormat {
    /// Human-readable listing
    #[default]
    Text,
    /// JSON
    Json,
}
