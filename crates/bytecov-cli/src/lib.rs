//! Bytecov CLI Library
//!
//! Command-line front end for the Bytecov coverage engine: instrument
//! class files on disk, inspect their control-flow graphs and probe plans,
//! and verify that classes survive a decode/encode/instrument cycle.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::format_push_string)]
#![allow(clippy::missing_errors_doc)]

mod commands;
mod config;
mod error;
pub mod handlers;

pub use commands::{Cli, Commands, GranularityArg, InspectArgs, InspectFormat, InstrumentArgs, VerifyArgs};
pub use config::{init_tracing, parse_instrument_config, CliConfig, Verbosity};
pub use error::{CliError, CliResult};
