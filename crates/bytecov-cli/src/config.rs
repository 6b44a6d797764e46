//! CLI configuration

use crate::error::{CliError, CliResult};
use bytecov::config::InstrumentConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// CLI verbosity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Verbosity {
    /// Quiet - errors only
    Quiet,
    /// Normal - default output
    #[default]
    Normal,
    /// Verbose - extra output
    Verbose,
    /// Debug - library debug events
    Debug,
    /// Trace - everything
    Trace,
}

impl Verbosity {
    /// Level from the `-v` count and `--quiet`
    #[must_use]
    pub const fn from_flags(verbose: u8, quiet: bool) -> Self {
        if quiet {
            return Self::Quiet;
        }
        match verbose {
            0 => Self::Normal,
            1 => Self::Verbose,
            2 => Self::Debug,
            _ => Self::Trace,
        }
    }

    /// Check if quiet mode
    #[must_use]
    pub const fn is_quiet(self) -> bool {
        matches!(self, Self::Quiet)
    }

    /// Check if verbose or higher
    #[must_use]
    pub const fn is_verbose(self) -> bool {
        matches!(self, Self::Verbose | Self::Debug | Self::Trace)
    }

    /// Default log filter for this level
    #[must_use]
    pub const fn filter_directive(self) -> &'static str {
        match self {
            Self::Quiet => "error",
            Self::Normal => "warn",
            Self::Verbose => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

/// Install the stderr log subscriber. `RUST_LOG` overrides the level
/// chosen on the command line.
pub fn init_tracing(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(verbosity.filter_directive()));
    // A subscriber may already be installed when embedded in tests
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .try_init();
}

/// CLI configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    /// Verbosity level
    pub verbosity: Verbosity,
    /// Instrumentation policy before per-command flags
    pub instrument: InstrumentConfig,
}

impl CliConfig {
    /// Create new default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set verbosity
    #[must_use]
    pub const fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set the instrumentation policy
    #[must_use]
    pub fn with_instrument(mut self, instrument: InstrumentConfig) -> Self {
        self.instrument = instrument;
        self
    }

    /// Load the instrumentation policy from a JSON file. Missing keys take
    /// their defaults.
    pub fn load_instrument(mut self, path: &Path) -> CliResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| CliError::config(format!("cannot read {}: {e}", path.display())))?;
        self.instrument = parse_instrument_config(&text)
            .map_err(|e| CliError::config(format!("{}: {e}", path.display())))?;
        Ok(self)
    }
}

/// Parse an [`InstrumentConfig`] from JSON text
pub fn parse_instrument_config(text: &str) -> CliResult<InstrumentConfig> {
    Ok(serde_json::from_str(text)?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use bytecov::config::Granularity;

    mod verbosity_tests {
        use super::*;

        #[test]
        fn test_default_verbosity() {
            assert_eq!(Verbosity::default(), Verbosity::Normal);
        }

        #[test]
        fn test_from_flags() {
            assert_eq!(Verbosity::from_flags(0, false), Verbosity::Normal);
            assert_eq!(Verbosity::from_flags(1, false), Verbosity::Verbose);
            assert_eq!(Verbosity::from_flags(2, false), Verbosity::Debug);
            assert_eq!(Verbosity::from_flags(7, false), Verbosity::Trace);
            assert_eq!(Verbosity::from_flags(3, true), Verbosity::Quiet);
        }

        #[test]
        fn test_predicates() {
            assert!(Verbosity::Quiet.is_quiet());
            assert!(!Verbosity::Normal.is_verbose());
            assert!(Verbosity::Debug.is_verbose());
        }

        #[test]
        fn test_filter_directive() {
            assert_eq!(Verbosity::Normal.filter_directive(), "warn");
            assert_eq!(Verbosity::Verbose.filter_directive(), "info");
            assert_eq!(Verbosity::Quiet.filter_directive(), "error");
        }
    }

    mod cli_config_tests {
        use super::*;

        #[test]
        fn test_parse_partial_config() {
            let config = parse_instrument_config(r#"{"granularity": "line", "self_check": false}"#).unwrap();
            assert_eq!(config.granularity, Granularity::Line);
            assert!(!config.self_check);
            assert!(config.is_excluded("<init>"));
        }

        #[test]
        fn test_parse_bad_config() {
            let err = parse_instrument_config(r#"{"granularity": "statement"}"#).unwrap_err();
            assert!(matches!(err, CliError::Json(_)));
        }

        #[test]
        fn test_load_from_file() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("bytecov.json");
            std::fs::write(&path, r#"{"excluded_methods": ["toString"]}"#).unwrap();

            let config = CliConfig::new().load_instrument(&path).unwrap();
            assert_eq!(config.instrument.excluded_methods, vec!["toString".to_string()]);
        }

        #[test]
        fn test_load_missing_file() {
            let err = CliConfig::new()
                .load_instrument(Path::new("/nonexistent/bytecov.json"))
                .unwrap_err();
            assert!(matches!(err, CliError::Config { .. }));
        }
    }
}
