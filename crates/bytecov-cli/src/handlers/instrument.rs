//! Instrument command handler

use crate::commands::InstrumentArgs;
use crate::config::CliConfig;
use crate::error::CliResult;
use bytecov::agent::{CoverageAgent, PrefixFilter};
use bytecov::classfile;
use bytecov::config::InstrumentConfig;
use bytecov::coverage::{ClassMetadataRecord, CounterStore, MethodStatus};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Per-method line of the instrument summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MethodSummary {
    pub name: String,
    pub descriptor: String,
    #[serde(flatten)]
    pub status: MethodStatus,
    pub probes: usize,
}

/// What `instrument` did to one class
#[derive(Debug, Clone, Serialize)]
pub struct InstrumentSummary {
    pub class: String,
    pub output: PathBuf,
    /// False when nothing was probed and the bytes were copied as-is
    pub rewritten: bool,
    pub probes: usize,
    pub methods: Vec<MethodSummary>,
}

/// Result of instrumenting one class in memory
#[derive(Debug)]
pub struct Instrumented {
    pub bytes: Vec<u8>,
    pub rewritten: bool,
    pub record: Option<Arc<ClassMetadataRecord>>,
}

/// Execute the instrument command
pub fn execute_instrument(config: &CliConfig, args: &InstrumentArgs) -> CliResult<()> {
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&args.input));
    let bytes = std::fs::read(&args.input)?;
    let instrument = instrument_config(&config.instrument, args);
    tracing::info!(input = %args.input.display(), granularity = ?instrument.granularity, "instrumenting");

    let result = instrument_bytes(instrument, &bytes)?;
    std::fs::write(&output, &result.bytes)?;

    if let (Some(path), Some(record)) = (&args.metadata, &result.record) {
        std::fs::write(path, serde_json::to_string_pretty(record.as_ref())?)?;
    }

    let summary = summarize(&result, output);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else if !config.verbosity.is_quiet() {
        print!("{}", render_summary(&summary));
    }
    Ok(())
}

/// Apply command-line flags on top of the loaded policy
#[must_use]
pub fn instrument_config(base: &InstrumentConfig, args: &InstrumentArgs) -> InstrumentConfig {
    let mut config = base.clone();
    if let Some(granularity) = args.granularity {
        config.granularity = granularity.into();
    }
    for name in &args.exclude {
        if !config.is_excluded(name) {
            config.excluded_methods.push(name.clone());
        }
    }
    if args.ignore_skip_annotation {
        config.skip_annotation = None;
    }
    if args.no_self_check {
        config.self_check = false;
    }
    config
}

/// `Widget.class` becomes `Widget.instrumented.class`
#[must_use]
pub fn default_output_path(input: &Path) -> PathBuf {
    input.with_extension("instrumented.class")
}

/// Instrument one class file image
pub fn instrument_bytes(config: InstrumentConfig, bytes: &[u8]) -> CliResult<Instrumented> {
    let name = classfile::decode(bytes)?.name;
    let agent = CoverageAgent::new(config, PrefixFilter::all(), Arc::new(CounterStore::with_capacity(1)));
    let rewritten = agent.try_transform(&name, bytes)?;
    let record = agent.registry().records().into_iter().next();
    Ok(match rewritten {
        Some(out) => Instrumented {
            bytes: out,
            rewritten: true,
            record,
        },
        None => Instrumented {
            bytes: bytes.to_vec(),
            rewritten: false,
            record,
        },
    })
}

/// Build the printable summary for an instrumented class
#[must_use]
pub fn summarize(result: &Instrumented, output: PathBuf) -> InstrumentSummary {
    let Some(record) = &result.record else {
        return InstrumentSummary {
            class: String::new(),
            output,
            rewritten: result.rewritten,
            probes: 0,
            methods: Vec::new(),
        };
    };
    let methods = record
        .methods
        .iter()
        .enumerate()
        .map(|(index, method)| MethodSummary {
            name: method.name.clone(),
            descriptor: method.descriptor.clone(),
            status: method.status.clone(),
            probes: record.method_probes(index).count(),
        })
        .collect();
    InstrumentSummary {
        class: record.identity.name.clone(),
        output,
        rewritten: result.rewritten,
        probes: record.probe_count(),
        methods,
    }
}

/// Short label for a method status
#[must_use]
pub fn status_label(status: &MethodStatus) -> String {
    match status {
        MethodStatus::Instrumented => "instrumented".to_string(),
        MethodStatus::NoCode => "no code".to_string(),
        MethodStatus::Synthetic => "synthetic".to_string(),
        MethodStatus::Excluded => "excluded".to_string(),
        MethodStatus::SkipAnnotated => "opted out".to_string(),
        MethodStatus::Failed { kind, reason } => format!("failed ({kind:?}): {reason}"),
    }
}

/// Render the summary as text
#[must_use]
pub fn render_summary(summary: &InstrumentSummary) -> String {
    let instrumented = summary
        .methods
        .iter()
        .filter(|m| m.status.is_instrumented())
        .count();
    let mut out = if summary.rewritten {
        format!(
            "{} -> {}: {} probes in {} of {} methods\n",
            summary.class,
            summary.output.display(),
            summary.probes,
            instrumented,
            summary.methods.len()
        )
    } else {
        format!(
            "{} -> {}: nothing to probe, copied unchanged\n",
            summary.class,
            summary.output.display()
        )
    };
    for method in &summary.methods {
        let signature = format!("{}{}", method.name, method.descriptor);
        if method.status.is_instrumented() {
            out.push_str(&format!("  {signature:<32} {} probes\n", method.probes));
        } else {
            out.push_str(&format!("  {signature:<32} {}\n", status_label(&method.status)));
        }
    }
    out
}
