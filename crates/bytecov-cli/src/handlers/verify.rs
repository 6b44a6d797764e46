//! Verify command handler

use crate::commands::VerifyArgs;
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use bytecov::agent::{CoverageAgent, PrefixFilter};
use bytecov::classfile;
use bytecov::config::InstrumentConfig;
use bytecov::coverage::CounterStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A class that passed verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verified {
    pub class: String,
    pub methods: usize,
    pub probes: usize,
}

/// Execute the verify command
pub fn execute_verify(config: &CliConfig, args: &VerifyArgs) -> CliResult<()> {
    let mut failed = 0usize;
    let mut checked = 0usize;
    for input in collect_inputs(&args.inputs)? {
        checked += 1;
        match verify_file(&input, &config.instrument) {
            Ok(ok) => {
                if !config.verbosity.is_quiet() {
                    println!(
                        "ok   {}: {} ({} methods, {} probes)",
                        input.display(),
                        ok.class,
                        ok.methods,
                        ok.probes
                    );
                }
            }
            Err(err) => {
                failed += 1;
                println!("FAIL {}: {err}", input.display());
                if args.fail_fast {
                    break;
                }
            }
        }
    }

    if failed > 0 {
        return Err(CliError::verification(format!("{failed} of {checked} files failed")));
    }
    if !config.verbosity.is_quiet() {
        println!("{checked} files verified");
    }
    Ok(())
}

fn verify_file(path: &Path, config: &InstrumentConfig) -> CliResult<Verified> {
    let bytes = std::fs::read(path)?;
    verify_bytes(&bytes, config)
}

/// Check that a class decodes, re-encodes to an equal model and can be
/// instrumented with the self-check on
pub fn verify_bytes(bytes: &[u8], config: &InstrumentConfig) -> CliResult<Verified> {
    let class = classfile::decode(bytes)?;
    let reencoded = classfile::encode(&class)?;
    if classfile::decode(&reencoded)? != class {
        return Err(CliError::verification(format!(
            "{} changes when re-encoded",
            class.name
        )));
    }

    let mut config = config.clone();
    config.self_check = true;
    let agent = CoverageAgent::new(config, PrefixFilter::all(), Arc::new(CounterStore::with_capacity(1)));
    agent.try_transform(&class.name, bytes)?;
    let probes = agent
        .registry()
        .records()
        .first()
        .map_or(0, |record| record.probe_count());

    Ok(Verified {
        class: class.name,
        methods: class.methods.len(),
        probes,
    })
}

/// Expand directories into the `.class` files directly inside them
pub fn collect_inputs(inputs: &[PathBuf]) -> CliResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut found: Vec<PathBuf> = std::fs::read_dir(input)?
                .filter_map(Result::ok)
                .map(|entry| entry.path())
                .filter(|path| path.extension().is_some_and(|ext| ext == "class"))
                .collect();
            found.sort();
            files.extend(found);
        } else {
            files.push(input.clone());
        }
    }
    Ok(files)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use bytecov::classfile::{ClassBuilder, MethodBody};

    fn counter_class() -> Vec<u8> {
        let mut builder = ClassBuilder::new("demo/Counter").unwrap();
        builder
            .method(
                MethodBody::new("next", "(I)I")
                    .limits(2, 1)
                    // iload_0 iconst_1 iadd ireturn
                    .code(vec![0x1a, 0x04, 0x60, 0xac]),
            )
            .unwrap();
        builder.to_bytes().unwrap()
    }

    #[test]
    fn test_verify_good_class() {
        let ok = verify_bytes(&counter_class(), &InstrumentConfig::default()).unwrap();
        assert_eq!(ok.class, "demo/Counter");
        assert_eq!(ok.methods, 1);
        assert_eq!(ok.probes, 1);
    }

    #[test]
    fn test_verify_forces_self_check() {
        let config = InstrumentConfig::builder().self_check(false).build();
        assert!(verify_bytes(&counter_class(), &config).is_ok());
    }

    #[test]
    fn test_verify_truncated_class() {
        let bytes = counter_class();
        let err = verify_bytes(&bytes[..bytes.len() - 3], &InstrumentConfig::default()).unwrap_err();
        assert!(matches!(err, CliError::Decode(_)));
    }

    #[test]
    fn test_collect_inputs_expands_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("B.class"), b"").unwrap();
        std::fs::write(dir.path().join("A.class"), b"").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"").unwrap();
        let single = PathBuf::from("C.class");

        let files = collect_inputs(&[dir.path().to_path_buf(), single.clone()]).unwrap();
        assert_eq!(
            files,
            vec![dir.path().join("A.class"), dir.path().join("B.class"), single]
        );
    }
}
