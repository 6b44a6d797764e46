//! Turning counters into coverage facts.

use super::block::ProbeId;
use super::counters::CounterSnapshot;
use super::metadata::ClassMetadataRecord;
use super::report::{BranchCoverage, ClassCoverage, CoverageReport, LineCoverage, MethodCoverage};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Default)]
struct LineTally {
    hits: u64,
    probes_hit: usize,
    probes_total: usize,
    branches_covered: usize,
    branches_total: usize,
}

impl LineTally {
    fn finish(self) -> LineCoverage {
        LineCoverage {
            hits: self.hits,
            status: LineCoverage::status_of(
                self.probes_hit,
                self.probes_total,
                self.branches_covered,
                self.branches_total,
            ),
            probes_hit: self.probes_hit,
            probes_total: self.probes_total,
            branches_covered: self.branches_covered,
            branches_total: self.branches_total,
        }
    }
}

fn class_coverage(record: &ClassMetadataRecord, counts: &[u64]) -> ClassCoverage {
    let count = |probe: ProbeId| counts.get(probe.index()).copied().unwrap_or(0);

    let methods: Vec<MethodCoverage> = record
        .methods
        .iter()
        .enumerate()
        .map(|(index, method)| {
            let mut lines: BTreeMap<u16, LineTally> = BTreeMap::new();
            let mut probes_hit = 0;
            let mut probes_total = 0;
            for probe in record.method_probes(index) {
                let hits = count(probe.probe);
                probes_total += 1;
                probes_hit += usize::from(hits > 0);
                for line in &probe.lines {
                    let tally = lines.entry(*line).or_default();
                    tally.hits = tally.hits.max(hits);
                    tally.probes_total += 1;
                    tally.probes_hit += usize::from(hits > 0);
                }
            }

            let branches: Vec<BranchCoverage> = record
                .branches
                .iter()
                .filter(|b| b.method == index)
                .map(|site| {
                    let covered = site.successors.iter().filter(|p| count(**p) > 0).count();
                    let total = site.successors.len();
                    if let Some(line) = site.line {
                        let tally = lines.entry(line).or_default();
                        tally.branches_covered += covered;
                        tally.branches_total += total;
                    }
                    BranchCoverage {
                        line: site.line,
                        offset: site.offset,
                        covered,
                        total,
                    }
                })
                .collect();

            MethodCoverage {
                name: method.name.clone(),
                descriptor: method.descriptor.clone(),
                status: method.status.clone(),
                lines: lines.into_iter().map(|(line, tally)| (line, tally.finish())).collect(),
                branches,
                probes_hit,
                probes_total,
            }
        })
        .collect();

    ClassCoverage {
        name: record.identity.name.clone(),
        digest: record.identity.digest,
        source_file: record.source_file.clone(),
        executed: counts.iter().any(|c| *c > 0),
        methods,
    }
}

/// Combine class metadata with a counter snapshot.
///
/// Only classes with metadata appear. A class without a segment in the
/// snapshot is reported with every probe at zero.
#[must_use]
pub fn aggregate(records: &[Arc<ClassMetadataRecord>], snapshot: &CounterSnapshot) -> CoverageReport {
    CoverageReport::from_classes(records.iter().map(|record| {
        let counts = snapshot.counts(&record.identity).unwrap_or(&[]);
        class_coverage(record, counts)
    }))
}
