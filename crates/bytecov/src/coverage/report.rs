//! Coverage report.
//!
//! Hierarchy: class → method → line / branch. Maps are ordered and methods
//! keep declaration order, so serializing the same data twice yields the
//! same document.

use super::metadata::MethodStatus;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Hit state of a source line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineStatus {
    /// Every probe and branch outcome on the line was reached
    Covered,
    /// Some probes or branch outcomes on the line were reached, not all
    PartiallyCovered,
    /// Nothing on the line was reached
    Missed,
}

/// Coverage of one source line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineCoverage {
    /// Highest count among the line's probes
    pub hits: u64,
    pub status: LineStatus,
    /// Probes on the line with a non-zero count
    pub probes_hit: usize,
    pub probes_total: usize,
    /// Branch outcomes taken from branches on the line
    pub branches_covered: usize,
    /// Branch outcomes possible from branches on the line
    pub branches_total: usize,
}

impl LineCoverage {
    pub(crate) const fn status_of(
        probes_hit: usize,
        probes_total: usize,
        branches_covered: usize,
        branches_total: usize,
    ) -> LineStatus {
        if probes_hit == 0 && branches_covered == 0 {
            LineStatus::Missed
        } else if probes_hit == probes_total && branches_covered == branches_total {
            LineStatus::Covered
        } else {
            LineStatus::PartiallyCovered
        }
    }
}

/// Outcomes of one conditional or switch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchCoverage {
    /// Source line of the branching instruction, if known
    pub line: Option<u16>,
    /// Code offset of the branching instruction in the original class
    pub offset: u32,
    /// Distinct successors reached
    pub covered: usize,
    /// Distinct successors
    pub total: usize,
}

/// Coverage of one method
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodCoverage {
    pub name: String,
    /// JVM method descriptor
    pub descriptor: String,
    /// Serialized inline as `status` (plus `kind` and `reason` on failure)
    #[serde(flatten)]
    pub status: MethodStatus,
    /// Keyed by source line; empty without a line table
    pub lines: BTreeMap<u16, LineCoverage>,
    /// In original code order
    pub branches: Vec<BranchCoverage>,
    pub probes_hit: usize,
    pub probes_total: usize,
}

impl MethodCoverage {
    /// Coverage of source line `line`, if the method has code on it
    #[must_use]
    pub fn line(&self, line: u16) -> Option<&LineCoverage> {
        self.lines.get(&line)
    }

    /// Whether any probe of the method fired
    #[must_use]
    pub const fn executed(&self) -> bool {
        self.probes_hit > 0
    }
}

/// Coverage of one loaded class version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassCoverage {
    /// Internal class name
    pub name: String,
    /// Content digest from the class identity; tells versions apart
    pub digest: u64,
    /// `SourceFile` attribute, if present
    pub source_file: Option<String>,
    /// Whether any probe of the class fired
    pub executed: bool,
    /// Every declared method, in declaration order
    pub methods: Vec<MethodCoverage>,
}

impl ClassCoverage {
    /// First method called `name`
    #[must_use]
    pub fn method(&self, name: &str) -> Option<&MethodCoverage> {
        self.methods.iter().find(|m| m.name == name)
    }
}

/// Totals over a whole report
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoverageSummary {
    /// Report entries; each class version counts once
    pub classes: usize,
    pub executed_classes: usize,
    pub methods: usize,
    pub instrumented_methods: usize,
    pub lines_total: usize,
    /// Lines with status `Covered`
    pub lines_covered: usize,
    /// Lines with status `PartiallyCovered`
    pub lines_partial: usize,
    pub branches_total: usize,
    pub branches_covered: usize,
    pub probes_total: usize,
    pub probes_hit: usize,
    /// Share of lines at least partially covered
    pub coverage_percent: f64,
}

/// Aggregated coverage of every loaded class
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoverageReport {
    /// Keyed by class name; a second version of a class is keyed `name@digest`
    pub classes: BTreeMap<String, ClassCoverage>,
    /// Totals over `classes`
    pub summary: CoverageSummary,
}

impl CoverageReport {
    /// Build a report and its summary from per-class results
    #[must_use]
    pub fn from_classes(classes: impl IntoIterator<Item = ClassCoverage>) -> Self {
        let mut map = BTreeMap::new();
        for class in classes {
            let key = if map.contains_key(&class.name) {
                format!("{}@{:016x}", class.name, class.digest)
            } else {
                class.name.clone()
            };
            map.insert(key, class);
        }
        let summary = Self::summarize(&map);
        Self {
            classes: map,
            summary,
        }
    }

    fn summarize(classes: &BTreeMap<String, ClassCoverage>) -> CoverageSummary {
        let mut summary = CoverageSummary {
            classes: classes.len(),
            ..CoverageSummary::default()
        };
        for class in classes.values() {
            summary.executed_classes += usize::from(class.executed);
            for method in &class.methods {
                summary.methods += 1;
                summary.instrumented_methods += usize::from(method.status.is_instrumented());
                summary.probes_total += method.probes_total;
                summary.probes_hit += method.probes_hit;
                for line in method.lines.values() {
                    summary.lines_total += 1;
                    match line.status {
                        LineStatus::Covered => summary.lines_covered += 1,
                        LineStatus::PartiallyCovered => summary.lines_partial += 1,
                        LineStatus::Missed => {}
                    }
                }
                for branch in &method.branches {
                    summary.branches_total += branch.total;
                    summary.branches_covered += branch.covered;
                }
            }
        }
        summary.coverage_percent = if summary.lines_total == 0 {
            100.0
        } else {
            (summary.lines_covered + summary.lines_partial) as f64 / summary.lines_total as f64 * 100.0
        };
        summary
    }

    /// Entry under report key `name`
    #[must_use]
    pub fn class(&self, name: &str) -> Option<&ClassCoverage> {
        self.classes.get(name)
    }

    /// Distinct names of classes with at least one probe hit, in name
    /// order. Several versions of one class appear once.
    #[must_use]
    pub fn executed_classes(&self) -> Vec<&str> {
        let names: BTreeSet<&str> = self
            .classes
            .values()
            .filter(|c| c.executed)
            .map(|c| c.name.as_str())
            .collect();
        names.into_iter().collect()
    }

    /// Shorthand for `summary.coverage_percent`
    #[must_use]
    pub fn coverage_percent(&self) -> f64 {
        self.summary.coverage_percent
    }

    /// Pretty-printed JSON document
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
