//! Per-class probe metadata retained for aggregation.

use super::block::{BlockId, ProbeId};
use super::cfg::Terminator;
use super::counters::ClassIdentity;
use crate::result::ErrorKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Why a method does or does not carry probes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MethodStatus {
    /// Carries probes
    Instrumented,
    /// Abstract or native
    NoCode,
    /// Compiler-generated synthetic or bridge method
    Synthetic,
    /// Name in the exclusion list
    Excluded,
    /// Carries the opt-out annotation
    SkipAnnotated,
    /// Instrumentation was attempted and refused
    Failed {
        /// Error category that refused the method
        kind: ErrorKind,
        /// Rendered error message
        reason: String,
    },
}

impl MethodStatus {
    /// Whether the method carries probes
    #[must_use]
    pub const fn is_instrumented(&self) -> bool {
        matches!(self, Self::Instrumented)
    }
}

/// One declared method and what happened to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodRecord {
    /// Method name, e.g. `<init>`
    pub name: String,
    /// JVM method descriptor, e.g. `(II)I`
    pub descriptor: String,
    /// Whether the method carries probes, and why not
    pub status: MethodStatus,
}

/// One probe and the source it stands for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeRecord {
    /// Counter index within the class segment
    pub probe: ProbeId,
    /// Index into [`ClassMetadataRecord::methods`]
    pub method: usize,
    /// Block the probe sits at the head of
    pub block: BlockId,
    /// How that block ends
    pub terminator: Terminator,
    /// Lines this probe accounts for
    pub lines: Vec<u16>,
}

/// A conditional or switch whose outcomes are tracked by successor probes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchSite {
    /// Index into [`ClassMetadataRecord::methods`]
    pub method: usize,
    /// Original code offset of the branching instruction
    pub offset: u32,
    /// Source line of the branching instruction, if known
    pub line: Option<u16>,
    /// Probes at the head of each distinct successor block
    pub successors: Vec<ProbeId>,
}

/// Everything needed to interpret one class's counter segment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassMetadataRecord {
    /// Class the segment belongs to
    pub identity: ClassIdentity,
    /// `SourceFile` attribute, if present
    pub source_file: Option<String>,
    /// Every declared method, in declaration order
    pub methods: Vec<MethodRecord>,
    /// Probes in counter order
    pub probes: Vec<ProbeRecord>,
    pub branches: Vec<BranchSite>,
}

impl ClassMetadataRecord {
    /// Size of the class's counter segment
    #[must_use]
    pub fn probe_count(&self) -> usize {
        self.probes.len()
    }

    /// Probes belonging to method `method`
    pub fn method_probes(&self, method: usize) -> impl Iterator<Item = &ProbeRecord> {
        self.probes.iter().filter(move |p| p.method == method)
    }
}

/// Records of every class transformed so far
#[derive(Debug, Default)]
pub struct MetadataRegistry {
    records: RwLock<BTreeMap<ClassIdentity, Arc<ClassMetadataRecord>>>,
}

impl MetadataRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep `record`; an existing record for the same identity wins
    pub fn insert(&self, record: ClassMetadataRecord) -> Arc<ClassMetadataRecord> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            records
                .entry(record.identity.clone())
                .or_insert_with(|| Arc::new(record)),
        )
    }

    /// Record for `identity`, if that class was transformed
    #[must_use]
    pub fn get(&self, identity: &ClassIdentity) -> Option<Arc<ClassMetadataRecord>> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(identity)
            .cloned()
    }

    /// All records in identity order
    #[must_use]
    pub fn records(&self) -> Vec<Arc<ClassMetadataRecord>> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    /// Number of classes recorded
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether no class was recorded yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget every record
    pub fn clear(&self) {
        self.records.write().unwrap_or_else(PoisonError::into_inner).clear();
    }
}
