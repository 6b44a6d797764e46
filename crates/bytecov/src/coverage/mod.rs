//! Block coverage for JVM classes
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  BYTECOV COVERAGE PIPELINE                                       │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  CodeModel → ControlFlowGraph → plan → allocate → apply         │
//! │                                   ↓         ↓                    │
//! │                            ClassMetadata  CounterStore          │
//! │                                   └────┬────┘                    │
//! │                                    aggregate → CoverageReport   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! - Typed indices (`BlockId`, `ProbeId`, `SegmentId`) keep the three
//!   numbering spaces apart.
//! - Probe hits are one relaxed atomic add on a pre-allocated segment.
//! - Failures are scoped: a bad method is skipped, its siblings are still
//!   instrumented.

mod aggregate;
mod block;
mod cfg;
mod counters;
mod diagnostics;
pub mod inject;
mod metadata;
mod report;

pub use aggregate::aggregate;
pub use block::{BlockId, ProbeId, SegmentId};
pub use cfg::{BasicBlock, ControlFlowGraph, Edge, EdgeKind, Terminator};
pub use counters::{
    ClassIdentity, CounterSegment, CounterSnapshot, CounterStore, SegmentSnapshot, DEFAULT_SEGMENT_CAPACITY,
};
pub use diagnostics::{Diagnostic, DiagnosticAction, DiagnosticLog};
pub use inject::{apply, plan, ClassPlan, Layout, MethodPlan, PROBE_LEN, PROBE_STACK};
pub use metadata::{BranchSite, ClassMetadataRecord, MetadataRegistry, MethodRecord, MethodStatus, ProbeRecord};
pub use report::{
    BranchCoverage, ClassCoverage, CoverageReport, CoverageSummary, LineCoverage, LineStatus, MethodCoverage,
};

#[cfg(test)]
mod tests;
