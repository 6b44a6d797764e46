//! Bytecov: load-time block coverage for JVM classes
//!
//! A host loader hands each class to [`agent::CoverageAgent::transform`] as
//! it is defined. The class is decoded, its methods are split into basic
//! blocks, a probe is placed at the head of each block and the class is
//! re-encoded. Probes report to a process-wide [`coverage::CounterStore`];
//! at shutdown [`agent::CoverageAgent::drain`] folds the counters into a
//! [`coverage::CoverageReport`].
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    BYTECOV Architecture                          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌────────────┐    ┌────────────┐            │
//! │   │ classfile  │    │ coverage   │    │ classfile  │            │
//! │   │ decode     │───►│ plan/apply │───►│ encode     │───► host   │
//! │   └────────────┘    └─────┬──────┘    └────────────┘            │
//! │                           │ allocate                             │
//! │                     ┌─────▼──────┐    ┌────────────┐            │
//! │   probes ──hit────► │ Counter    │───►│ Coverage   │            │
//! │                     │ Store      │    │ Report     │            │
//! │                     └────────────┘    └────────────┘            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

// Allow large stack arrays/frames in tests (e.g., generated class bodies)
#![cfg_attr(test, allow(clippy::large_stack_arrays, clippy::large_stack_frames))]

/// Load-hook facade and class eligibility
pub mod agent;

/// Class file model, decoder and encoder
#[allow(clippy::cast_possible_truncation)]
pub mod classfile;

/// Instrumentation policy
pub mod config;

/// Control flow, probe injection, counters and reports
#[allow(clippy::missing_errors_doc, clippy::must_use_candidate, clippy::doc_markdown)]
pub mod coverage;

mod result;

pub use result::{BytecovError, BytecovResult, DecodeError, DecodeResult, ErrorKind};

/// Prelude for convenient imports
pub mod prelude {
    pub use super::agent::{ClassFilter, CoverageAgent, PrefixFilter};
    pub use super::classfile::{decode, encode, ClassBuilder, ClassModel, MethodBody};
    pub use super::config::{Granularity, InstrumentConfig, ProbeBridge};
    pub use super::coverage::{
        ClassIdentity, CounterStore, CoverageReport, Diagnostic, DiagnosticAction, LineStatus, MethodStatus,
    };
    pub use super::result::{BytecovError, BytecovResult, ErrorKind};
}
