//! Command handlers - extracted from main.rs for testability
//!
//! Each handler module contains the execution logic for one command and
//! the pure helpers it renders with.

pub mod inspect;
pub mod instrument;
pub mod verify;

pub use inspect::{execute_inspect, inspect_class, render_inspection, ClassInspection};
pub use instrument::{
    default_output_path, execute_instrument, instrument_bytes, instrument_config, render_summary, InstrumentSummary,
};
pub use verify::{collect_inputs, execute_verify, verify_bytes};
