//! ISP Checker Schema Library
//!
//! Shared data model for diagnostic runs: probe results, typed probe details,
//! diagnoses and the run record, plus the constant tables (weights,
//! thresholds, rule confidences) every consumer must agree on.
//! Serialises to and from the JSON wire schema consumed by the backend.

pub mod constants;
pub mod details;
pub mod error;
pub mod probe;
pub mod run;

pub use constants::*;
pub use details::*;
pub use error::SchemaError;
pub use probe::{ProbeResult, Status};
pub use run::{Component, DiagnosticResult, Run, Severity};

/// Schema version written into the `raw` section of every run
pub const SCHEMA_VERSION: u8 = 1;
