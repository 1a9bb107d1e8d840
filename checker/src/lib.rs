//! ISP Checker
//!
//! Runs a set of network diagnostic probes against a target concurrently,
//! scores the results and explains what they mean. The [`Orchestrator`]
//! is the entry point; [`simulation`] replays recorded runs instead.

pub mod analysis;
pub mod config;
pub mod error;
pub mod metrics;
pub mod orchestrator;
pub mod output;
pub mod probes;
pub mod registry;
pub mod simulation;

pub use analysis::{Analysis, Analyzer, Weights};
pub use config::Config;
pub use error::{Result, RunError};
pub use orchestrator::Orchestrator;
pub use registry::{select, Registry};
