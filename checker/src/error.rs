//! Run-level error types

use std::time::Duration;
use thiserror::Error;

/// Errors that abort a whole run; individual probe failures never surface here
#[derive(Error, Debug)]
pub enum RunError {
    #[error("Unknown mode: {0}")]
    UnknownMode(String),
    
    #[error("Run deadline exceeded after {0:?}")]
    DeadlineExceeded(Duration),
    
    #[error("Failed to read simulation file: {0}")]
    SimulationIo(#[from] std::io::Error),
    
    #[error("Invalid simulation file: {0}")]
    SimulationFormat(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RunError>;
