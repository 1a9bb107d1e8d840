//! Schema error types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Unknown probe name: {0}")]
    UnknownProbe(String),
    
    #[error("Unknown probe status: {0}")]
    UnknownStatus(String),
    
    #[error("Unknown severity: {0}")]
    UnknownSeverity(String),
}
