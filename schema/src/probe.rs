//! Probe result data structures

use crate::constants::ProbeName;
use crate::details::ProbeDetails;
use crate::error::SchemaError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Outcome class of a single probe execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Warn,
    Fail,
    /// Probe could not run here (missing tool, privilege or platform)
    Na,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Ok => "ok",
            Status::Warn => "warn",
            Status::Fail => "fail",
            Status::Na => "na",
        }
    }
    
    /// Whether the probe counts toward the weighted score
    pub fn is_scored(self) -> bool {
        !matches!(self, Status::Na)
    }
    
    /// WARN or FAIL
    pub fn is_problem(self) -> bool {
        matches!(self, Status::Warn | Status::Fail)
    }
    
    /// The more severe of two scored statuses (OK < WARN < FAIL)
    pub fn escalate(self, other: Status) -> Status {
        fn rank(status: Status) -> u8 {
            match status {
                Status::Na => 0,
                Status::Ok => 1,
                Status::Warn => 2,
                Status::Fail => 3,
            }
        }
        if rank(other) > rank(self) { other } else { self }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = SchemaError;
    
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ok" => Ok(Status::Ok),
            "warn" => Ok(Status::Warn),
            "fail" => Ok(Status::Fail),
            "na" => Ok(Status::Na),
            other => Err(SchemaError::UnknownStatus(other.to_string())),
        }
    }
}

/// Outcome of one probe execution within a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireProbeResult")]
pub struct ProbeResult {
    pub name: ProbeName,
    
    pub status: Status,
    
    /// Round-trip or completion time in milliseconds, for connectivity probes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<f64>,
    
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<ProbeDetails>,
    
    /// Human-readable failure or unavailability reason
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProbeResult {
    pub fn new(name: ProbeName, status: Status) -> Self {
        Self {
            name,
            status,
            latency_ms: None,
            details: None,
            error: None,
        }
    }
    
    pub fn ok(name: ProbeName) -> Self {
        Self::new(name, Status::Ok)
    }
    
    pub fn fail(name: ProbeName, error: impl Into<String>) -> Self {
        Self::new(name, Status::Fail).with_error(error)
    }
    
    pub fn na(name: ProbeName, reason: impl Into<String>) -> Self {
        Self::new(name, Status::Na).with_error(reason)
    }
    
    /// FAIL result for a probe that ran into the run deadline
    pub fn timeout(name: ProbeName) -> Self {
        Self::fail(name, format!("{} timeout", name))
    }
    
    pub fn with_latency(mut self, latency_ms: f64) -> Self {
        self.latency_ms = Some(latency_ms);
        self
    }
    
    pub fn with_details(mut self, details: ProbeDetails) -> Self {
        self.details = Some(details);
        self
    }
    
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        let error = error.into();
        self.error = if error.is_empty() { None } else { Some(error) };
        self
    }
}

/// Loose shape accepted from JSON before details are typed by probe name
#[derive(Deserialize)]
struct WireProbeResult {
    name: ProbeName,
    status: Status,
    #[serde(default)]
    latency_ms: Option<f64>,
    #[serde(default)]
    details: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<String>,
}

impl From<WireProbeResult> for ProbeResult {
    fn from(wire: WireProbeResult) -> Self {
        // Details that do not fit the probe's shape are dropped, not fatal
        let details = wire
            .details
            .filter(|value| !value.is_null())
            .and_then(|value| ProbeDetails::from_value(wire.name, value).ok());
        
        Self {
            name: wire.name,
            status: wire.status,
            latency_ms: wire.latency_ms,
            details,
            error: wire.error.filter(|e| !e.is_empty()),
        }
    }
}
