//! Run and diagnosis records

use crate::error::SchemaError;
use crate::probe::ProbeResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Severity of a diagnosis, ordered from least to most severe
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Info,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = SchemaError;
    
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "info" => Ok(Severity::Info),
            "warning" => Ok(Severity::Warning),
            "critical" => Ok(Severity::Critical),
            other => Err(SchemaError::UnknownSeverity(other.to_string())),
        }
    }
}

/// Part of the network stack a diagnosis is about
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Component {
    Connectivity,
    #[serde(rename = "DNS")]
    Dns,
    Routing,
    NetworkInterface,
    #[serde(rename = "TCPTransport")]
    TcpTransport,
    SocketHealth,
    PacketIntegrity,
    #[serde(rename = "TCPFlow")]
    TcpFlow,
    NetworkPath,
    PacketCapture,
    Overall,
    /// Labels written by other producers that this build does not know
    #[default]
    #[serde(other)]
    Unknown,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Component::Connectivity => "Connectivity",
            Component::Dns => "DNS",
            Component::Routing => "Routing",
            Component::NetworkInterface => "NetworkInterface",
            Component::TcpTransport => "TCPTransport",
            Component::SocketHealth => "SocketHealth",
            Component::PacketIntegrity => "PacketIntegrity",
            Component::TcpFlow => "TCPFlow",
            Component::NetworkPath => "NetworkPath",
            Component::PacketCapture => "PacketCapture",
            Component::Overall => "Overall",
            Component::Unknown => "Unknown",
        };
        f.write_str(label)
    }
}

/// One explained issue or health statement
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticResult {
    pub component: Component,
    
    /// Rule confidence in [0, 1]
    pub confidence: f64,
    
    /// What was observed, including the numbers that triggered it
    pub explanation: String,
    
    pub suggested_action: String,
    
    pub severity: Severity,
}

impl DiagnosticResult {
    pub fn new(
        component: Component,
        severity: Severity,
        confidence: f64,
        explanation: impl Into<String>,
        suggested_action: impl Into<String>,
    ) -> Self {
        Self {
            component,
            confidence,
            explanation: explanation.into(),
            suggested_action: suggested_action.into(),
            severity,
        }
    }
}

/// One complete diagnostic session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub run_id: String,
    
    /// RFC 3339, UTC
    pub timestamp: String,
    
    pub target: String,
    
    pub mode: String,
    
    /// 0 = healthy, 100 = total failure
    pub score: f64,
    
    pub summary: String,
    
    /// Probe results in registry order
    pub probes: Vec<ProbeResult>,
    
    pub diagnosis: Vec<DiagnosticResult>,
    
    /// Scoring breakdown
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub raw: serde_json::Map<String, serde_json::Value>,
}

impl Run {
    /// Pretty JSON in the external wire schema
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
