//! Probe names, default weights, status thresholds and rule confidences

use crate::error::SchemaError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Every probe the checker knows how to run, in canonical registry order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeName {
    /// ICMP echo via the system `ping` binary
    Ping,
    
    /// Name resolution through the system resolver
    Dns,
    
    /// Path discovery via `traceroute`/`tracepath`
    Traceroute,
    
    /// Interface error/drop counters (Linux only)
    InterfaceStats,
    
    /// Kernel TCP protocol counters (Linux only)
    TcpStats,
    
    /// Per-socket TCP info via `ss` (Linux only)
    SocketStats,
    
    /// Short `tcpdump` capture scraped for anomalies
    PacketCapture,
}

impl ProbeName {
    pub const ALL: [ProbeName; 7] = [
        ProbeName::Ping,
        ProbeName::Dns,
        ProbeName::Traceroute,
        ProbeName::InterfaceStats,
        ProbeName::TcpStats,
        ProbeName::SocketStats,
        ProbeName::PacketCapture,
    ];
    
    pub fn as_str(self) -> &'static str {
        match self {
            ProbeName::Ping => "ping",
            ProbeName::Dns => "dns",
            ProbeName::Traceroute => "traceroute",
            ProbeName::InterfaceStats => "interface_stats",
            ProbeName::TcpStats => "tcp_stats",
            ProbeName::SocketStats => "socket_stats",
            ProbeName::PacketCapture => "packet_capture",
        }
    }
    
    /// Default scoring weight
    pub fn default_weight(self) -> f64 {
        match self {
            ProbeName::InterfaceStats | ProbeName::TcpStats => 1.2,
            ProbeName::Traceroute | ProbeName::SocketStats => 0.8,
            ProbeName::Ping | ProbeName::Dns | ProbeName::PacketCapture => 1.0,
        }
    }
    
    /// Probes whose non-OK status marks the run as having packet-level issues
    pub fn is_packet_level(self) -> bool {
        matches!(
            self,
            ProbeName::InterfaceStats | ProbeName::TcpStats | ProbeName::PacketCapture
        )
    }
}

impl fmt::Display for ProbeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProbeName {
    type Err = SchemaError;
    
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProbeName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| SchemaError::UnknownProbe(s.to_string()))
    }
}

/// Health contribution of a WARN probe, relative to 100 for OK
pub const WARN_HEALTH: f64 = 60.0;

/// Health contribution of an OK probe
pub const OK_HEALTH: f64 = 100.0;

/// Summary bands on the health value (100 = healthy)
pub const BAND_EXCELLENT: f64 = 90.0;
pub const BAND_GOOD: f64 = 70.0;
pub const BAND_DEGRADED: f64 = 50.0;

// Interface counters (percent of packets)
pub const INTERFACE_WARN_RATE: f64 = 0.1;
pub const INTERFACE_FAIL_RATE: f64 = 1.0;

// TCP counters (percent of segments)
pub const TCP_RETRANS_WARN_RATE: f64 = 1.0;
pub const TCP_RETRANS_FAIL_RATE: f64 = 5.0;
pub const TCP_ERROR_WARN_RATE: f64 = 0.1;
pub const TCP_ERROR_FAIL_RATE: f64 = 1.0;
pub const TCP_OFO_WARN_RATE: f64 = 1.0;
pub const TCP_REORDER_EVENTS_WARN: u64 = 100;
pub const TCP_ABORTS_NOTABLE: u64 = 100;

// Socket info
pub const SOCKET_RETRANS_WARN: u32 = 5;
pub const SOCKET_RTT_NOTABLE_MS: f64 = 200.0;

// Packet capture
pub const CAPTURE_RETRANS_WARN_RATE: f64 = 1.0;
pub const CAPTURE_RETRANS_FAIL_RATE: f64 = 5.0;
pub const CAPTURE_OUT_OF_ORDER_WARN: u64 = 10;
pub const CAPTURE_DUP_ACK_WARN: u64 = 20;
pub const CAPTURE_RST_NOTABLE: u64 = 10;
pub const CAPTURE_ZERO_WINDOW_DIAGNOSE: u64 = 10;
pub const CAPTURE_PATH_RETRANSMITS: u64 = 50;
pub const CAPTURE_PATH_OUT_OF_ORDER: u64 = 20;

/// Fixed confidence per diagnostic rule
pub mod confidence {
    pub const CONNECTIVITY_FAIL: f64 = 0.9;
    pub const DNS_FAIL: f64 = 0.9;
    pub const ROUTING_FAIL: f64 = 0.8;
    pub const INTERFACE_ERRORS_CRITICAL: f64 = 0.9;
    pub const INTERFACE_ERRORS_WARNING: f64 = 0.8;
    pub const INTERFACE_DROPS_CRITICAL: f64 = 0.85;
    pub const TCP_RETRANS_CRITICAL: f64 = 0.9;
    pub const TCP_RETRANS_WARNING: f64 = 0.8;
    pub const TCP_ERRORS_CRITICAL: f64 = 0.85;
    pub const TCP_ERRORS_WARNING: f64 = 0.8;
    pub const TCP_REORDERING: f64 = 0.8;
    pub const SOCKET_RETRANSMITS: f64 = 0.8;
    pub const CAPTURE_CHECKSUM: f64 = 0.95;
    pub const CAPTURE_MALFORMED: f64 = 0.9;
    pub const CAPTURE_ZERO_WINDOW: f64 = 0.85;
    pub const CAPTURE_PATH: f64 = 0.8;
    pub const PROBE_STATUS: f64 = 0.8;
    pub const OVERALL_HEALTHY: f64 = 0.95;
    pub const OVERALL_MINOR: f64 = 0.9;
    pub const OVERALL_DEGRADED: f64 = 0.85;
    pub const NO_DATA: f64 = 0.95;
}
