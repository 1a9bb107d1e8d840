//! Typed probe details
//!
//! The wire schema carries `details` as an open JSON object. Each probe
//! writes its own shape, so the model keeps one struct per probe and picks
//! the variant from the probe name when parsing. Every field defaults, which
//! lets partially populated details (simulation files, older clients) parse
//! with the missing counters read as zero.

use crate::constants::ProbeName;
use serde::{Deserialize, Serialize};

/// Probe-specific facts attached to a [`crate::ProbeResult`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ProbeDetails {
    Ping(PingDetails),
    Dns(DnsDetails),
    Traceroute(TracerouteDetails),
    InterfaceStats(InterfaceDetails),
    TcpStats(TcpDetails),
    SocketStats(SocketDetails),
    PacketCapture(CaptureDetails),
}

impl ProbeDetails {
    /// Parse a details object for the given probe
    pub fn from_value(name: ProbeName, value: serde_json::Value) -> serde_json::Result<Self> {
        Ok(match name {
            ProbeName::Ping => ProbeDetails::Ping(serde_json::from_value(value)?),
            ProbeName::Dns => ProbeDetails::Dns(serde_json::from_value(value)?),
            ProbeName::Traceroute => ProbeDetails::Traceroute(serde_json::from_value(value)?),
            ProbeName::InterfaceStats => ProbeDetails::InterfaceStats(serde_json::from_value(value)?),
            ProbeName::TcpStats => ProbeDetails::TcpStats(serde_json::from_value(value)?),
            ProbeName::SocketStats => ProbeDetails::SocketStats(serde_json::from_value(value)?),
            ProbeName::PacketCapture => ProbeDetails::PacketCapture(serde_json::from_value(value)?),
        })
    }
    
    /// Human-readable issues recorded by the probe, if it keeps any
    pub fn issues(&self) -> &[String] {
        match self {
            ProbeDetails::TcpStats(d) => &d.issues,
            ProbeDetails::SocketStats(d) => &d.issues,
            ProbeDetails::PacketCapture(d) => &d.issues,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PingDetails {
    /// Combined output of the ping binary
    pub raw: String,
    pub packets_transmitted: u32,
    pub packets_received: u32,
    pub loss_percent: f64,
    /// Average RTT from the summary line, when the platform prints one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rtt_avg_ms: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DnsDetails {
    pub addresses: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TracerouteDetails {
    pub raw: String,
    pub hop_count: u32,
}

/// Counters for one interface from `/proc/net/dev` and sysfs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterfaceCounters {
    pub interface: String,
    
    pub rx_bytes: u64,
    pub rx_packets: u64,
    pub rx_errors: u64,
    pub rx_dropped: u64,
    pub rx_fifo: u64,
    /// Frame alignment errors
    pub rx_frame: u64,
    pub rx_compressed: u64,
    pub rx_multicast: u64,
    
    pub tx_bytes: u64,
    pub tx_packets: u64,
    pub tx_errors: u64,
    pub tx_dropped: u64,
    pub tx_fifo: u64,
    pub tx_collisions: u64,
    pub tx_carrier: u64,
    pub tx_compressed: u64,
    
    // Extended counters, zero when sysfs does not expose them
    pub rx_crc_errors: u64,
    pub rx_length_errors: u64,
    pub rx_over_errors: u64,
    pub rx_missed_errors: u64,
    pub tx_aborted_errors: u64,
    pub tx_heartbeat_errors: u64,
    pub tx_window_errors: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterfaceDetails {
    pub interfaces: Vec<InterfaceCounters>,
    pub total_errors: u64,
    pub total_dropped: u64,
    pub total_packets: u64,
    pub error_rate_percent: f64,
    pub drop_rate_percent: f64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub problem_interfaces: Vec<String>,
}

/// Kernel TCP counters from `/proc/net/snmp` and `/proc/net/netstat`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TcpCounters {
    pub active_opens: u64,
    pub passive_opens: u64,
    pub attempt_fails: u64,
    pub estab_resets: u64,
    pub curr_estab: u64,
    
    pub in_segs: u64,
    pub out_segs: u64,
    pub retrans_segs: u64,
    /// Bad segments received
    pub in_errs: u64,
    pub out_rsts: u64,
    
    pub tcp_lost_retransmit: u64,
    pub tcp_fast_retrans: u64,
    pub tcp_slow_start_retrans: u64,
    pub tcp_timeouts: u64,
    
    pub tcp_fack_reorder: u64,
    pub tcp_ts_reorder: u64,
    pub tcp_sack_reorder: u64,
    pub tcp_reno_reorder: u64,
    
    pub tcp_dsack_old_sent: u64,
    pub tcp_dsack_ofo_sent: u64,
    pub tcp_dsack_recv: u64,
    pub tcp_dsack_ofo_recv: u64,
    
    pub tcp_ofo_queue: u64,
    pub tcp_ofo_drop: u64,
    pub tcp_ofo_merge: u64,
    
    pub tcp_abort_on_data: u64,
    pub tcp_abort_on_close: u64,
    pub tcp_abort_on_memory: u64,
    pub tcp_abort_on_timeout: u64,
    pub tcp_abort_on_linger: u64,
    pub tcp_abort_failed: u64,
    
    pub tcp_memory_pressures: u64,
    pub prune_called: u64,
    pub tcp_spurious_rtos: u64,
}

impl TcpCounters {
    pub fn total_reorder(&self) -> u64 {
        self.tcp_fack_reorder + self.tcp_ts_reorder + self.tcp_sack_reorder + self.tcp_reno_reorder
    }
    
    pub fn total_aborts(&self) -> u64 {
        self.tcp_abort_on_data
            + self.tcp_abort_on_close
            + self.tcp_abort_on_timeout
            + self.tcp_abort_on_memory
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TcpDetails {
    pub stats: TcpCounters,
    /// Percent of sent segments that were retransmitted
    pub retransmission_rate: f64,
    /// Percent of received segments that were bad
    pub error_rate: f64,
    pub out_of_order_rate: f64,
    pub total_reorder_events: u64,
    pub current_connections: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<String>,
}

/// One TCP socket as reported by `ss -ti`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SocketInfo {
    pub local: String,
    pub remote: String,
    pub state: String,
    pub rtt_ms: f64,
    pub rttvar_ms: f64,
    pub retransmits: u32,
    pub send_queue: u64,
    pub recv_queue: u64,
    pub cwnd_segments: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SocketDetails {
    pub sockets: Vec<SocketInfo>,
    pub issues: Vec<String>,
}

/// Counters scraped from a short `tcpdump` capture
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureStats {
    pub duration_seconds: f64,
    pub interface: String,
    pub packet_count: u64,
    
    pub tcp_packets: u64,
    pub tcp_syn_packets: u64,
    pub tcp_fin_packets: u64,
    pub tcp_rst_packets: u64,
    pub tcp_retransmits: u64,
    pub tcp_duplicate_acks: u64,
    pub tcp_out_of_order: u64,
    pub tcp_zero_window: u64,
    pub tcp_window_full: u64,
    pub tcp_keep_alive: u64,
    
    pub icmp_packets: u64,
    pub icmp_unreachable: u64,
    pub icmp_time_exceeded: u64,
    pub icmp_redirect: u64,
    
    pub malformed_packets: u64,
    pub checksum_errors: u64,
    pub fragmented_packets: u64,
}

impl CaptureStats {
    /// Percent of TCP packets flagged as retransmissions, zero without TCP traffic
    pub fn retransmission_rate(&self) -> f64 {
        if self.tcp_packets == 0 {
            return 0.0;
        }
        self.tcp_retransmits as f64 * 100.0 / self.tcp_packets as f64
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureDetails {
    pub stats: CaptureStats,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<String>,
}
