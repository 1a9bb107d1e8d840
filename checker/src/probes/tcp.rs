//! Kernel TCP protocol counters from `/proc/net/snmp` and `/proc/net/netstat`

use super::{percent, Probe, ProbeContext};
use crate::config::ProbeSettings;
use anyhow::{Context, Result};
use async_trait::async_trait;
use schema::{
    ProbeDetails, ProbeName, ProbeResult, Status, TcpCounters, TcpDetails, TCP_ABORTS_NOTABLE,
    TCP_ERROR_FAIL_RATE, TCP_ERROR_WARN_RATE, TCP_OFO_WARN_RATE, TCP_RETRANS_FAIL_RATE,
    TCP_RETRANS_WARN_RATE,
};
use std::path::PathBuf;
use tracing::{debug, warn};

pub struct TcpStatsProbe {
    proc_root: PathBuf,
}

impl TcpStatsProbe {
    pub fn new(settings: &ProbeSettings) -> Self {
        Self {
            proc_root: settings.proc_root(),
        }
    }
    
    async fn collect(&self) -> Result<TcpCounters> {
        let mut counters = TcpCounters::default();
        
        let snmp_path = self.proc_root.join("net").join("snmp");
        let snmp = tokio::fs::read_to_string(&snmp_path)
            .await
            .with_context(|| format!("failed to read {}", snmp_path.display()))?;
        for (key, value) in parse_proc_table(&snmp, "Tcp:") {
            apply_counter(&mut counters, &key, value);
        }
        
        // Extended counters are optional
        let netstat_path = self.proc_root.join("net").join("netstat");
        match tokio::fs::read_to_string(&netstat_path).await {
            Ok(netstat) => {
                for (key, value) in parse_proc_table(&netstat, "TcpExt:") {
                    apply_counter(&mut counters, &key, value);
                }
            }
            Err(e) => debug!("extended TCP stats unavailable ({}): {}", netstat_path.display(), e),
        }
        
        Ok(counters)
    }
}

#[async_trait]
impl Probe for TcpStatsProbe {
    fn name(&self) -> ProbeName {
        ProbeName::TcpStats
    }
    
    async fn run(&self, _ctx: &ProbeContext, _target: &str) -> ProbeResult {
        if !cfg!(target_os = "linux") {
            return ProbeResult::na(ProbeName::TcpStats, "TCP stats only supported on Linux");
        }
        
        let counters = match self.collect().await {
            Ok(counters) => counters,
            Err(e) => {
                warn!("TCP stats collection failed: {:#}", e);
                return ProbeResult::fail(ProbeName::TcpStats, format!("{:#}", e));
            }
        };
        
        let (status, details) = evaluate(counters);
        ProbeResult::new(ProbeName::TcpStats, status).with_details(ProbeDetails::TcpStats(details))
    }
}

/// Derive rates from the raw counters and classify them
pub fn evaluate(stats: TcpCounters) -> (Status, TcpDetails) {
    let retransmission_rate = percent(stats.retrans_segs, stats.out_segs);
    let error_rate = percent(stats.in_errs, stats.in_segs);
    let out_of_order_rate = percent(stats.tcp_ofo_queue, stats.in_segs);
    let total_reorder = stats.total_reorder();
    
    let mut status = Status::Ok;
    let mut issues = Vec::new();
    
    if retransmission_rate > TCP_RETRANS_FAIL_RATE {
        status = status.escalate(Status::Fail);
        issues.push(format!("high retransmission rate: {:.2}%", retransmission_rate));
    } else if retransmission_rate > TCP_RETRANS_WARN_RATE {
        status = status.escalate(Status::Warn);
        issues.push(format!("elevated retransmission rate: {:.2}%", retransmission_rate));
    }
    
    if error_rate > TCP_ERROR_FAIL_RATE {
        status = status.escalate(Status::Fail);
        issues.push(format!("high TCP error rate: {:.2}%", error_rate));
    } else if error_rate > TCP_ERROR_WARN_RATE {
        status = status.escalate(Status::Warn);
        issues.push(format!("elevated TCP error rate: {:.2}%", error_rate));
    }
    
    if (total_reorder > 0 || stats.tcp_ofo_queue > 0) && out_of_order_rate > TCP_OFO_WARN_RATE {
        status = status.escalate(Status::Warn);
        issues.push(format!("packet reordering detected: {} events", total_reorder));
    }
    
    let total_aborts = stats.total_aborts();
    if total_aborts > TCP_ABORTS_NOTABLE {
        issues.push(format!("connection aborts: {}", total_aborts));
    }
    
    if stats.tcp_memory_pressures > 0 {
        issues.push(format!("TCP memory pressure events: {}", stats.tcp_memory_pressures));
    }
    
    let details = TcpDetails {
        retransmission_rate,
        error_rate,
        out_of_order_rate,
        total_reorder_events: total_reorder,
        current_connections: stats.curr_estab,
        issues,
        stats,
    };
    (status, details)
}

/// Pair the header and value lines that share `prefix` (e.g. `Tcp:`)
pub fn parse_proc_table(contents: &str, prefix: &str) -> Vec<(String, u64)> {
    let mut lines = contents.lines().filter(|line| line.starts_with(prefix));
    let (Some(header), Some(values)) = (lines.next(), lines.next()) else {
        return Vec::new();
    };
    
    header
        .split_whitespace()
        .zip(values.split_whitespace())
        .skip(1)
        .map(|(key, value)| {
            // MaxConn is -1 on Linux; it is not a counter we keep
            (key.to_string(), value.parse().unwrap_or(0))
        })
        .collect()
}

fn apply_counter(stats: &mut TcpCounters, key: &str, value: u64) {
    let field = match key {
        "ActiveOpens" => &mut stats.active_opens,
        "PassiveOpens" => &mut stats.passive_opens,
        "AttemptFails" => &mut stats.attempt_fails,
        "EstabResets" => &mut stats.estab_resets,
        "CurrEstab" => &mut stats.curr_estab,
        "InSegs" => &mut stats.in_segs,
        "OutSegs" => &mut stats.out_segs,
        "RetransSegs" => &mut stats.retrans_segs,
        "InErrs" => &mut stats.in_errs,
        "OutRsts" => &mut stats.out_rsts,
        "TCPLostRetransmit" => &mut stats.tcp_lost_retransmit,
        "TCPFastRetrans" => &mut stats.tcp_fast_retrans,
        "TCPSlowStartRetrans" => &mut stats.tcp_slow_start_retrans,
        "TCPTimeouts" => &mut stats.tcp_timeouts,
        "TCPFACKReorder" => &mut stats.tcp_fack_reorder,
        "TCPTSReorder" => &mut stats.tcp_ts_reorder,
        "TCPSACKReorder" => &mut stats.tcp_sack_reorder,
        "TCPRenoReorder" => &mut stats.tcp_reno_reorder,
        "TCPDSACKOldSent" => &mut stats.tcp_dsack_old_sent,
        "TCPDSACKOfoSent" => &mut stats.tcp_dsack_ofo_sent,
        "TCPDSACKRecv" => &mut stats.tcp_dsack_recv,
        "TCPDSACKOfoRecv" => &mut stats.tcp_dsack_ofo_recv,
        "TCPOFOQueue" => &mut stats.tcp_ofo_queue,
        "TCPOFODrop" => &mut stats.tcp_ofo_drop,
        "TCPOFOMerge" => &mut stats.tcp_ofo_merge,
        "TCPAbortOnData" => &mut stats.tcp_abort_on_data,
        "TCPAbortOnClose" => &mut stats.tcp_abort_on_close,
        "TCPAbortOnMemory" => &mut stats.tcp_abort_on_memory,
        "TCPAbortOnTimeout" => &mut stats.tcp_abort_on_timeout,
        "TCPAbortOnLinger" => &mut stats.tcp_abort_on_linger,
        "TCPAbortFailed" => &mut stats.tcp_abort_failed,
        "TCPMemoryPressures" => &mut stats.tcp_memory_pressures,
        "PruneCalled" => &mut stats.prune_called,
        "TCPSpuriousRTOs" => &mut stats.tcp_spurious_rtos,
        _ => return,
    };
    *field = value;
}

#[cfg(test)]
mod tests {
    use super::*;
    
    const SNMP: &str = "Ip: Forwarding DefaultTTL InReceives
Ip: 1 64 123456
Tcp: RtoAlgorithm RtoMin RtoMax MaxConn ActiveOpens PassiveOpens AttemptFails EstabResets CurrEstab InSegs OutSegs RetransSegs InErrs OutRsts InCsumErrors
Tcp: 1 200 120000 -1 5000 300 40 25 12 200000 100000 600 20 900 0
Udp: InDatagrams NoPorts
Udp: 1000 2
";
    
    const NETSTAT: &str = "TcpExt: SyncookiesSent TCPOFOQueue TCPSACKReorder TCPAbortOnData TCPAbortOnClose TCPMemoryPressures
TcpExt: 0 4000 150 80 40 2
IpExt: InNoRoutes InTruncatedPkts
IpExt: 0 0
";
    
    fn counters(out_segs: u64, retrans: u64, in_segs: u64, in_errs: u64) -> TcpCounters {
        TcpCounters {
            out_segs,
            retrans_segs: retrans,
            in_segs,
            in_errs,
            ..Default::default()
        }
    }
    
    #[test]
    fn test_parse_snmp_tcp_line() {
        let mut stats = TcpCounters::default();
        for (key, value) in parse_proc_table(SNMP, "Tcp:") {
            apply_counter(&mut stats, &key, value);
        }
        
        assert_eq!(stats.active_opens, 5000);
        assert_eq!(stats.curr_estab, 12);
        assert_eq!(stats.in_segs, 200000);
        assert_eq!(stats.out_segs, 100000);
        assert_eq!(stats.retrans_segs, 600);
        assert_eq!(stats.in_errs, 20);
    }
    
    #[test]
    fn test_parse_missing_prefix() {
        assert!(parse_proc_table(SNMP, "TcpExt:").is_empty());
    }
    
    #[test]
    fn test_retransmission_rate_above_five_percent_fails() {
        let (status, details) = evaluate(counters(10000, 600, 10000, 0));
        assert_eq!(status, Status::Fail);
        assert!((details.retransmission_rate - 6.0).abs() < 1e-9);
        assert_eq!(details.issues, vec!["high retransmission rate: 6.00%"]);
    }
    
    #[test]
    fn test_thresholds() {
        // boundaries stay in the lower band
        assert_eq!(evaluate(counters(10000, 100, 10000, 10)).0, Status::Ok);
        assert_eq!(evaluate(counters(10000, 500, 10000, 0)).0, Status::Warn);
        assert_eq!(evaluate(counters(10000, 0, 10000, 50)).0, Status::Warn);
        assert_eq!(evaluate(counters(10000, 0, 10000, 101)).0, Status::Fail);
        // a WARN from one rate never downgrades a FAIL from the other
        assert_eq!(evaluate(counters(10000, 200, 10000, 500)).0, Status::Fail);
    }
    
    #[test]
    fn test_out_of_order_sets_warn() {
        let stats = TcpCounters {
            in_segs: 10000,
            out_segs: 10000,
            tcp_ofo_queue: 200,
            tcp_sack_reorder: 3,
            ..Default::default()
        };
        let (status, details) = evaluate(stats);
        assert_eq!(status, Status::Warn);
        assert!((details.out_of_order_rate - 2.0).abs() < 1e-9);
        assert_eq!(details.total_reorder_events, 3);
    }
    
    #[test]
    fn test_zero_segments_guarded() {
        let (status, details) = evaluate(TcpCounters { retrans_segs: 10, in_errs: 3, ..Default::default() });
        assert_eq!(details.retransmission_rate, 0.0);
        assert_eq!(details.error_rate, 0.0);
        assert_eq!(status, Status::Ok);
    }
    
    #[test]
    fn test_notable_counters_add_issues_only() {
        let mut stats = counters(100000, 0, 100000, 0);
        for (key, value) in parse_proc_table(NETSTAT, "TcpExt:") {
            apply_counter(&mut stats, &key, value);
        }
        stats.tcp_ofo_queue = 0;
        stats.tcp_abort_on_data = 90;
        stats.tcp_abort_on_close = 40;
        
        let (status, details) = evaluate(stats);
        assert_eq!(status, Status::Ok);
        assert!(details.issues.contains(&"connection aborts: 130".to_string()));
        assert!(details.issues.contains(&"TCP memory pressure events: 2".to_string()));
    }
    
    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_probe_reads_fake_proc_tree() {
        use std::time::Duration;
        use tokio::time::Instant;
        
        let root = tempfile::tempdir().unwrap();
        let net = root.path().join("net");
        std::fs::create_dir_all(&net).unwrap();
        std::fs::write(net.join("snmp"), SNMP).unwrap();
        std::fs::write(net.join("netstat"), NETSTAT).unwrap();
        
        let settings = ProbeSettings {
            proc_path: Some(root.path().to_path_buf()),
            ..Default::default()
        };
        let ctx = ProbeContext::new(Instant::now() + Duration::from_secs(5));
        let result = TcpStatsProbe::new(&settings).run(&ctx, "8.8.8.8").await;
        
        // 600 / 100000 retransmitted, 20 / 200000 bad, 4000 / 200000 out of order
        assert_eq!(result.status, Status::Warn);
        match result.details {
            Some(ProbeDetails::TcpStats(details)) => {
                assert!((details.retransmission_rate - 0.6).abs() < 1e-9);
                assert!((details.out_of_order_rate - 2.0).abs() < 1e-9);
                assert_eq!(details.total_reorder_events, 150);
                assert_eq!(details.stats.tcp_memory_pressures, 2);
            }
            other => panic!("unexpected details: {:?}", other),
        }
    }
}
