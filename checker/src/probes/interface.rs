//! Interface error and drop counters from procfs/sysfs

use super::{percent, Probe, ProbeContext};
use crate::config::ProbeSettings;
use anyhow::{Context, Result};
use async_trait::async_trait;
use schema::{
    InterfaceCounters, InterfaceDetails, ProbeDetails, ProbeName, ProbeResult, Status,
    INTERFACE_FAIL_RATE, INTERFACE_WARN_RATE,
};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub struct InterfaceStatsProbe {
    proc_root: PathBuf,
    sys_root: PathBuf,
}

impl InterfaceStatsProbe {
    pub fn new(settings: &ProbeSettings) -> Self {
        Self {
            proc_root: settings.proc_root(),
            sys_root: settings.sys_root(),
        }
    }
    
    async fn collect(&self) -> Result<Vec<InterfaceCounters>> {
        let path = self.proc_root.join("net").join("dev");
        let contents = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("failed to open {}", path.display()))?;
        
        let mut interfaces = parse_proc_net_dev(&contents);
        for counters in &mut interfaces {
            read_extended_counters(&self.sys_root, counters).await;
        }
        Ok(interfaces)
    }
}

#[async_trait]
impl Probe for InterfaceStatsProbe {
    fn name(&self) -> ProbeName {
        ProbeName::InterfaceStats
    }
    
    async fn run(&self, _ctx: &ProbeContext, _target: &str) -> ProbeResult {
        if !cfg!(target_os = "linux") {
            return ProbeResult::na(
                ProbeName::InterfaceStats,
                "interface stats only supported on Linux",
            );
        }
        
        let interfaces = match self.collect().await {
            Ok(interfaces) => interfaces,
            Err(e) => {
                warn!("interface stats collection failed: {:#}", e);
                return ProbeResult::fail(ProbeName::InterfaceStats, format!("{:#}", e));
            }
        };
        
        let (status, details) = evaluate(interfaces);
        debug!(
            "interfaces: {:.3}% errors, {:.3}% drops over {} packets",
            details.error_rate_percent, details.drop_rate_percent, details.total_packets
        );
        
        ProbeResult::new(ProbeName::InterfaceStats, status)
            .with_details(ProbeDetails::InterfaceStats(details))
    }
}

/// Loopback and container plumbing that says nothing about the uplink
fn is_virtual(interface: &str) -> bool {
    interface == "lo"
        || interface.starts_with("veth")
        || interface.starts_with("docker")
        || interface.starts_with("br-")
}

/// Aggregate physical interface counters and classify them
pub fn evaluate(interfaces: Vec<InterfaceCounters>) -> (Status, InterfaceDetails) {
    let mut details = InterfaceDetails::default();
    
    for s in interfaces.iter().filter(|s| !is_virtual(&s.interface)) {
        let errors = s.rx_errors + s.tx_errors + s.rx_crc_errors + s.rx_frame;
        let dropped = s.rx_dropped + s.tx_dropped;
        
        details.total_errors += errors;
        details.total_dropped += dropped;
        details.total_packets += s.rx_packets + s.tx_packets;
        
        if errors > 0 || dropped > 0 {
            details.problem_interfaces.push(s.interface.clone());
        }
    }
    
    details.error_rate_percent = percent(details.total_errors, details.total_packets);
    details.drop_rate_percent = percent(details.total_dropped, details.total_packets);
    details.interfaces = interfaces;
    
    let worst = details.error_rate_percent.max(details.drop_rate_percent);
    let status = if worst > INTERFACE_FAIL_RATE {
        Status::Fail
    } else if worst > INTERFACE_WARN_RATE {
        Status::Warn
    } else {
        Status::Ok
    };
    
    (status, details)
}

/// Parse `/proc/net/dev`: two header lines, then `iface: 8 rx fields 8 tx fields`
pub fn parse_proc_net_dev(contents: &str) -> Vec<InterfaceCounters> {
    contents
        .lines()
        .skip(2)
        .filter_map(|line| {
            let (name, rest) = line.trim().split_once(':')?;
            let fields: Vec<u64> = rest
                .split_whitespace()
                .map(|f| f.parse().unwrap_or(0))
                .collect();
            if fields.len() < 16 {
                return None;
            }
            
            Some(InterfaceCounters {
                interface: name.trim().to_string(),
                rx_bytes: fields[0],
                rx_packets: fields[1],
                rx_errors: fields[2],
                rx_dropped: fields[3],
                rx_fifo: fields[4],
                rx_frame: fields[5],
                rx_compressed: fields[6],
                rx_multicast: fields[7],
                tx_bytes: fields[8],
                tx_packets: fields[9],
                tx_errors: fields[10],
                tx_dropped: fields[11],
                tx_fifo: fields[12],
                tx_collisions: fields[13],
                tx_carrier: fields[14],
                tx_compressed: fields[15],
                ..Default::default()
            })
        })
        .collect()
}

async fn read_extended_counters(sys_root: &Path, counters: &mut InterfaceCounters) {
    let base = sys_root
        .join("class")
        .join("net")
        .join(&counters.interface)
        .join("statistics");
    
    counters.rx_crc_errors = read_counter(&base.join("rx_crc_errors")).await;
    counters.rx_length_errors = read_counter(&base.join("rx_length_errors")).await;
    counters.rx_over_errors = read_counter(&base.join("rx_over_errors")).await;
    counters.rx_missed_errors = read_counter(&base.join("rx_missed_errors")).await;
    counters.tx_aborted_errors = read_counter(&base.join("tx_aborted_errors")).await;
    counters.tx_heartbeat_errors = read_counter(&base.join("tx_heartbeat_errors")).await;
    counters.tx_window_errors = read_counter(&base.join("tx_window_errors")).await;
}

/// A single sysfs counter; absent or unreadable counters read as zero
async fn read_counter(path: &Path) -> u64 {
    match tokio::fs::read_to_string(path).await {
        Ok(data) => data.trim().parse().unwrap_or(0),
        Err(_) => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::Instant;
    
    const PROC_NET_DEV: &str = "Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
    lo: 1000000    5000    0    0    0     0          0         0  1000000    5000    0    0    0     0       0          0
  eth0: 9000000   60000   30    0    0     0          0       120  4000000   40000    0    0    0     0       0          0
docker0:  50000     500  400  400    0     0          0         0    50000     500    0    0    0     0       0          0
";
    
    fn counters(name: &str, packets: u64, errors: u64, dropped: u64) -> InterfaceCounters {
        InterfaceCounters {
            interface: name.to_string(),
            rx_packets: packets,
            rx_errors: errors,
            rx_dropped: dropped,
            ..Default::default()
        }
    }
    
    #[test]
    fn test_parse_proc_net_dev() {
        let interfaces = parse_proc_net_dev(PROC_NET_DEV);
        assert_eq!(interfaces.len(), 3);
        
        let eth0 = &interfaces[1];
        assert_eq!(eth0.interface, "eth0");
        assert_eq!(eth0.rx_packets, 60000);
        assert_eq!(eth0.rx_errors, 30);
        assert_eq!(eth0.rx_multicast, 120);
        assert_eq!(eth0.tx_packets, 40000);
    }
    
    #[test]
    fn test_evaluate_skips_virtual_interfaces() {
        let (status, details) = evaluate(parse_proc_net_dev(PROC_NET_DEV));
        
        // only eth0 counts: 30 errors over 100000 packets
        assert_eq!(details.total_packets, 100000);
        assert_eq!(details.total_errors, 30);
        assert!((details.error_rate_percent - 0.03).abs() < 1e-9);
        assert_eq!(details.problem_interfaces, vec!["eth0"]);
        assert_eq!(status, Status::Ok);
    }
    
    #[test]
    fn test_evaluate_thresholds() {
        // exactly 0.1% stays OK
        let (status, _) = evaluate(vec![counters("eth0", 10000, 10, 0)]);
        assert_eq!(status, Status::Ok);
        
        let (status, details) = evaluate(vec![counters("eth0", 10000, 45, 0)]);
        assert_eq!(status, Status::Warn);
        assert!((details.error_rate_percent - 0.45).abs() < 1e-9);
        
        // exactly 1.0% is still WARN
        let (status, _) = evaluate(vec![counters("eth0", 10000, 0, 100)]);
        assert_eq!(status, Status::Warn);
        
        let (status, _) = evaluate(vec![counters("eth0", 10000, 0, 150)]);
        assert_eq!(status, Status::Fail);
    }
    
    #[test]
    fn test_evaluate_no_packets() {
        let (status, details) = evaluate(vec![counters("eth0", 0, 5, 0)]);
        assert_eq!(details.error_rate_percent, 0.0);
        assert_eq!(status, Status::Ok);
    }
    
    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_probe_reads_fake_proc_tree() {
        let root = tempfile::tempdir().unwrap();
        let proc_net = root.path().join("proc").join("net");
        std::fs::create_dir_all(&proc_net).unwrap();
        std::fs::write(proc_net.join("dev"), PROC_NET_DEV).unwrap();
        
        let stats_dir = root.path().join("sys/class/net/eth0/statistics");
        std::fs::create_dir_all(&stats_dir).unwrap();
        std::fs::write(stats_dir.join("rx_crc_errors"), "1970\n").unwrap();
        
        let settings = ProbeSettings {
            proc_path: Some(root.path().join("proc")),
            sys_path: Some(root.path().join("sys")),
            ..Default::default()
        };
        let ctx = ProbeContext::new(Instant::now() + Duration::from_secs(5));
        let result = InterfaceStatsProbe::new(&settings).run(&ctx, "8.8.8.8").await;
        
        // 30 + 1970 errors over 100000 packets = 2%
        assert_eq!(result.status, Status::Fail);
        match result.details {
            Some(ProbeDetails::InterfaceStats(details)) => {
                assert_eq!(details.total_errors, 2000);
            }
            other => panic!("unexpected details: {:?}", other),
        }
    }
    
    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_probe_missing_procfs_fails() {
        let root = tempfile::tempdir().unwrap();
        let settings = ProbeSettings {
            proc_path: Some(root.path().to_path_buf()),
            ..Default::default()
        };
        let ctx = ProbeContext::new(Instant::now() + Duration::from_secs(5));
        let result = InterfaceStatsProbe::new(&settings).run(&ctx, "8.8.8.8").await;
        
        assert_eq!(result.status, Status::Fail);
        assert!(result.error.unwrap().contains("failed to open"));
    }
    
    #[cfg(not(target_os = "linux"))]
    #[tokio::test]
    async fn test_probe_unavailable_off_linux() {
        let ctx = ProbeContext::new(Instant::now() + Duration::from_secs(5));
        let result = InterfaceStatsProbe::new(&ProbeSettings::default()).run(&ctx, "8.8.8.8").await;
        assert_eq!(result.status, Status::Na);
    }
}
