//! Per-connection TCP health from `ss -ti`

use super::command::{self, CommandOutcome};
use super::{Probe, ProbeContext};
use async_trait::async_trait;
use regex::Regex;
use schema::{
    ProbeDetails, ProbeName, ProbeResult, SocketDetails, SocketInfo, Status, SOCKET_RETRANS_WARN,
    SOCKET_RTT_NOTABLE_MS,
};
use std::sync::LazyLock;

static RTT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\brtt:(\d+\.?\d*)/(\d+\.?\d*)").expect("valid regex"));
static RETRANS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bretrans:(\d+)/(\d+)").expect("valid regex"));
static CWND: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bcwnd:(\d+)").expect("valid regex"));

const STATE_PREFIXES: [&str; 6] = ["ESTAB", "SYN-", "FIN-", "TIME-", "CLOSE", "LAST-ACK"];

pub struct SocketStatsProbe;

#[async_trait]
impl Probe for SocketStatsProbe {
    fn name(&self) -> ProbeName {
        ProbeName::SocketStats
    }
    
    async fn run(&self, ctx: &ProbeContext, target: &str) -> ProbeResult {
        if !cfg!(target_os = "linux") {
            return ProbeResult::na(ProbeName::SocketStats, "socket stats only supported on Linux");
        }
        let Some(ss) = command::locate("ss") else {
            return ProbeResult::na(ProbeName::SocketStats, "ss command not available");
        };
        
        let mut args = vec!["-ti".to_string()];
        if !target.is_empty() {
            args.push("dst".to_string());
            args.push(target.to_string());
        }
        
        let output = match command::run_until(&ss, &args, ctx.deadline()).await {
            CommandOutcome::Finished(output) if output.status.success() => output,
            CommandOutcome::Finished(output) => {
                return ProbeResult::fail(
                    ProbeName::SocketStats,
                    format!(
                        "ss command failed: {} {}",
                        output.status,
                        String::from_utf8_lossy(&output.stderr).trim()
                    ),
                );
            }
            CommandOutcome::TimedOut => return ProbeResult::timeout(ProbeName::SocketStats),
            CommandOutcome::SpawnFailed(e) => {
                return ProbeResult::fail(ProbeName::SocketStats, format!("ss command failed: {}", e));
            }
        };
        
        let sockets = parse_socket_stats(&String::from_utf8_lossy(&output.stdout));
        let (status, details) = evaluate(sockets);
        ProbeResult::new(ProbeName::SocketStats, status)
            .with_details(ProbeDetails::SocketStats(details))
    }
}

pub fn evaluate(sockets: Vec<SocketInfo>) -> (Status, SocketDetails) {
    let mut status = Status::Ok;
    let mut issues = Vec::new();
    
    for s in &sockets {
        if s.retransmits > SOCKET_RETRANS_WARN {
            status = Status::Warn;
            issues.push(format!("socket {}->{}: {} retransmits", s.local, s.remote, s.retransmits));
        }
        if s.rtt_ms > SOCKET_RTT_NOTABLE_MS {
            issues.push(format!("socket {}->{}: high RTT {:.1}ms", s.local, s.remote, s.rtt_ms));
        }
    }
    
    (status, SocketDetails { sockets, issues })
}

/// Parse `ss -ti`: a state line per socket followed by an indented info line
pub fn parse_socket_stats(output: &str) -> Vec<SocketInfo> {
    let mut sockets = Vec::new();
    let mut current: Option<SocketInfo> = None;
    
    for line in output.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if STATE_PREFIXES.iter().any(|prefix| line.starts_with(prefix)) {
            sockets.extend(current.take());
            
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() >= 5 {
                current = Some(SocketInfo {
                    state: fields[0].to_string(),
                    recv_queue: fields[1].parse().unwrap_or(0),
                    send_queue: fields[2].parse().unwrap_or(0),
                    local: fields[3].to_string(),
                    remote: fields[4].to_string(),
                    ..Default::default()
                });
            }
            continue;
        }
        
        let Some(socket) = current.as_mut() else { continue };
        if let Some(caps) = RTT.captures(line) {
            socket.rtt_ms = caps[1].parse().unwrap_or(0.0);
            socket.rttvar_ms = caps[2].parse().unwrap_or(0.0);
        }
        if let Some(caps) = RETRANS.captures(line) {
            socket.retransmits = caps[2].parse().unwrap_or(0);
        }
        if let Some(caps) = CWND.captures(line) {
            socket.cwnd_segments = caps[1].parse().unwrap_or(0);
        }
    }
    
    sockets.extend(current);
    sockets
}
