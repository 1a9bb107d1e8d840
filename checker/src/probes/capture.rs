//! Short packet capture with tcpdump, scraped for TCP/ICMP anomalies
//!
//! This is a text heuristic over tcpdump's verbose output, not a dissector:
//! retransmissions, duplicate ACKs and friends are only counted when tcpdump
//! annotates them on the line.

use super::command;
use super::{deadline_after, route, Probe, ProbeContext};
use crate::config::ProbeSettings;
use async_trait::async_trait;
use regex::Regex;
use schema::{
    CaptureDetails, CaptureStats, ProbeDetails, ProbeName, ProbeResult, Status,
    CAPTURE_DUP_ACK_WARN, CAPTURE_OUT_OF_ORDER_WARN, CAPTURE_RETRANS_FAIL_RATE,
    CAPTURE_RETRANS_WARN_RATE, CAPTURE_RST_NOTABLE,
};
use std::io;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::LazyLock;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::time::Instant;
use tracing::{debug, warn};

/// Time reserved after the capture window to parse and report before the run deadline
const REPORT_MARGIN: Duration = Duration::from_millis(250);

/// How long stderr may keep arriving once tcpdump has exited
const STDERR_DRAIN: Duration = Duration::from_millis(200);

static RETRANS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)retrans").expect("valid regex"));
static DUP_ACK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)dup\s*ack|duplicate\s*ack").expect("valid regex"));
static OUT_OF_ORDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)out.of.order|\booo\b").expect("valid regex"));
static ZERO_WINDOW: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bwin 0\b|zero.window").expect("valid regex"));
static WINDOW_FULL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)window.full").expect("valid regex"));
static KEEP_ALIVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)keep.?alive").expect("valid regex"));
static CHECKSUM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)bad\s*cksum|incorrect|checksum").expect("valid regex"));
static MALFORMED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)malformed|truncated|bogus").expect("valid regex"));
static SUMMARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s+packets?\s+captured").expect("valid regex"));

pub struct PacketCaptureProbe {
    duration: Duration,
    max_packets: u32,
}

struct Captured {
    output: String,
    stderr: String,
    status: ExitStatus,
    /// The capture window ran out before tcpdump exited on its own
    window_elapsed: bool,
}

impl PacketCaptureProbe {
    pub fn new(settings: &ProbeSettings) -> Self {
        Self {
            duration: settings.capture_duration(),
            max_packets: settings.capture_max_packets.max(1),
        }
    }
    
    fn args(&self, interface: &str, target: &str) -> Vec<String> {
        let mut args = vec![
            "-l".to_string(),
            "-nn".to_string(),
            "-v".to_string(),
            "-c".to_string(),
            self.max_packets.to_string(),
            "-i".to_string(),
            interface.to_string(),
        ];
        if !target.is_empty() && target != "any" {
            args.push("host".to_string());
            args.push(target.to_string());
        }
        args
    }
}

#[async_trait]
impl Probe for PacketCaptureProbe {
    fn name(&self) -> ProbeName {
        ProbeName::PacketCapture
    }
    
    async fn run(&self, ctx: &ProbeContext, target: &str) -> ProbeResult {
        if !cfg!(any(target_os = "linux", target_os = "macos")) {
            return ProbeResult::na(
                ProbeName::PacketCapture,
                "packet capture only supported on Linux and macOS",
            );
        }
        let Some(tcpdump) = command::locate("tcpdump") else {
            return ProbeResult::na(ProbeName::PacketCapture, "tcpdump not available");
        };
        
        let interface = match route::default_interface(ctx.deadline()).await {
            Ok(interface) => interface,
            Err(e) => {
                debug!("falling back to capture on all interfaces: {:#}", e);
                "any".to_string()
            }
        };
        
        let started = Instant::now();
        let report_by = ctx.deadline().checked_sub(REPORT_MARGIN).unwrap_or(ctx.deadline());
        let window_end = deadline_after(started, self.duration).min(report_by);
        match capture(&tcpdump, &self.args(&interface, target), window_end).await {
            Ok(captured) => report(captured, &interface, started.elapsed()),
            Err(e) => ProbeResult::fail(ProbeName::PacketCapture, format!("failed to run tcpdump: {}", e)),
        }
    }
}

/// Classify what one tcpdump invocation produced
fn report(captured: Captured, interface: &str, elapsed: Duration) -> ProbeResult {
    if is_permission_error(&captured.stderr) {
        return ProbeResult::na(
            ProbeName::PacketCapture,
            "insufficient privileges for packet capture (requires root or CAP_NET_RAW)",
        );
    }
    
    let mut text = captured.output;
    text.push_str(&captured.stderr);
    let mut stats = parse_capture(&text, interface);
    stats.duration_seconds = elapsed.as_secs_f64();
    
    let (status, details) = evaluate(stats);
    let result = ProbeResult::new(ProbeName::PacketCapture, status)
        .with_details(ProbeDetails::PacketCapture(details));
    
    if !captured.window_elapsed && !captured.status.success() {
        warn!("tcpdump exited early with {}", captured.status);
        return result.with_error(captured.stderr.trim());
    }
    result
}

/// Stream tcpdump's output until it exits or the window closes, then stop it
///
/// Never waits past `until`: tcpdump is killed at the window end whether it is
/// still printing, has gone quiet, or has closed stdout without exiting.
async fn capture(program: &Path, args: &[String], until: Instant) -> io::Result<Captured> {
    debug!("capture {:?} {}", program, args.join(" "));
    
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;
    
    // Drained alongside stdout so a full stderr pipe cannot stall tcpdump
    let stderr_reader = child.stderr.take().map(|mut pipe| {
        tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf).await;
            String::from_utf8_lossy(&buf).into_owned()
        })
    });
    
    let mut output = String::new();
    let mut window_elapsed = false;
    if let Some(stdout) = child.stdout.take() {
        let mut lines = BufReader::new(stdout).split(b'\n');
        loop {
            match tokio::time::timeout_at(until, lines.next_segment()).await {
                Ok(Ok(Some(line))) => {
                    output.push_str(&String::from_utf8_lossy(&line));
                    output.push('\n');
                }
                Ok(Ok(None)) => break,
                Ok(Err(e)) => {
                    debug!("stopped reading tcpdump output: {}", e);
                    break;
                }
                Err(_) => {
                    window_elapsed = true;
                    break;
                }
            }
        }
    }
    
    let status = if window_elapsed {
        stop(&mut child).await?
    } else {
        match tokio::time::timeout_at(until, child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                window_elapsed = true;
                stop(&mut child).await?
            }
        }
    };
    
    let stderr = match stderr_reader {
        Some(mut handle) => match tokio::time::timeout(STDERR_DRAIN, &mut handle).await {
            Ok(Ok(text)) => text,
            _ => {
                // A leftover grandchild still holds the pipe
                handle.abort();
                String::new()
            }
        },
        None => String::new(),
    };
    
    Ok(Captured {
        output,
        stderr,
        status,
        window_elapsed,
    })
}

async fn stop(child: &mut Child) -> io::Result<ExitStatus> {
    // Exited between the last read and now is fine too
    let _ = child.start_kill();
    child.wait().await
}

fn is_permission_error(stderr: &str) -> bool {
    let lower = stderr.to_lowercase();
    lower.contains("permission denied")
        || lower.contains("operation not permitted")
        || lower.contains("don't have permission")
}

/// Classify a capture; an empty capture is a WARN, not an OK
pub fn evaluate(stats: CaptureStats) -> (Status, CaptureDetails) {
    let mut status = Status::Ok;
    let mut issues = Vec::new();
    
    if stats.packet_count == 0 {
        status = Status::Warn;
        issues.push("no packets captured (check interface/permissions)".to_string());
        return (status, CaptureDetails { stats, issues });
    }
    
    if stats.tcp_packets > 0 {
        let rate = stats.retransmission_rate();
        if rate > CAPTURE_RETRANS_FAIL_RATE {
            status = status.escalate(Status::Fail);
            issues.push(format!("high retransmission rate: {:.1}%", rate));
        } else if rate > CAPTURE_RETRANS_WARN_RATE {
            status = status.escalate(Status::Warn);
            issues.push(format!("elevated retransmissions: {:.1}%", rate));
        }
    }
    
    if stats.tcp_out_of_order > CAPTURE_OUT_OF_ORDER_WARN {
        status = status.escalate(Status::Warn);
        issues.push(format!("out-of-order packets: {}", stats.tcp_out_of_order));
    }
    
    if stats.tcp_duplicate_acks > CAPTURE_DUP_ACK_WARN {
        status = status.escalate(Status::Warn);
        issues.push(format!(
            "duplicate ACKs: {} (possible packet loss)",
            stats.tcp_duplicate_acks
        ));
    }
    
    if stats.tcp_rst_packets > CAPTURE_RST_NOTABLE {
        issues.push(format!("TCP resets: {}", stats.tcp_rst_packets));
    }
    
    if stats.tcp_zero_window > 0 {
        status = status.escalate(Status::Warn);
        issues.push(format!(
            "TCP zero window events: {} (receiver buffer full)",
            stats.tcp_zero_window
        ));
    }
    
    if stats.malformed_packets > 0 {
        status = status.escalate(Status::Fail);
        issues.push(format!("malformed packets: {}", stats.malformed_packets));
    }
    
    if stats.checksum_errors > 0 {
        status = status.escalate(Status::Fail);
        issues.push(format!("checksum errors: {} (packet corruption)", stats.checksum_errors));
    }
    
    if stats.icmp_unreachable > 0 {
        issues.push(format!("ICMP unreachable: {}", stats.icmp_unreachable));
    }
    
    (status, CaptureDetails { stats, issues })
}

/// Count packets and anomaly markers in tcpdump text output
pub fn parse_capture(output: &str, interface: &str) -> CaptureStats {
    let mut stats = CaptureStats {
        interface: interface.to_string(),
        ..Default::default()
    };
    
    for line in output.lines() {
        if line.contains("IP ") || line.contains("IP6 ") {
            stats.packet_count += 1;
        }
        
        if line.contains("Flags [") {
            stats.tcp_packets += 1;
            if line.contains("Flags [S]") || line.contains("Flags [S.]") {
                stats.tcp_syn_packets += 1;
            }
            if line.contains("Flags [F]") || line.contains("Flags [F.]") {
                stats.tcp_fin_packets += 1;
            }
            if line.contains("Flags [R]") || line.contains("Flags [R.]") {
                stats.tcp_rst_packets += 1;
            }
        }
        
        // -v header lines also name the protocol; count the payload line only
        if line.contains("ICMP") && !line.contains("proto ICMP") {
            stats.icmp_packets += 1;
            if line.contains("unreachable") {
                stats.icmp_unreachable += 1;
            }
            if line.contains("time exceeded") {
                stats.icmp_time_exceeded += 1;
            }
            if line.contains("redirect") {
                stats.icmp_redirect += 1;
            }
        }
        
        let counters = [
            (&*RETRANS, &mut stats.tcp_retransmits),
            (&*DUP_ACK, &mut stats.tcp_duplicate_acks),
            (&*OUT_OF_ORDER, &mut stats.tcp_out_of_order),
            (&*ZERO_WINDOW, &mut stats.tcp_zero_window),
            (&*WINDOW_FULL, &mut stats.tcp_window_full),
            (&*KEEP_ALIVE, &mut stats.tcp_keep_alive),
            (&*CHECKSUM, &mut stats.checksum_errors),
            (&*MALFORMED, &mut stats.malformed_packets),
        ];
        for (pattern, counter) in counters {
            if pattern.is_match(line) {
                *counter += 1;
            }
        }
        
        if line.contains("frag ") {
            stats.fragmented_packets += 1;
        }
    }
    
    // tcpdump's own count is authoritative when it got to print one
    if let Some(count) = SUMMARY
        .captures(output)
        .and_then(|caps| caps[1].parse::<u64>().ok())
    {
        stats.packet_count = count;
    }
    
    stats
}
