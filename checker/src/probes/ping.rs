//! ICMP reachability via the system ping binary

use super::command::{self, CommandOutcome};
use super::{Probe, ProbeContext};
use crate::config::ProbeSettings;
use async_trait::async_trait;
use regex::Regex;
use schema::{PingDetails, ProbeDetails, ProbeName, ProbeResult};
use std::sync::LazyLock;
use tokio::time::Instant;
use tracing::debug;

static TRANSMITTED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+) packets transmitted, (\d+) (?:packets )?received").expect("valid regex")
});
static SENT_RECEIVED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Sent = (\d+), Received = (\d+)").expect("valid regex"));
static LOSS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([\d.]+)% (?:packet )?loss").expect("valid regex"));
static RTT_SUMMARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"min/avg/max/\w+ = [\d.]+/([\d.]+)/").expect("valid regex"));
static WINDOWS_AVERAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Average = (\d+)ms").expect("valid regex"));

pub struct PingProbe {
    count: u32,
    wait_secs: u32,
}

impl PingProbe {
    pub fn new(settings: &ProbeSettings) -> Self {
        Self {
            count: settings.ping_count.max(1),
            wait_secs: settings.ping_wait_secs.max(1),
        }
    }
    
    fn args(&self, target: &str) -> Vec<String> {
        if cfg!(target_os = "windows") {
            vec!["-n".to_string(), self.count.to_string(), target.to_string()]
        } else {
            vec![
                "-c".to_string(),
                self.count.to_string(),
                "-w".to_string(),
                self.wait_secs.to_string(),
                target.to_string(),
            ]
        }
    }
}

#[async_trait]
impl Probe for PingProbe {
    fn name(&self) -> ProbeName {
        ProbeName::Ping
    }
    
    async fn run(&self, ctx: &ProbeContext, target: &str) -> ProbeResult {
        let Some(path) = command::locate("ping") else {
            return ProbeResult::na(ProbeName::Ping, "ping binary not available");
        };
        
        let started = Instant::now();
        let output = match command::run_until(&path, &self.args(target), ctx.deadline()).await {
            CommandOutcome::Finished(output) => output,
            CommandOutcome::TimedOut => return ProbeResult::timeout(ProbeName::Ping),
            CommandOutcome::SpawnFailed(e) => {
                return ProbeResult::fail(ProbeName::Ping, format!("failed to run ping: {}", e));
            }
        };
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        
        let text = command::combined_output(&output);
        let details = parse_ping_output(&text);
        
        if !output.status.success() {
            let message = match text.trim() {
                "" => format!("ping exited with {}", output.status),
                trimmed => trimmed.to_string(),
            };
            return ProbeResult::fail(ProbeName::Ping, message)
                .with_details(ProbeDetails::Ping(details));
        }
        
        let latency_ms = details.rtt_avg_ms.unwrap_or(elapsed_ms);
        debug!("ping {} -> {:.2}ms, {:.1}% loss", target, latency_ms, details.loss_percent);
        
        ProbeResult::ok(ProbeName::Ping)
            .with_latency(latency_ms)
            .with_details(ProbeDetails::Ping(details))
    }
}

/// Pull counts, loss and average RTT out of ping's summary lines
pub fn parse_ping_output(output: &str) -> PingDetails {
    let mut details = PingDetails {
        raw: output.to_string(),
        ..Default::default()
    };
    
    let counts = TRANSMITTED
        .captures(output)
        .or_else(|| SENT_RECEIVED.captures(output));
    if let Some(caps) = counts {
        details.packets_transmitted = caps[1].parse().unwrap_or(0);
        details.packets_received = caps[2].parse().unwrap_or(0);
    }
    
    if let Some(caps) = LOSS.captures(output) {
        details.loss_percent = caps[1].parse().unwrap_or(0.0);
    } else if details.packets_transmitted > 0 {
        let lost = details.packets_transmitted.saturating_sub(details.packets_received);
        details.loss_percent = lost as f64 / details.packets_transmitted as f64 * 100.0;
    }
    
    details.rtt_avg_ms = RTT_SUMMARY
        .captures(output)
        .or_else(|| WINDOWS_AVERAGE.captures(output))
        .and_then(|caps| caps[1].parse().ok());
    
    details
}

#[cfg(test)]
mod tests {
    use super::*;
    
    const LINUX_OK: &str = "PING 8.8.8.8 (8.8.8.8) 56(84) bytes of data.
64 bytes from 8.8.8.8: icmp_seq=1 ttl=117 time=9.81 ms
64 bytes from 8.8.8.8: icmp_seq=2 ttl=117 time=10.2 ms
64 bytes from 8.8.8.8: icmp_seq=3 ttl=117 time=10.4 ms

--- 8.8.8.8 ping statistics ---
3 packets transmitted, 3 received, 0% packet loss, time 2003ms
rtt min/avg/max/mdev = 9.810/10.137/10.400/0.245 ms
";
    
    const MACOS_LOSS: &str = "--- 10.0.0.99 ping statistics ---
3 packets transmitted, 1 packets received, 66.7% packet loss
round-trip min/avg/max/stddev = 4.100/4.100/4.100/0.000 ms
";
    
    #[test]
    fn test_parse_linux_summary() {
        let details = parse_ping_output(LINUX_OK);
        assert_eq!(details.packets_transmitted, 3);
        assert_eq!(details.packets_received, 3);
        assert_eq!(details.loss_percent, 0.0);
        assert_eq!(details.rtt_avg_ms, Some(10.137));
    }
    
    #[test]
    fn test_parse_macos_loss() {
        let details = parse_ping_output(MACOS_LOSS);
        assert_eq!(details.packets_received, 1);
        assert_eq!(details.loss_percent, 66.7);
        assert_eq!(details.rtt_avg_ms, Some(4.1));
    }
    
    #[test]
    fn test_parse_unreachable_has_no_rtt() {
        let details = parse_ping_output(
            "3 packets transmitted, 0 received, +3 errors, 100% packet loss, time 2031ms\n",
        );
        assert_eq!(details.loss_percent, 100.0);
        assert_eq!(details.rtt_avg_ms, None);
    }
    
    #[test]
    fn test_args_bound_wait() {
        let probe = PingProbe::new(&ProbeSettings::default());
        let args = probe.args("example.com");
        assert_eq!(args.last().map(String::as_str), Some("example.com"));
        if !cfg!(target_os = "windows") {
            assert_eq!(args, vec!["-c", "3", "-w", "4", "example.com"]);
        }
    }
}
