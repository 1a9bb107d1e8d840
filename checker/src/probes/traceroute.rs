//! Path discovery via traceroute or tracepath

use super::command::{self, CommandOutcome};
use super::{Probe, ProbeContext};
use async_trait::async_trait;
use schema::{ProbeDetails, ProbeName, ProbeResult, TracerouteDetails};
use tokio::time::Instant;

const CANDIDATES: [&str; 2] = ["traceroute", "tracepath"];

pub struct TracerouteProbe;

#[async_trait]
impl Probe for TracerouteProbe {
    fn name(&self) -> ProbeName {
        ProbeName::Traceroute
    }
    
    async fn run(&self, ctx: &ProbeContext, target: &str) -> ProbeResult {
        let Some(path) = CANDIDATES.iter().find_map(|bin| command::locate(bin)) else {
            return ProbeResult::na(ProbeName::Traceroute, "traceroute/tracepath not available");
        };
        
        let started = Instant::now();
        let output = match command::run_until(&path, &[target.to_string()], ctx.deadline()).await {
            CommandOutcome::Finished(output) => output,
            CommandOutcome::TimedOut => return ProbeResult::timeout(ProbeName::Traceroute),
            CommandOutcome::SpawnFailed(e) => {
                return ProbeResult::fail(
                    ProbeName::Traceroute,
                    format!("failed to run {:?}: {}", path, e),
                );
            }
        };
        
        let text = command::combined_output(&output);
        if !output.status.success() {
            return ProbeResult::fail(ProbeName::Traceroute, text.trim());
        }
        
        let details = TracerouteDetails {
            hop_count: count_hops(&text),
            raw: text,
        };
        ProbeResult::ok(ProbeName::Traceroute)
            .with_latency(started.elapsed().as_secs_f64() * 1000.0)
            .with_details(ProbeDetails::Traceroute(details))
    }
}

/// Highest hop number printed (`traceroute` prints `N  host`, `tracepath` prints `N:  host`)
fn count_hops(output: &str) -> u32 {
    output
        .lines()
        .filter_map(|line| {
            let token = line.split_whitespace().next()?;
            token.trim_end_matches([':', '?']).parse::<u32>().ok()
        })
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    
    #[test]
    fn test_count_hops_traceroute() {
        let output = "traceroute to 8.8.8.8 (8.8.8.8), 30 hops max, 60 byte packets
 1  _gateway (192.168.1.1)  0.512 ms  0.480 ms  0.470 ms
 2  10.20.0.1 (10.20.0.1)  8.103 ms  8.090 ms  8.080 ms
 3  * * *
 4  dns.google (8.8.8.8)  10.220 ms  10.1 ms  10.3 ms
";
        assert_eq!(count_hops(output), 4);
    }
    
    #[test]
    fn test_count_hops_tracepath() {
        let output = " 1?: [LOCALHOST]                      pmtu 1500
 1:  _gateway                                              0.512ms
 2:  10.20.0.1                                             8.103ms
     Resume: pmtu 1500 hops 2 back 2
";
        assert_eq!(count_hops(output), 2);
    }
    
    #[test]
    fn test_count_hops_empty() {
        assert_eq!(count_hops(""), 0);
    }
}
