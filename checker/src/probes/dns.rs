//! Name resolution through the system resolver

use super::{Probe, ProbeContext};
use async_trait::async_trait;
use schema::{DnsDetails, ProbeDetails, ProbeName, ProbeResult};
use std::collections::HashSet;
use std::net::SocketAddr;
use tokio::time::Instant;
use tracing::debug;

pub struct DnsProbe;

#[async_trait]
impl Probe for DnsProbe {
    fn name(&self) -> ProbeName {
        ProbeName::Dns
    }
    
    async fn run(&self, ctx: &ProbeContext, target: &str) -> ProbeResult {
        let started = Instant::now();
        
        let lookup = tokio::net::lookup_host((target, 0));
        let addrs = match tokio::time::timeout_at(ctx.deadline(), lookup).await {
            Ok(Ok(addrs)) => addrs,
            Ok(Err(e)) => return ProbeResult::fail(ProbeName::Dns, e.to_string()),
            Err(_) => return ProbeResult::timeout(ProbeName::Dns),
        };
        
        let addresses = unique_addresses(addrs);
        if addresses.is_empty() {
            return ProbeResult::fail(ProbeName::Dns, format!("no addresses found for {}", target));
        }
        
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
        debug!("dns {} -> {:?} in {:.2}ms", target, addresses, latency_ms);
        
        ProbeResult::ok(ProbeName::Dns)
            .with_latency(latency_ms)
            .with_details(ProbeDetails::Dns(DnsDetails { addresses }))
    }
}

/// IP addresses in resolver order, each once
fn unique_addresses(addrs: impl IntoIterator<Item = SocketAddr>) -> Vec<String> {
    let mut seen = HashSet::new();
    addrs
        .into_iter()
        .map(|addr| addr.ip().to_string())
        .filter(|ip| seen.insert(ip.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use schema::Status;
    use std::time::Duration;
    
    #[tokio::test]
    async fn test_resolves_ip_literal() {
        let ctx = ProbeContext::new(Instant::now() + Duration::from_secs(5));
        let result = DnsProbe.run(&ctx, "127.0.0.1").await;
        
        assert_eq!(result.status, Status::Ok);
        match result.details {
            Some(ProbeDetails::Dns(details)) => assert_eq!(details.addresses, vec!["127.0.0.1"]),
            other => panic!("unexpected details: {:?}", other),
        }
    }
    
    #[test]
    fn test_duplicate_addresses_removed_in_order() {
        let addrs: Vec<SocketAddr> = ["10.0.0.2:0", "10.0.0.1:0", "10.0.0.2:0", "[::1]:0", "10.0.0.1:0"]
            .iter()
            .map(|a| a.parse().unwrap())
            .collect();
        assert_eq!(unique_addresses(addrs), vec!["10.0.0.2", "10.0.0.1", "::1"]);
    }
    
    #[tokio::test]
    async fn test_invalid_name_fails() {
        let ctx = ProbeContext::new(Instant::now() + Duration::from_secs(10));
        let result = DnsProbe.run(&ctx, "name with spaces.invalid").await;
        
        assert!(matches!(result.status, Status::Fail));
        assert!(result.error.is_some());
    }
}
