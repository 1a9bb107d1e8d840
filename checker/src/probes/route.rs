//! Default route detection

use super::command::{self, CommandOutcome};
use anyhow::Result;
use tokio::time::Instant;
use tracing::debug;

/// Interface carrying the default route (`ip route` on Linux, `route` on macOS)
pub async fn default_interface(deadline: Instant) -> Result<String> {
    let (binary, args, parse): (&str, &[&str], fn(&str) -> Option<String>) = if cfg!(target_os = "macos") {
        ("route", &["-n", "get", "default"], parse_route_get)
    } else {
        ("ip", &["route", "show", "default"], parse_ip_route)
    };
    
    let Some(path) = command::locate(binary) else {
        anyhow::bail!("'{}' not available", binary);
    };
    let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
    
    let output = match command::run_until(&path, &args, deadline).await {
        CommandOutcome::Finished(output) if output.status.success() => output,
        CommandOutcome::Finished(output) => anyhow::bail!("'{}' exited with {}", binary, output.status),
        CommandOutcome::TimedOut => anyhow::bail!("'{}' timed out", binary),
        CommandOutcome::SpawnFailed(e) => anyhow::bail!("failed to execute '{}': {}", binary, e),
    };
    
    let stdout = String::from_utf8_lossy(&output.stdout);
    debug!("Default route output: {}", stdout.trim());
    
    parse(&stdout).ok_or_else(|| anyhow::anyhow!("Could not parse default interface from '{}' output", binary))
}

/// `default via 192.168.1.1 dev eth0 proto dhcp metric 100`
fn parse_ip_route(output: &str) -> Option<String> {
    output
        .lines()
        .filter(|line| line.starts_with("default"))
        .find_map(|line| {
            let parts: Vec<&str> = line.split_whitespace().collect();
            let dev_idx = parts.iter().position(|&p| p == "dev")?;
            parts.get(dev_idx + 1).map(|iface| iface.to_string())
        })
}

/// `   interface: en0`
fn parse_route_get(output: &str) -> Option<String> {
    output
        .lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix("interface:"))
        .map(|iface| iface.trim().to_string())
        .filter(|iface| !iface.is_empty())
}
