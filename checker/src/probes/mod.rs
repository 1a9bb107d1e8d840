//! Diagnostic probes
//!
//! Each probe is a self-contained check that turns a target into exactly one
//! [`ProbeResult`]. Probes never return errors: missing tools, unsupported
//! platforms and missing privileges become NA, everything else that goes
//! wrong becomes FAIL.

mod capture;
mod command;
mod dns;
mod interface;
mod ping;
mod route;
mod socket;
mod tcp;
mod traceroute;

pub use capture::PacketCaptureProbe;
pub use dns::DnsProbe;
pub use interface::InterfaceStatsProbe;
pub use ping::PingProbe;
pub use socket::SocketStatsProbe;
pub use tcp::TcpStatsProbe;
pub use traceroute::TracerouteProbe;

use crate::config::ProbeSettings;
use async_trait::async_trait;
use schema::{ProbeName, ProbeResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Per-run context handed to every probe
#[derive(Debug, Clone, Copy)]
pub struct ProbeContext {
    deadline: Instant,
}

impl ProbeContext {
    pub fn new(deadline: Instant) -> Self {
        Self { deadline }
    }
    
    /// Shared run deadline; probes must report a timeout rather than run past it
    pub fn deadline(&self) -> Instant {
        self.deadline
    }
}

/// Longest wait any deadline is pushed out to
const MAX_WAIT: Duration = Duration::from_secs(24 * 60 * 60);

/// `start + wait`, capped at one day so oversized timeouts cannot overflow
pub(crate) fn deadline_after(start: Instant, wait: Duration) -> Instant {
    start + wait.min(MAX_WAIT)
}

#[async_trait]
pub trait Probe: Send + Sync {
    fn name(&self) -> ProbeName;
    
    async fn run(&self, ctx: &ProbeContext, target: &str) -> ProbeResult;
}

/// All built-in probes, in canonical order
pub fn builtin(settings: &ProbeSettings) -> Vec<Arc<dyn Probe>> {
    vec![
        Arc::new(PingProbe::new(settings)),
        Arc::new(DnsProbe),
        Arc::new(TracerouteProbe),
        Arc::new(InterfaceStatsProbe::new(settings)),
        Arc::new(TcpStatsProbe::new(settings)),
        Arc::new(SocketStatsProbe),
        Arc::new(PacketCaptureProbe::new(settings)),
    ]
}

/// `part / whole` as a percentage, zero when there is nothing to divide by
pub(crate) fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    part as f64 * 100.0 / whole as f64
}
