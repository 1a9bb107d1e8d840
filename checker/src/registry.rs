//! Probe registry and mode selection

use crate::config::ProbeSettings;
use crate::error::{Result, RunError};
use crate::probes::{self, Probe};
use schema::ProbeName;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use ProbeName::*;

/// Mode aliases and the probes each runs, in run order
const MODES: &[(&[&str], &[ProbeName])] = &[
    (&["ping"], &[Ping]),
    (&["dns"], &[Dns]),
    (&["traceroute"], &[Traceroute]),
    (&["interface", "interface_stats"], &[InterfaceStats]),
    (&["tcp", "tcp_stats"], &[TcpStats]),
    (&["socket", "socket_stats"], &[SocketStats]),
    (&["capture", "packet_capture"], &[PacketCapture]),
    (
        &["packet", "packet_health"],
        &[InterfaceStats, TcpStats, SocketStats, PacketCapture],
    ),
    (&["full", "default", ""], &[Ping, Dns, Traceroute]),
    (
        &["comprehensive", "all"],
        &[Ping, Dns, Traceroute, InterfaceStats, TcpStats, SocketStats, PacketCapture],
    ),
];

/// Every recognised mode string
pub fn mode_names() -> impl Iterator<Item = &'static str> {
    MODES.iter().flat_map(|(aliases, _)| aliases.iter().copied())
}

/// Probe names for a mode (case-insensitive), in run order
pub fn select(mode: &str) -> Result<&'static [ProbeName]> {
    let wanted = mode.to_lowercase();
    MODES
        .iter()
        .find(|(aliases, _)| aliases.contains(&wanted.as_str()))
        .map(|(_, names)| *names)
        .ok_or_else(|| RunError::UnknownMode(mode.to_string()))
}

/// Probe implementations by name
pub struct Registry {
    probes: HashMap<ProbeName, Arc<dyn Probe>>,
}

impl Registry {
    /// Registry of the built-in probes
    pub fn new(settings: &ProbeSettings) -> Self {
        Self::with_probes(probes::builtin(settings))
    }
    
    /// Registry of arbitrary probe implementations; later entries replace earlier ones with the same name
    pub fn with_probes(probes: impl IntoIterator<Item = Arc<dyn Probe>>) -> Self {
        let probes = probes.into_iter().map(|p| (p.name(), p)).collect();
        Self { probes }
    }
    
    /// Resolve a mode to probe instances, in run order
    pub fn select(&self, mode: &str) -> Result<Vec<Arc<dyn Probe>>> {
        let selected = select(mode)?
            .iter()
            .filter_map(|name| {
                let probe = self.probes.get(name).cloned();
                if probe.is_none() {
                    debug!("probe {} not registered, skipping", name);
                }
                probe
            })
            .collect();
        Ok(selected)
    }
}
