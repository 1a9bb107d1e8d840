//! Run events and Prometheus counters

use schema::{ProbeName, Status};
use std::collections::BTreeMap;
use std::fmt::Write;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    ProbeCompleted { probe: ProbeName, status: Status },
    RunCompleted { run_id: String, score: f64 },
}

/// Fire-and-forget sender for run events
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<RunEvent>,
}

impl EventSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<RunEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
    
    /// Never blocks; events are dropped once the receiver is gone
    pub fn emit(&self, event: RunEvent) {
        let _ = self.tx.send(event);
    }
}

/// Event totals since process start
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Counters {
    runs: u64,
    last_score: Option<f64>,
    probe_results: BTreeMap<(ProbeName, Status), u64>,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }
    
    pub fn record(&mut self, event: &RunEvent) {
        match event {
            RunEvent::ProbeCompleted { probe, status } => {
                *self.probe_results.entry((*probe, *status)).or_insert(0) += 1;
            }
            RunEvent::RunCompleted { score, .. } => {
                self.runs += 1;
                self.last_score = Some(*score);
            }
        }
    }
    
    /// Record every event already queued on the receiver
    pub fn drain(&mut self, rx: &mut mpsc::UnboundedReceiver<RunEvent>) {
        while let Ok(event) = rx.try_recv() {
            self.record(&event);
        }
    }
    
    pub fn runs(&self) -> u64 {
        self.runs
    }
    
    pub fn probe_results(&self, probe: ProbeName, status: Status) -> u64 {
        self.probe_results.get(&(probe, status)).copied().unwrap_or(0)
    }
    
    /// Prometheus text exposition format
    pub fn render(&self) -> String {
        let mut out = String::new();
        
        let _ = writeln!(out, "# HELP isp_checker_runs_total Completed diagnostic runs");
        let _ = writeln!(out, "# TYPE isp_checker_runs_total counter");
        let _ = writeln!(out, "isp_checker_runs_total {}", self.runs);
        
        let _ = writeln!(out, "# HELP isp_checker_probe_results_total Probe results by probe and status");
        let _ = writeln!(out, "# TYPE isp_checker_probe_results_total counter");
        for ((probe, status), count) in &self.probe_results {
            let _ = writeln!(
                out,
                "isp_checker_probe_results_total{{probe=\"{}\",status=\"{}\"}} {}",
                probe, status, count
            );
        }
        
        if let Some(score) = self.last_score {
            let _ = writeln!(out, "# HELP isp_checker_last_score Score of the most recent run (0 = healthy)");
            let _ = writeln!(out, "# TYPE isp_checker_last_score gauge");
            let _ = writeln!(out, "isp_checker_last_score {}", score);
        }
        out
    }
}
