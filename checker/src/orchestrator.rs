//! Concurrent probe execution against a shared deadline

use crate::analysis::{Analyzer, Weights};
use crate::config::Config;
use crate::error::{Result, RunError};
use crate::metrics::{EventSink, RunEvent};
use crate::probes::{deadline_after, ProbeContext};
use crate::registry::Registry;
use chrono::Utc;
use schema::{ProbeResult, Run, Status};
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// How long past the deadline stragglers may take to report before the run is abandoned
pub const DEFAULT_GRACE: Duration = Duration::from_millis(500);

pub struct Orchestrator {
    registry: Registry,
    analyzer: Analyzer,
    events: Option<EventSink>,
    grace: Duration,
}

impl Orchestrator {
    pub fn new(registry: Registry, analyzer: Analyzer) -> Self {
        Self {
            registry,
            analyzer,
            events: None,
            grace: DEFAULT_GRACE,
        }
    }
    
    /// Built-in probes with settings, weights and grace period from the config
    pub fn from_config(config: &Config) -> Self {
        let weights = Weights::with_overrides(&config.weights);
        Self::new(Registry::new(&config.probes), Analyzer::new(weights)).with_grace(config.grace())
    }
    
    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = Some(events);
        self
    }
    
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }
    
    pub fn analyzer(&self) -> &Analyzer {
        &self.analyzer
    }
    
    /// Run every probe of `mode` against `target` concurrently and assemble the run
    ///
    /// Each probe is cut off at `now + timeout` and reported as a FAIL timeout. If
    /// the probes still have not all reported once the grace period has passed,
    /// the run is abandoned with [`RunError::DeadlineExceeded`].
    pub async fn execute(&self, target: &str, mode: &str, timeout: Duration) -> Result<Run> {
        let probes = self.registry.select(mode)?;
        let names: Vec<_> = probes.iter().map(|p| p.name()).collect();
        info!("Starting {} run against {} ({} probes, timeout {:?})", mode, target, probes.len(), timeout);
        
        let deadline = deadline_after(Instant::now(), timeout);
        let ctx = ProbeContext::new(deadline);
        
        let mut tasks = JoinSet::new();
        for (index, probe) in probes.into_iter().enumerate() {
            let target = target.to_string();
            tasks.spawn(async move {
                let name = probe.name();
                let started = Instant::now();
                let result = match timeout_at(deadline, probe.run(&ctx, &target)).await {
                    Ok(result) => result,
                    Err(_) => ProbeResult::timeout(name),
                };
                match result.status {
                    Status::Fail => warn!(
                        "{} failed: {}",
                        name,
                        result.error.as_deref().unwrap_or("see details")
                    ),
                    Status::Na => debug!(
                        "{} unavailable: {}",
                        name,
                        result.error.as_deref().unwrap_or("unknown reason")
                    ),
                    status => debug!("{} finished with {} in {:?}", name, status, started.elapsed()),
                }
                (index, result)
            });
        }
        
        let mut slots: Vec<Option<ProbeResult>> = vec![None; names.len()];
        let collected = timeout_at(deadline_after(deadline, self.grace), async {
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok((index, result)) => {
                        self.emit(RunEvent::ProbeCompleted {
                            probe: result.name,
                            status: result.status,
                        });
                        slots[index] = Some(result);
                    }
                    Err(e) => error!("Probe task failed: {}", e),
                }
            }
        })
        .await;
        
        if collected.is_err() {
            tasks.abort_all();
            error!("Probes still running {:?} past the deadline, abandoning run", self.grace);
            return Err(RunError::DeadlineExceeded(timeout));
        }
        
        // A slot is only empty when its task panicked
        let results: Vec<ProbeResult> = slots
            .into_iter()
            .zip(&names)
            .map(|(slot, name)| {
                slot.unwrap_or_else(|| {
                    let result = ProbeResult::fail(*name, format!("{} probe crashed", name));
                    self.emit(RunEvent::ProbeCompleted {
                        probe: result.name,
                        status: result.status,
                    });
                    result
                })
            })
            .collect();
        
        let analysis = self.analyzer.analyze(&results);
        let run = Run {
            run_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now().to_rfc3339(),
            target: target.to_string(),
            mode: mode.to_string(),
            score: analysis.assessment.score,
            summary: analysis.assessment.summary.clone(),
            probes: results,
            diagnosis: analysis.diagnosis,
            raw: analysis.assessment.breakdown(),
        };
        
        info!("Run {} complete: score {:.1} ({})", run.run_id, run.score, run.summary);
        self.emit(RunEvent::RunCompleted {
            run_id: run.run_id.clone(),
            score: run.score,
        });
        Ok(run)
    }
    
    fn emit(&self, event: RunEvent) {
        if let Some(events) = &self.events {
            events.emit(event);
        }
    }
}
