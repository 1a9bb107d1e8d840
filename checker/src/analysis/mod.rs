//! Scoring and diagnosis of probe results

mod diagnosis;
mod scoring;

pub use diagnosis::DiagnosticEngine;
pub use scoring::{Assessment, Band, Scorer, Weights};

use schema::{DiagnosticResult, ProbeResult, Severity};
use tracing::{info, warn};

/// Score, summary and diagnoses for one set of results
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub assessment: Assessment,
    pub diagnosis: Vec<DiagnosticResult>,
}

pub struct Analyzer {
    scorer: Scorer,
    engine: DiagnosticEngine,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new(Weights::default())
    }
}

impl Analyzer {
    pub fn new(weights: Weights) -> Self {
        Self {
            scorer: Scorer::new(weights),
            engine: DiagnosticEngine::new(),
        }
    }
    
    pub fn score(&self, results: &[ProbeResult]) -> Assessment {
        self.scorer.score(results)
    }
    
    pub fn diagnose(&self, results: &[ProbeResult], assessment: &Assessment) -> Vec<DiagnosticResult> {
        self.engine.diagnose(results, assessment)
    }
    
    pub fn analyze(&self, results: &[ProbeResult]) -> Analysis {
        let assessment = self.score(results);
        let diagnosis = self.diagnose(results, &assessment);
        
        for d in &diagnosis {
            match d.severity {
                Severity::Critical => warn!("CRITICAL {}: {}", d.component, d.explanation),
                Severity::Warning => warn!("{}: {}", d.component, d.explanation),
                Severity::Info => info!("{}: {}", d.component, d.explanation),
            }
        }
        
        Analysis { assessment, diagnosis }
    }
}
