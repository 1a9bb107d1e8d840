//! Weighted probe scoring

use schema::{
    ProbeName, ProbeResult, Status, BAND_DEGRADED, BAND_EXCELLENT, BAND_GOOD, OK_HEALTH,
    WARN_HEALTH,
};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap};

/// Scoring weight per probe
#[derive(Debug, Clone, PartialEq)]
pub struct Weights {
    table: HashMap<ProbeName, f64>,
}

impl Default for Weights {
    fn default() -> Self {
        let table = ProbeName::ALL
            .into_iter()
            .map(|name| (name, name.default_weight()))
            .collect();
        Self { table }
    }
}

impl Weights {
    /// Defaults with the given per-probe overrides applied
    pub fn with_overrides(overrides: &BTreeMap<ProbeName, f64>) -> Self {
        let mut weights = Self::default();
        for (name, weight) in overrides {
            weights.table.insert(*name, *weight);
        }
        weights
    }
    
    pub fn get(&self, name: ProbeName) -> f64 {
        self.table
            .get(&name)
            .copied()
            .unwrap_or_else(|| name.default_weight())
    }
}

/// Health band on the 0-100 health value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Band {
    Excellent,
    Good,
    Degraded,
    Critical,
    /// Nothing scorable ran
    NoData,
}

impl Band {
    fn from_health(health: f64) -> Self {
        if health >= BAND_EXCELLENT {
            Band::Excellent
        } else if health >= BAND_GOOD {
            Band::Good
        } else if health >= BAND_DEGRADED {
            Band::Degraded
        } else {
            Band::Critical
        }
    }
    
    pub fn label(self) -> &'static str {
        match self {
            Band::Excellent => "excellent",
            Band::Good => "good - minor issues",
            Band::Degraded => "degraded",
            Band::Critical => "critical",
            Band::NoData => "no data",
        }
    }
}

/// Result of scoring one set of probe results
#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    /// 0 = healthy, 100 = total failure
    pub score: f64,
    /// 100 = healthy; `100 - score` except when nothing was scored
    pub health: f64,
    pub band: Band,
    pub summary: String,
    pub total_weight: f64,
    pub scored_probes: usize,
    pub unavailable_probes: usize,
}

impl Assessment {
    /// Breakdown for the run's `raw` field
    pub fn breakdown(&self) -> Map<String, Value> {
        let mut raw = Map::new();
        raw.insert("schema_version".to_string(), json!(schema::SCHEMA_VERSION));
        raw.insert("health".to_string(), json!(self.health));
        raw.insert("total_weight".to_string(), json!(self.total_weight));
        raw.insert("scored_probes".to_string(), json!(self.scored_probes));
        raw.insert("unavailable_probes".to_string(), json!(self.unavailable_probes));
        raw
    }
}

pub struct Scorer {
    weights: Weights,
}

impl Scorer {
    pub fn new(weights: Weights) -> Self {
        Self { weights }
    }
    
    pub fn score(&self, results: &[ProbeResult]) -> Assessment {
        let mut accumulated = 0.0;
        let mut total_weight = 0.0;
        let mut scored = 0;
        let mut ok = 0;
        let mut packet_issues = false;
        
        for result in results {
            if !result.status.is_scored() {
                continue;
            }
            let weight = self.weights.get(result.name);
            total_weight += weight;
            scored += 1;
            
            accumulated += weight
                * match result.status {
                    Status::Ok => OK_HEALTH,
                    Status::Warn => WARN_HEALTH,
                    Status::Fail | Status::Na => 0.0,
                };
            
            if result.status == Status::Ok {
                ok += 1;
            } else if result.name.is_packet_level() {
                packet_issues = true;
            }
        }
        let unavailable = results.len() - scored;
        
        if total_weight <= 0.0 {
            let summary = if unavailable > 0 {
                format!("no probes executed ({} unavailable)", unavailable)
            } else {
                "no probes executed".to_string()
            };
            return Assessment {
                score: 0.0,
                health: 0.0,
                band: Band::NoData,
                summary,
                total_weight: 0.0,
                scored_probes: scored,
                unavailable_probes: unavailable,
            };
        }
        
        let health = (accumulated / total_weight).clamp(0.0, 100.0);
        let band = Band::from_health(health);
        
        let mut summary = format!(
            "network health {}: {}/{} probes ok (health {:.1}/100)",
            band.label(),
            ok,
            scored,
            health
        );
        if unavailable > 0 {
            summary.push_str(&format!(", {} unavailable", unavailable));
        }
        if packet_issues {
            summary.push_str("; packet-level issues detected");
        }
        
        Assessment {
            score: 100.0 - health,
            health,
            band,
            summary,
            total_weight,
            scored_probes: scored,
            unavailable_probes: unavailable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ProbeName::*;
    
    fn result(name: ProbeName, status: Status) -> ProbeResult {
        ProbeResult::new(name, status)
    }
    
    fn scorer() -> Scorer {
        Scorer::new(Weights::default())
    }
    
    #[test]
    fn test_all_ok_is_excellent() {
        let assessment = scorer().score(&[
            result(Ping, Status::Ok),
            result(Dns, Status::Ok),
            result(Traceroute, Status::Ok),
        ]);
        assert_eq!(assessment.score, 0.0);
        assert_eq!(assessment.health, 100.0);
        assert_eq!(assessment.band, Band::Excellent);
        assert_eq!(assessment.summary, "network health excellent: 3/3 probes ok (health 100.0/100)");
    }
    
    #[test]
    fn test_weighted_mix() {
        // ping ok 100, tcp warn 1.2 * 60, traceroute fail 0 over 3.0
        let assessment = scorer().score(&[
            result(Ping, Status::Ok),
            result(TcpStats, Status::Warn),
            result(Traceroute, Status::Fail),
        ]);
        let health = (100.0 + 72.0) / 3.0;
        assert!((assessment.health - health).abs() < 1e-9);
        assert!((assessment.score - (100.0 - health)).abs() < 1e-9);
        assert_eq!(assessment.band, Band::Degraded);
        assert!(assessment.summary.ends_with("; packet-level issues detected"));
    }
    
    #[test]
    fn test_na_excluded_from_denominator() {
        let with_na = scorer().score(&[
            result(Ping, Status::Ok),
            result(InterfaceStats, Status::Na),
        ]);
        let without = scorer().score(&[result(Ping, Status::Ok)]);
        
        assert_eq!(with_na.score, without.score);
        assert_eq!(with_na.total_weight, 1.0);
        assert_eq!(with_na.unavailable_probes, 1);
        assert!(!with_na.summary.contains("packet-level"));
    }
    
    #[test]
    fn test_all_na_matches_empty() {
        let empty = scorer().score(&[]);
        let all_na = scorer().score(&[result(TcpStats, Status::Na), result(SocketStats, Status::Na)]);
        
        assert_eq!(empty.score, 0.0);
        assert_eq!(empty.health, 0.0);
        assert_eq!(empty.band, Band::NoData);
        assert_eq!(empty.summary, "no probes executed");
        assert_eq!(all_na.score, empty.score);
        assert_eq!(all_na.band, Band::NoData);
    }
    
    #[test]
    fn test_fail_strictly_raises_score() {
        let statuses = [Status::Ok, Status::Warn, Status::Fail, Status::Na];
        for name in ProbeName::ALL {
            for other in statuses {
                let base = vec![result(Dns, other), result(name, Status::Ok)];
                let failed = vec![result(Dns, other), result(name, Status::Fail)];
                assert!(
                    scorer().score(&failed).score > scorer().score(&base).score,
                    "{} FAIL should worsen score next to dns {}",
                    name,
                    other
                );
            }
        }
    }
    
    #[test]
    fn test_score_bounds() {
        let statuses = [Status::Ok, Status::Warn, Status::Fail, Status::Na];
        for a in statuses {
            for b in statuses {
                for c in statuses {
                    let assessment = scorer().score(&[
                        result(Ping, a),
                        result(InterfaceStats, b),
                        result(SocketStats, c),
                    ]);
                    assert!((0.0..=100.0).contains(&assessment.score));
                }
            }
        }
    }
    
    #[test]
    fn test_weight_overrides() {
        let mut overrides = BTreeMap::new();
        overrides.insert(Ping, 3.0);
        let scorer = Scorer::new(Weights::with_overrides(&overrides));
        
        // 3.0 * 100 / (3.0 + 1.0)
        let assessment = scorer.score(&[result(Ping, Status::Ok), result(Dns, Status::Fail)]);
        assert!((assessment.health - 75.0).abs() < 1e-9);
        assert_eq!(assessment.band, Band::Good);
    }
    
    #[test]
    fn test_band_boundaries() {
        assert_eq!(Band::from_health(90.0), Band::Excellent);
        assert_eq!(Band::from_health(89.99), Band::Good);
        assert_eq!(Band::from_health(70.0), Band::Good);
        assert_eq!(Band::from_health(50.0), Band::Degraded);
        assert_eq!(Band::from_health(49.9), Band::Critical);
    }
}
