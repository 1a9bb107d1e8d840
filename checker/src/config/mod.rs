//! Configuration management

use anyhow::{Context, Result};
use schema::ProbeName;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub probes: ProbeSettings,
    /// Per-probe weight overrides, keyed by probe name
    #[serde(default)]
    pub weights: BTreeMap<ProbeName, f64>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeneralConfig {
    #[serde(default = "default_target")]
    pub target: String,
    #[serde(default = "default_mode")]
    pub mode: String,
    /// Run-level deadline
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// How long past the deadline the orchestrator waits for probes to report their own timeout
    #[serde(default = "default_grace_ms")]
    pub grace_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProbeSettings {
    #[serde(default = "default_ping_count")]
    pub ping_count: u32,
    #[serde(default = "default_ping_wait_secs")]
    pub ping_wait_secs: u32,
    #[serde(default = "default_capture_duration_secs")]
    pub capture_duration_secs: u64,
    #[serde(default = "default_capture_max_packets")]
    pub capture_max_packets: u32,
    /// Host procfs mount, for running inside a container
    #[serde(default)]
    pub proc_path: Option<PathBuf>,
    #[serde(default)]
    pub sys_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_target() -> String {
    "8.8.8.8".to_string()
}

fn default_mode() -> String {
    "full".to_string()
}

fn default_timeout_secs() -> u64 {
    25
}

fn default_grace_ms() -> u64 {
    500
}

fn default_ping_count() -> u32 {
    3
}

fn default_ping_wait_secs() -> u32 {
    4
}

fn default_capture_duration_secs() -> u64 {
    10
}

fn default_capture_max_packets() -> u32 {
    1000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            target: default_target(),
            mode: default_mode(),
            timeout_secs: default_timeout_secs(),
            grace_ms: default_grace_ms(),
        }
    }
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            ping_count: default_ping_count(),
            ping_wait_secs: default_ping_wait_secs(),
            capture_duration_secs: default_capture_duration_secs(),
            capture_max_packets: default_capture_max_packets(),
            proc_path: None,
            sys_path: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        
        let config: Config = toml::from_str(&contents)
            .with_context(|| "Failed to parse config file")?;
        
        for (probe, weight) in &config.weights {
            if !weight.is_finite() || *weight < 0.0 {
                anyhow::bail!("Invalid weight for {}: {} (must be a non-negative number)", probe, weight);
            }
        }
        
        Ok(config)
    }
    
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.general.timeout_secs)
    }
    
    pub fn grace(&self) -> Duration {
        Duration::from_millis(self.general.grace_ms)
    }
}

impl ProbeSettings {
    /// procfs root: config, then `$HOST_PROC`, then `/proc`
    pub fn proc_root(&self) -> PathBuf {
        resolve_root(self.proc_path.as_ref(), "HOST_PROC", "/proc")
    }
    
    /// sysfs root: config, then `$HOST_SYS`, then `/sys`
    pub fn sys_root(&self) -> PathBuf {
        resolve_root(self.sys_path.as_ref(), "HOST_SYS", "/sys")
    }
    
    pub fn capture_duration(&self) -> Duration {
        Duration::from_secs(self.capture_duration_secs)
    }
}

fn resolve_root(configured: Option<&PathBuf>, env_var: &str, fallback: &str) -> PathBuf {
    if let Some(path) = configured {
        return path.clone();
    }
    match std::env::var(env_var) {
        Ok(path) if !path.is_empty() => PathBuf::from(path),
        _ => PathBuf::from(fallback),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    
    #[test]
    fn test_load_partial_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[general]\ntarget = \"example.net\"\n\n[weights]\ntcp_stats = 2.0\n\n[probes]\nproc_path = \"/host/proc\""
        )
        .unwrap();
        
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.general.target, "example.net");
        assert_eq!(config.general.mode, "full");
        assert_eq!(config.general.timeout_secs, 25);
        assert_eq!(config.weights.get(&ProbeName::TcpStats), Some(&2.0));
        assert_eq!(config.probes.ping_count, 3);
        assert_eq!(config.probes.proc_root(), PathBuf::from("/host/proc"));
        assert_eq!(config.logging.level, "info");
    }
    
    #[test]
    fn test_rejects_negative_weight() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[weights]\nping = -1.0").unwrap();
        assert!(Config::load(file.path()).is_err());
    }
    
    #[test]
    fn test_rejects_unknown_probe_weight() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[weights]\nspeedtest = 1.0").unwrap();
        assert!(Config::load(file.path()).is_err());
    }
    
    #[test]
    fn test_missing_file_is_error() {
        assert!(Config::load("/nonexistent/isp-checker.conf").is_err());
    }
}
