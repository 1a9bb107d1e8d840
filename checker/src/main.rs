//! ISP Checker - network diagnostics CLI
//!
//! Runs one diagnostic pass and prints the run as JSON on stdout

use anyhow::{Context, Result};
use clap::Parser;
use isp_checker::metrics::{Counters, EventSink, RunEvent};
use isp_checker::{output, simulation, Config, Orchestrator};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG: &str = "checker.conf";

#[derive(Parser, Debug)]
#[command(name = "isp-checker")]
#[command(version)]
#[command(about = "Diagnose ISP and local network problems", long_about = None)]
struct Args {
    /// Configuration file path (defaults to ./checker.conf when present)
    #[arg(short, long)]
    config: Option<PathBuf>,
    
    /// Host name or IP address to test
    #[arg(short, long)]
    target: Option<String>,
    
    /// Probe set: full, comprehensive, packet, or a single probe name
    #[arg(short, long, alias = "type")]
    mode: Option<String>,
    
    /// Run deadline in seconds
    #[arg(long)]
    timeout: Option<u64>,
    
    /// Also write the run JSON to this file
    #[arg(short, long)]
    out: Option<PathBuf>,
    
    /// Export the probe table as CSV
    #[arg(long)]
    csv: Option<PathBuf>,
    
    /// Replay a recorded run instead of probing
    #[arg(long)]
    simulation: Option<PathBuf>,
    
    /// Write Prometheus counters for this run
    #[arg(long)]
    metrics_out: Option<PathBuf>,
    
    /// Only print the JSON run
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    
    let config = load_config(args.config.as_deref())?;
    
    let level = if args.quiet { "warn" } else { config.logging.level.as_str() };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();
    
    info!("ISP Checker v{}", env!("CARGO_PKG_VERSION"));
    
    let (sink, mut events) = EventSink::channel();
    let orchestrator = Orchestrator::from_config(&config).with_events(sink.clone());
    
    let run = match &args.simulation {
        Some(path) => {
            let run = simulation::load_simulation(path, orchestrator.analyzer())?;
            for p in &run.probes {
                sink.emit(RunEvent::ProbeCompleted {
                    probe: p.name,
                    status: p.status,
                });
            }
            sink.emit(RunEvent::RunCompleted {
                run_id: run.run_id.clone(),
                score: run.score,
            });
            run
        }
        None => {
            let target = args.target.as_deref().unwrap_or(config.general.target.as_str());
            let mode = args.mode.as_deref().unwrap_or(config.general.mode.as_str());
            let timeout = args
                .timeout
                .map(Duration::from_secs)
                .unwrap_or_else(|| config.timeout());
            orchestrator.execute(target, mode, timeout).await?
        }
    };
    
    if !args.quiet {
        output::print_summary(&run)?;
    }
    println!("{}", run.to_json()?);
    
    if let Some(path) = &args.out {
        output::write_json(&run, path)?;
        info!("Run written to {:?}", path);
    }
    if let Some(path) = &args.csv {
        output::export_csv(&run.probes, path)?;
        info!("Probe table exported to {:?}", path);
    }
    if let Some(path) = &args.metrics_out {
        let mut counters = Counters::new();
        counters.drain(&mut events);
        std::fs::write(path, counters.render())
            .with_context(|| format!("Failed to write metrics to {}", path.display()))?;
        info!("Metrics written to {:?}", path);
    }
    
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path),
        None if Path::new(DEFAULT_CONFIG).exists() => Config::load(DEFAULT_CONFIG),
        None => Ok(Config::default()),
    }
}
