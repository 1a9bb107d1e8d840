//! Console, JSON and CSV output of runs

use anyhow::{Context, Result};
use schema::{ProbeResult, Run, Status};
use std::io::{self, Write};
use std::path::Path;

/// Human-readable run summary on stderr
pub fn print_summary(run: &Run) -> Result<()> {
    let stderr = io::stderr();
    write_summary(run, &mut stderr.lock())?;
    Ok(())
}

pub fn write_summary<W: Write>(run: &Run, out: &mut W) -> io::Result<()> {
    let now = chrono::Local::now().format("%H:%M:%S");
    
    writeln!(out, "[{}] {} run against {} ({})", now, run.mode, run.target, run.run_id)?;
    for p in &run.probes {
        match p.status {
            Status::Ok => match p.latency_ms {
                Some(latency) => writeln!(out, "[{}] {} -> OK {:.2}ms", now, p.name, latency)?,
                None => writeln!(out, "[{}] {} -> OK", now, p.name)?,
            },
            Status::Na => writeln!(
                out,
                "[{}] {} -> N/A ({})",
                now,
                p.name,
                p.error.as_deref().unwrap_or("unavailable")
            )?,
            status => writeln!(
                out,
                "[{}] {} -> {}: {}",
                now,
                p.name,
                status.as_str().to_uppercase(),
                p.error.as_deref().unwrap_or("see details")
            )?,
        }
    }
    
    writeln!(out, "[{}] Score: {:.1} - {}", now, run.score, run.summary)?;
    for d in &run.diagnosis {
        writeln!(
            out,
            "  [{}] {}: {} -> {}",
            d.severity.as_str().to_uppercase(),
            d.component,
            d.explanation,
            d.suggested_action
        )?;
    }
    Ok(())
}

/// Write the run as pretty JSON
pub fn write_json(run: &Run, output_path: &Path) -> Result<()> {
    let json = run.to_json().context("Failed to serialize run")?;
    std::fs::write(output_path, json + "\n")
        .with_context(|| format!("Failed to write {}", output_path.display()))?;
    Ok(())
}

/// Export the probe table as CSV
pub fn export_csv(probes: &[ProbeResult], output_path: &Path) -> Result<()> {
    let file = std::fs::File::create(output_path)
        .with_context(|| format!("Failed to create {}", output_path.display()))?;
    write_csv(probes, file)
}

pub fn write_csv<W: Write>(probes: &[ProbeResult], out: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    
    writer.write_record(["name", "status", "latency_ms", "error"])?;
    for p in probes {
        writer.write_record([
            p.name.as_str().to_string(),
            p.status.as_str().to_string(),
            p.latency_ms.map(|v| format!("{:.2}", v)).unwrap_or_default(),
            p.error.clone().unwrap_or_default(),
        ])?;
    }
    
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use schema::{Component, DiagnosticResult, ProbeName, Severity};
    
    fn sample_run() -> Run {
        Run {
            run_id: "run-1".to_string(),
            timestamp: "2024-01-01T00:00:00+00:00".to_string(),
            target: "example.com".to_string(),
            mode: "full".to_string(),
            score: 33.3,
            summary: "network health degraded".to_string(),
            probes: vec![
                ProbeResult::ok(ProbeName::Ping).with_latency(12.346),
                ProbeResult::fail(ProbeName::Dns, "lookup failed, no such host"),
                ProbeResult::na(ProbeName::Traceroute, "traceroute/tracepath not available"),
            ],
            diagnosis: vec![DiagnosticResult::new(
                Component::Dns,
                Severity::Critical,
                0.9,
                "DNS resolution failed",
                "Check the configured DNS server",
            )],
            raw: Default::default(),
        }
    }
    
    #[test]
    fn test_summary_lines() {
        let mut out = Vec::new();
        write_summary(&sample_run(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        
        assert!(text.contains("ping -> OK 12.35ms"));
        assert!(text.contains("dns -> FAIL: lookup failed, no such host"));
        assert!(text.contains("traceroute -> N/A (traceroute/tracepath not available)"));
        assert!(text.contains("Score: 33.3 - network health degraded"));
        assert!(text.contains("[CRITICAL] DNS: DNS resolution failed -> Check the configured DNS server"));
    }
    
    #[test]
    fn test_csv_export() {
        let mut out = Vec::new();
        write_csv(&sample_run().probes, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<_> = text.lines().collect();
        
        assert_eq!(lines[0], "name,status,latency_ms,error");
        assert_eq!(lines[1], "ping,ok,12.35,");
        assert_eq!(lines[2], "dns,fail,,\"lookup failed, no such host\"");
        assert_eq!(lines.len(), 4);
    }
    
    #[test]
    fn test_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        write_json(&sample_run(), &path).unwrap();
        
        let parsed: Run = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed, sample_run());
    }
}
