//! Rule-based diagnosis of probe results

use super::scoring::{Assessment, Band};
use schema::confidence;
use schema::{
    CaptureDetails, Component, DiagnosticResult, InterfaceDetails, PingDetails, ProbeDetails,
    ProbeName, ProbeResult, Severity, SocketDetails, Status, TcpDetails,
    CAPTURE_PATH_OUT_OF_ORDER, CAPTURE_PATH_RETRANSMITS, CAPTURE_ZERO_WINDOW_DIAGNOSE,
    INTERFACE_FAIL_RATE, INTERFACE_WARN_RATE, SOCKET_RETRANS_WARN, TCP_ERROR_FAIL_RATE,
    TCP_ERROR_WARN_RATE, TCP_OFO_WARN_RATE, TCP_REORDER_EVENTS_WARN, TCP_RETRANS_FAIL_RATE,
    TCP_RETRANS_WARN_RATE,
};

/// Stateless rule engine; identical inputs give identical diagnoses
#[derive(Debug, Clone, Copy, Default)]
pub struct DiagnosticEngine;

impl DiagnosticEngine {
    pub fn new() -> Self {
        Self
    }
    
    /// Diagnoses ordered critical, warning, info (stable by probe order), Overall last
    ///
    /// Takes the [`Assessment`] of the same results so the Overall entry uses the
    /// band and score the run reports. [`super::Analyzer::analyze`] is the
    /// results-only entry point that scores and diagnoses in one call.
    pub fn diagnose(&self, results: &[ProbeResult], assessment: &Assessment) -> Vec<DiagnosticResult> {
        let mut diagnoses = Vec::new();
        
        for result in results {
            let mut fired = probe_rules(result);
            if fired.is_empty() && result.status.is_problem() {
                fired.push(fallback(result));
            }
            diagnoses.extend(fired);
        }
        
        diagnoses.sort_by(|a, b| b.severity.cmp(&a.severity));
        diagnoses.push(overall(assessment));
        diagnoses
    }
}

fn probe_rules(result: &ProbeResult) -> Vec<DiagnosticResult> {
    if result.status == Status::Na {
        return Vec::new();
    }
    
    let mut out = Vec::new();
    match result.name {
        ProbeName::Ping => {
            if result.status == Status::Fail {
                out.push(DiagnosticResult::new(
                    Component::Connectivity,
                    Severity::Critical,
                    confidence::CONNECTIVITY_FAIL,
                    ping_explanation(result),
                    "Check physical connectivity and firewall rules; the target may also be blocking ICMP",
                ));
            }
        }
        ProbeName::Dns => {
            if result.status == Status::Fail {
                out.push(DiagnosticResult::new(
                    Component::Dns,
                    Severity::Critical,
                    confidence::DNS_FAIL,
                    format!("DNS resolution failed: {}", reason(result)),
                    "Check the configured DNS server or try an alternate resolver (e.g. 1.1.1.1 or 8.8.8.8)",
                ));
            }
        }
        ProbeName::Traceroute => {
            if result.status == Status::Fail {
                out.push(DiagnosticResult::new(
                    Component::Routing,
                    Severity::Warning,
                    confidence::ROUTING_FAIL,
                    format!("route trace failed: {}", reason(result)),
                    "Check for routing problems or filtering of trace probes along the path",
                ));
            }
        }
        ProbeName::InterfaceStats => {
            if let Some(ProbeDetails::InterfaceStats(details)) = &result.details {
                interface_rules(details, &mut out);
            }
        }
        ProbeName::TcpStats => {
            if let Some(ProbeDetails::TcpStats(details)) = &result.details {
                tcp_rules(details, &mut out);
            }
        }
        ProbeName::SocketStats => {
            if let Some(ProbeDetails::SocketStats(details)) = &result.details {
                socket_rules(details, &mut out);
            }
        }
        ProbeName::PacketCapture => {
            if let Some(ProbeDetails::PacketCapture(details)) = &result.details {
                capture_rules(details, &mut out);
            }
        }
    }
    out
}

fn ping_explanation(result: &ProbeResult) -> String {
    match &result.details {
        Some(ProbeDetails::Ping(PingDetails { loss_percent, .. })) if *loss_percent > 0.0 => {
            format!("target unreachable: {:.2}% packet loss", loss_percent)
        }
        _ => format!("target unreachable: {}", reason(result)),
    }
}

fn interface_rules(details: &InterfaceDetails, out: &mut Vec<DiagnosticResult>) {
    let rate = details.error_rate_percent;
    if rate > INTERFACE_FAIL_RATE {
        out.push(DiagnosticResult::new(
            Component::NetworkInterface,
            Severity::Critical,
            confidence::INTERFACE_ERRORS_CRITICAL,
            format!(
                "high packet error rate on network interfaces: {:.2}% ({} errors), likely hardware or cable fault",
                rate, details.total_errors
            ),
            "Check cables, connectors and NIC hardware; replace faulty cabling or switch ports",
        ));
    } else if rate > INTERFACE_WARN_RATE {
        out.push(DiagnosticResult::new(
            Component::NetworkInterface,
            Severity::Warning,
            confidence::INTERFACE_ERRORS_WARNING,
            format!("elevated packet error rate on network interfaces: {:.2}%", rate),
            "Monitor interface errors; inspect cabling and duplex settings if the rate grows",
        ));
    }
    
    if details.drop_rate_percent > INTERFACE_FAIL_RATE {
        out.push(DiagnosticResult::new(
            Component::NetworkInterface,
            Severity::Critical,
            confidence::INTERFACE_DROPS_CRITICAL,
            format!(
                "high packet drop rate: {:.2}% ({} dropped), buffer exhaustion or congestion",
                details.drop_rate_percent, details.total_dropped
            ),
            "Check for congestion or buffer exhaustion; enlarge NIC ring buffers or reduce load",
        ));
    }
}

fn tcp_rules(details: &TcpDetails, out: &mut Vec<DiagnosticResult>) {
    let retrans = details.retransmission_rate;
    if retrans > TCP_RETRANS_FAIL_RATE {
        out.push(DiagnosticResult::new(
            Component::TcpTransport,
            Severity::Critical,
            confidence::TCP_RETRANS_CRITICAL,
            format!("high TCP retransmission rate: {:.2}%", retrans),
            "Investigate packet loss toward the ISP; contact the ISP if loss persists beyond the local network",
        ));
    } else if retrans > TCP_RETRANS_WARN_RATE {
        out.push(DiagnosticResult::new(
            Component::TcpTransport,
            Severity::Warning,
            confidence::TCP_RETRANS_WARNING,
            format!("elevated TCP retransmission rate: {:.2}%", retrans),
            "Monitor retransmissions; check for congestion or wireless interference",
        ));
    }
    
    let errors = details.error_rate;
    if errors > TCP_ERROR_FAIL_RATE {
        out.push(DiagnosticResult::new(
            Component::TcpTransport,
            Severity::Critical,
            confidence::TCP_ERRORS_CRITICAL,
            format!("high rate of bad TCP segments: {:.2}%", errors),
            "Check for corruption on the path; inspect NIC and cabling, then escalate to the ISP",
        ));
    } else if errors > TCP_ERROR_WARN_RATE {
        out.push(DiagnosticResult::new(
            Component::TcpTransport,
            Severity::Warning,
            confidence::TCP_ERRORS_WARNING,
            format!("elevated rate of bad TCP segments: {:.2}%", errors),
            "Monitor TCP segment errors",
        ));
    }
    
    if details.out_of_order_rate > TCP_OFO_WARN_RATE
        || details.total_reorder_events > TCP_REORDER_EVENTS_WARN
    {
        out.push(DiagnosticResult::new(
            Component::TcpTransport,
            Severity::Warning,
            confidence::TCP_REORDERING,
            format!(
                "packet reordering indicates path instability: {:.2}% out-of-order, {} reorder events",
                details.out_of_order_rate, details.total_reorder_events
            ),
            "No local action required; reordering usually originates upstream. Keep monitoring",
        ));
    }
}

fn socket_rules(details: &SocketDetails, out: &mut Vec<DiagnosticResult>) {
    let affected: Vec<_> = details
        .sockets
        .iter()
        .filter(|s| s.retransmits > SOCKET_RETRANS_WARN)
        .collect();
    
    let worst = affected.iter().max_by_key(|s| s.retransmits);
    if let Some(worst) = worst {
        out.push(DiagnosticResult::new(
            Component::SocketHealth,
            Severity::Warning,
            confidence::SOCKET_RETRANSMITS,
            format!(
                "{} socket(s) with excessive retransmissions; worst {} -> {} with {} retransmits",
                affected.len(),
                worst.local,
                worst.remote,
                worst.retransmits
            ),
            "Inspect the affected connections; persistent retransmits point to loss on that path",
        ));
    }
}

fn capture_rules(details: &CaptureDetails, out: &mut Vec<DiagnosticResult>) {
    let stats = &details.stats;
    
    if stats.checksum_errors > 0 {
        out.push(DiagnosticResult::new(
            Component::PacketIntegrity,
            Severity::Critical,
            confidence::CAPTURE_CHECKSUM,
            format!("{} packets with bad checksums captured, indicating corruption", stats.checksum_errors),
            "Check cabling and NIC hardware; verify checksum offload is not producing false positives",
        ));
    }
    if stats.malformed_packets > 0 {
        out.push(DiagnosticResult::new(
            Component::PacketIntegrity,
            Severity::Critical,
            confidence::CAPTURE_MALFORMED,
            format!("{} malformed packets captured", stats.malformed_packets),
            "Check for faulty hardware or misbehaving middleboxes on the path",
        ));
    }
    if stats.tcp_zero_window > CAPTURE_ZERO_WINDOW_DIAGNOSE {
        out.push(DiagnosticResult::new(
            Component::TcpFlow,
            Severity::Warning,
            confidence::CAPTURE_ZERO_WINDOW,
            format!("{} TCP zero-window advertisements, a receiver cannot keep up", stats.tcp_zero_window),
            "Check application and host load on the receiving side",
        ));
    }
    if stats.tcp_retransmits > CAPTURE_PATH_RETRANSMITS
        && stats.tcp_out_of_order > CAPTURE_PATH_OUT_OF_ORDER
    {
        out.push(DiagnosticResult::new(
            Component::NetworkPath,
            Severity::Warning,
            confidence::CAPTURE_PATH,
            format!(
                "captured traffic shows loss and reordering: {} retransmissions, {} out-of-order ({:.2}% retransmitted)",
                stats.tcp_retransmits,
                stats.tcp_out_of_order,
                stats.retransmission_rate()
            ),
            "Path quality is degraded beyond the local network; collect evidence and contact the ISP",
        ));
    }
}

/// Generic diagnosis for a WARN/FAIL probe no specific rule covered
fn fallback(result: &ProbeResult) -> DiagnosticResult {
    let component = match result.name {
        ProbeName::Ping => Component::Connectivity,
        ProbeName::Dns => Component::Dns,
        ProbeName::Traceroute => Component::Routing,
        ProbeName::InterfaceStats => Component::NetworkInterface,
        ProbeName::TcpStats => Component::TcpTransport,
        ProbeName::SocketStats => Component::SocketHealth,
        ProbeName::PacketCapture => Component::PacketCapture,
    };
    let severity = if result.status == Status::Fail {
        Severity::Critical
    } else {
        Severity::Warning
    };
    
    DiagnosticResult::new(
        component,
        severity,
        confidence::PROBE_STATUS,
        format!("{} reported {}: {}", result.name, result.status, reason(result)),
        format!("Review the {} probe details for the underlying cause", result.name),
    )
}

fn overall(assessment: &Assessment) -> DiagnosticResult {
    let figures = format!("health {:.1}/100, score {:.1}", assessment.health, assessment.score);
    match assessment.band {
        Band::NoData => DiagnosticResult::new(
            Component::Overall,
            Severity::Warning,
            confidence::NO_DATA,
            "no data: no probe produced a scorable result",
            "Check that the selected probes are supported here (tools installed, privileges, platform)",
        ),
        Band::Excellent => DiagnosticResult::new(
            Component::Overall,
            Severity::Info,
            confidence::OVERALL_HEALTHY,
            format!("network health is excellent ({})", figures),
            "No action needed",
        ),
        Band::Good => DiagnosticResult::new(
            Component::Overall,
            Severity::Info,
            confidence::OVERALL_MINOR,
            format!("network health is good with minor issues ({})", figures),
            "Monitor for recurring issues",
        ),
        Band::Degraded | Band::Critical => DiagnosticResult::new(
            Component::Overall,
            Severity::Warning,
            confidence::OVERALL_DEGRADED,
            format!("network health is {} ({})", assessment.band.label(), figures),
            "Address the critical issues listed above first, then re-run the check",
        ),
    }
}

/// Error text, else the probe's issues, else a placeholder
fn reason(result: &ProbeResult) -> String {
    if let Some(error) = &result.error {
        return error.clone();
    }
    match result.details.as_ref().map(ProbeDetails::issues) {
        Some(issues) if !issues.is_empty() => issues.join("; "),
        _ => "no further details".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::scoring::{Scorer, Weights};
    use schema::{CaptureStats, SocketInfo};
    
    fn diagnose(results: &[ProbeResult]) -> Vec<DiagnosticResult> {
        let assessment = Scorer::new(Weights::default()).score(results);
        DiagnosticEngine::new().diagnose(results, &assessment)
    }
    
    fn has(diagnoses: &[DiagnosticResult], component: Component, severity: Severity) -> bool {
        diagnoses.iter().any(|d| d.component == component && d.severity == severity)
    }
    
    #[test]
    fn test_healthy_run_has_only_overall() {
        let ping = PingDetails {
            packets_transmitted: 4,
            packets_received: 4,
            rtt_avg_ms: Some(10.0),
            ..Default::default()
        };
        let results = vec![
            ProbeResult::ok(ProbeName::Ping)
                .with_latency(10.0)
                .with_details(ProbeDetails::Ping(ping)),
            ProbeResult::ok(ProbeName::Dns),
            ProbeResult::ok(ProbeName::Traceroute),
        ];
        
        let diagnoses = diagnose(&results);
        assert_eq!(diagnoses.len(), 1);
        assert_eq!(diagnoses[0].component, Component::Overall);
        assert_eq!(diagnoses[0].severity, Severity::Info);
        assert_eq!(diagnoses[0].confidence, confidence::OVERALL_HEALTHY);
    }
    
    #[test]
    fn test_unreachable_target() {
        let results = vec![
            ProbeResult::fail(ProbeName::Ping, "100% packet loss"),
            ProbeResult::fail(ProbeName::Dns, "failed to lookup address information"),
            ProbeResult::ok(ProbeName::Traceroute),
        ];
        let diagnoses = diagnose(&results);
        
        assert!(has(&diagnoses, Component::Connectivity, Severity::Critical));
        assert!(has(&diagnoses, Component::Dns, Severity::Critical));
        let last = diagnoses.last().unwrap();
        assert_eq!(last.component, Component::Overall);
        assert_eq!(last.severity, Severity::Warning);
    }
    
    #[test]
    fn test_ping_loss_is_quoted() {
        let details = PingDetails {
            packets_transmitted: 4,
            loss_percent: 100.0,
            ..Default::default()
        };
        let results = vec![ProbeResult::fail(ProbeName::Ping, "exit status 1").with_details(ProbeDetails::Ping(details))];
        let diagnoses = diagnose(&results);
        
        assert_eq!(diagnoses[0].explanation, "target unreachable: 100.00% packet loss");
    }
    
    #[test]
    fn test_tcp_retransmissions_critical() {
        let details = TcpDetails {
            retransmission_rate: 6.0,
            ..Default::default()
        };
        let results = vec![ProbeResult::new(ProbeName::TcpStats, Status::Fail).with_details(ProbeDetails::TcpStats(details))];
        let diagnoses = diagnose(&results);
        
        let transport = diagnoses
            .iter()
            .find(|d| d.component == Component::TcpTransport)
            .unwrap();
        assert_eq!(transport.severity, Severity::Critical);
        assert!(transport.explanation.contains("6.00%"));
        assert_eq!(transport.confidence, confidence::TCP_RETRANS_CRITICAL);
    }
    
    #[test]
    fn test_tcp_retransmission_boundaries() {
        let at = |rate: f64| {
            let details = TcpDetails {
                retransmission_rate: rate,
                ..Default::default()
            };
            let results = vec![ProbeResult::new(ProbeName::TcpStats, Status::Warn).with_details(ProbeDetails::TcpStats(details))];
            diagnose(&results)
                .into_iter()
                .find(|d| d.component == Component::TcpTransport)
                .map(|d| d.severity)
        };
        
        assert_eq!(at(5.0), Some(Severity::Warning));
        assert_eq!(at(5.01), Some(Severity::Critical));
        assert_eq!(at(1.5), Some(Severity::Warning));
        // 1.0 exactly is not a rule hit; the WARN status falls back to a generic diagnosis
        assert_eq!(at(1.0), Some(Severity::Warning));
    }
    
    #[test]
    fn test_reordering_is_non_actionable_warning() {
        let details = TcpDetails {
            total_reorder_events: 150,
            ..Default::default()
        };
        let results = vec![ProbeResult::new(ProbeName::TcpStats, Status::Warn).with_details(ProbeDetails::TcpStats(details))];
        let diagnoses = diagnose(&results);
        
        assert_eq!(diagnoses.len(), 2);
        assert_eq!(diagnoses[0].severity, Severity::Warning);
        assert!(diagnoses[0].explanation.contains("path instability"));
        assert!(diagnoses[0].suggested_action.starts_with("No local action required"));
    }
    
    #[test]
    fn test_interface_rules() {
        let details = InterfaceDetails {
            error_rate_percent: 0.5,
            drop_rate_percent: 2.0,
            ..Default::default()
        };
        let results = vec![
            ProbeResult::new(ProbeName::InterfaceStats, Status::Fail)
                .with_details(ProbeDetails::InterfaceStats(details)),
        ];
        let diagnoses = diagnose(&results);
        
        // critical drop rate sorts ahead of the warning error rate
        assert_eq!(diagnoses[0].severity, Severity::Critical);
        assert!(diagnoses[0].explanation.contains("2.00%"));
        assert_eq!(diagnoses[1].severity, Severity::Warning);
        assert!(diagnoses[1].explanation.contains("0.50%"));
    }
    
    #[test]
    fn test_unavailable_probe_fires_nothing() {
        let results = vec![
            ProbeResult::ok(ProbeName::Ping),
            ProbeResult::na(ProbeName::InterfaceStats, "interface statistics require Linux"),
        ];
        let diagnoses = diagnose(&results);
        
        assert_eq!(diagnoses.len(), 1);
        assert_eq!(diagnoses[0].component, Component::Overall);
    }
    
    #[test]
    fn test_no_data() {
        for results in [vec![], vec![ProbeResult::na(ProbeName::SocketStats, "ss not available")]] {
            let diagnoses = diagnose(&results);
            assert_eq!(diagnoses.len(), 1);
            assert_eq!(diagnoses[0].component, Component::Overall);
            assert!(diagnoses[0].explanation.starts_with("no data"));
        }
    }
    
    #[test]
    fn test_socket_rule_names_worst() {
        let socket = |remote: &str, retransmits| SocketInfo {
            local: "10.0.0.2:50000".to_string(),
            remote: remote.to_string(),
            retransmits,
            ..Default::default()
        };
        let details = SocketDetails {
            sockets: vec![socket("1.1.1.1:443", 7), socket("8.8.8.8:443", 12), socket("9.9.9.9:443", 1)],
            issues: vec![],
        };
        let results = vec![ProbeResult::new(ProbeName::SocketStats, Status::Warn).with_details(ProbeDetails::SocketStats(details))];
        let diagnoses = diagnose(&results);
        
        assert_eq!(diagnoses[0].component, Component::SocketHealth);
        assert!(diagnoses[0].explanation.starts_with("2 socket(s)"));
        assert!(diagnoses[0].explanation.contains("8.8.8.8:443 with 12 retransmits"));
    }
    
    #[test]
    fn test_capture_rules() {
        let stats = CaptureStats {
            packet_count: 500,
            tcp_packets: 400,
            tcp_retransmits: 60,
            tcp_out_of_order: 25,
            tcp_zero_window: 11,
            checksum_errors: 2,
            ..Default::default()
        };
        let results = vec![
            ProbeResult::new(ProbeName::PacketCapture, Status::Fail)
                .with_details(ProbeDetails::PacketCapture(CaptureDetails { stats, issues: vec![] })),
        ];
        let diagnoses = diagnose(&results);
        
        assert!(has(&diagnoses, Component::PacketIntegrity, Severity::Critical));
        assert!(has(&diagnoses, Component::TcpFlow, Severity::Warning));
        assert!(has(&diagnoses, Component::NetworkPath, Severity::Warning));
        assert!(!diagnoses.iter().any(|d| d.explanation.contains("malformed")));
    }
    
    #[test]
    fn test_fallback_without_details() {
        let results = vec![
            ProbeResult::new(ProbeName::SocketStats, Status::Warn),
            ProbeResult::timeout(ProbeName::PacketCapture),
        ];
        let diagnoses = diagnose(&results);
        
        assert_eq!(diagnoses.len(), 3);
        assert_eq!(diagnoses[0].component, Component::PacketCapture);
        assert_eq!(diagnoses[0].severity, Severity::Critical);
        assert_eq!(diagnoses[0].explanation, "packet_capture reported fail: packet_capture timeout");
        assert_eq!(diagnoses[1].component, Component::SocketHealth);
        assert_eq!(diagnoses[1].explanation, "socket_stats reported warn: no further details");
    }
    
    #[test]
    fn test_every_problem_probe_is_diagnosed() {
        for name in ProbeName::ALL {
            for status in [Status::Warn, Status::Fail] {
                let results = vec![ProbeResult::new(name, status)];
                let diagnoses = diagnose(&results);
                assert!(diagnoses.len() >= 2, "{} {} produced no diagnosis", name, status);
            }
        }
    }
    
    #[test]
    fn test_diagnose_is_deterministic() {
        let results = vec![
            ProbeResult::fail(ProbeName::Ping, "unreachable"),
            ProbeResult::new(ProbeName::TcpStats, Status::Warn).with_details(ProbeDetails::TcpStats(TcpDetails {
                retransmission_rate: 2.5,
                error_rate: 0.3,
                ..Default::default()
            })),
        ];
        assert_eq!(diagnose(&results), diagnose(&results));
    }
}
