// Risk aggregation
// Two policies coexist: the linear blend writes the case's persisted
// snapshot; the forensic calculator is a read-only view that itemizes its
// justifications for a human investigator

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::entities::{
    AnomalyResult,
    CaseRiskSnapshot,
    ForensicRiskReport,
    GraphNode,
    RiskJustification,
    SuspiciousFinding,
};
use crate::value_objects::{RiskLevel, Severity};

pub const RULE_WEIGHT: f64 = 0.4;
pub const ANOMALY_WEIGHT: f64 = 0.4;
pub const GRAPH_WEIGHT: f64 = 0.2;

const HIGH_CENTRALITY_CUTOFF: f64 = 0.7;
const LOGISTIC_MIDPOINT: f64 = 30.0;
const LOGISTIC_SCALE: f64 = 10.0;

/// Linear aggregation: normalize each signal to 0-100, blend with fixed
/// weights, cap at 100.
pub fn aggregate_risk(
    case_id: &str,
    findings: &[SuspiciousFinding],
    anomalies: &[AnomalyResult],
    nodes: &[GraphNode],
    computed_at: DateTime<Utc>,
) -> CaseRiskSnapshot {
    let rule_score = if findings.is_empty() {
        0.0
    } else {
        let raw: f64 = findings.iter().map(|f| f.score_contribution).sum();
        (raw / 10.0).min(100.0)
    };

    let anomaly_scores: Vec<f64> = anomalies
        .iter()
        .filter(|result| result.is_anomaly)
        .map(|result| result.anomaly_score)
        .collect();
    let anomaly_score = if anomaly_scores.is_empty() {
        0.0
    } else {
        anomaly_scores.iter().sum::<f64>() / anomaly_scores.len() as f64 * 100.0
    };

    let graph_score = if nodes.is_empty() {
        0.0
    } else {
        nodes.iter().map(|node| node.centrality).sum::<f64>() / nodes.len() as f64 * 100.0
    };

    let total_score = (rule_score * RULE_WEIGHT
        + anomaly_score * ANOMALY_WEIGHT
        + graph_score * GRAPH_WEIGHT)
        .min(100.0);

    CaseRiskSnapshot {
        case_id: case_id.to_string(),
        total_score,
        risk_level: RiskLevel::from_linear_score(total_score),
        rule_score,
        anomaly_score,
        graph_score,
        computed_at,
    }
}

/// Fixed forensic-significance weights per indicator type.
fn forensic_weight(rule_key: &str) -> f64 {
    match rule_key {
        "midnight_activity" => 2.0,
        "high_value_transfer" => 4.0,
        "transaction_burst" => 3.0,
        "deleted_messages" => 2.0,
        "behavioral_chain" => 5.0,
        "statistical_anomaly" => 4.0,
        "cross_case_match" => 6.0,
        "network_correlation" => 3.0,
        _ => 1.0,
    }
}

/// Logarithmic count scaling keeps repeated detections from exploding the
/// raw point total.
fn log_scaled(weight: f64, count: usize) -> f64 {
    weight * ((count + 1) as f64).log2()
}

/// Squashes raw points into [0, 100); the score approaches but never reaches
/// 100.
pub fn logistic_squash(points: f64) -> f64 {
    100.0 / (1.0 + (-(points - LOGISTIC_MIDPOINT) / LOGISTIC_SCALE).exp())
}

/// Forensic aggregation: per-indicator log-scaled contributions squashed
/// through a logistic curve, with an itemized justification trail.
pub fn calculate_forensic_risk(
    case_id: &str,
    findings: &[SuspiciousFinding],
    anomalies: &[AnomalyResult],
    nodes: &[GraphNode],
) -> ForensicRiskReport {
    let mut total_points = 0.0;
    let mut justifications = Vec::new();

    // Rule detections, grouped per rule type.
    let mut by_rule: BTreeMap<&str, (usize, Severity)> = BTreeMap::new();
    for finding in findings {
        let entry = by_rule
            .entry(finding.rule_type.as_str())
            .or_insert((0, finding.severity));
        entry.0 += 1;
    }
    for (rule_type, (count, severity)) in &by_rule {
        let key = rule_type.to_lowercase().replace(' ', "_");
        let score = log_scaled(forensic_weight(&key), *count);
        total_points += score;
        justifications.push(RiskJustification {
            category: "Rule Detection".to_string(),
            kind: rule_type.to_string(),
            description: format!("{rule_type} detected {count} times"),
            score,
            severity: *severity,
        });
    }

    // Behavioral chains: events flagged by more than one rule.
    let mut findings_per_event: BTreeMap<&str, usize> = BTreeMap::new();
    for finding in findings {
        *findings_per_event
            .entry(finding.event_id.as_str())
            .or_insert(0) += 1;
    }
    let chain_count = findings_per_event
        .values()
        .filter(|&&count| count > 1)
        .count();
    if chain_count > 0 {
        let score = log_scaled(forensic_weight("behavioral_chain"), chain_count);
        total_points += score;
        justifications.push(RiskJustification {
            category: "Correlation".to_string(),
            kind: "Behavioral Chain".to_string(),
            description: format!("Found {chain_count} linked suspicious event sequences"),
            score,
            severity: Severity::High,
        });
    }

    // Statistical anomaly volume.
    let anomalous: Vec<&AnomalyResult> = anomalies.iter().filter(|r| r.is_anomaly).collect();
    if !anomalous.is_empty() {
        let score = log_scaled(forensic_weight("statistical_anomaly"), anomalous.len());
        total_points += score;
        let average = anomalous.iter().map(|r| r.anomaly_score).sum::<f64>()
            / anomalous.len() as f64;
        justifications.push(RiskJustification {
            category: "Anomaly Detection".to_string(),
            kind: "Statistical Deviation".to_string(),
            description: format!(
                "{} events show statistical deviation from baseline (avg score: {:.2})",
                anomalous.len(),
                average
            ),
            score,
            severity: Severity::Medium,
        });
    }

    // Network correlation: highly central entities.
    let central_count = nodes
        .iter()
        .filter(|node| node.centrality > HIGH_CENTRALITY_CUTOFF)
        .count();
    if central_count > 0 {
        let score = log_scaled(forensic_weight("network_correlation"), central_count);
        total_points += score;
        justifications.push(RiskJustification {
            category: "Network Analysis".to_string(),
            kind: "High Centrality Nodes".to_string(),
            description: format!(
                "{central_count} entities with high network centrality (key players)"
            ),
            score,
            severity: Severity::High,
        });
    }

    let squashed = logistic_squash(total_points);
    let risk_score_100 = (squashed * 10.0).round() / 10.0;
    let severity = RiskLevel::from_forensic_score(risk_score_100);

    ForensicRiskReport {
        case_id: case_id.to_string(),
        risk_score: (squashed * 10.0).round() / 100.0,
        risk_score_100,
        severity,
        total_points: (total_points * 100.0).round() / 100.0,
        summary: format!(
            "Risk assessment based on {} forensic indicators",
            justifications.len()
        ),
        justifications,
    }
}
