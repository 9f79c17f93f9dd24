// Case risk entities
// The linear snapshot is the single persisted score per case; the forensic
// report is a read-only alternate view with itemized justifications

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::{RiskLevel, Severity};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseRiskSnapshot {
    pub case_id: String,
    pub total_score: f64,
    pub risk_level: RiskLevel,
    pub rule_score: f64,
    pub anomaly_score: f64,
    pub graph_score: f64,
    pub computed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskJustification {
    pub category: String,
    pub kind: String,
    pub description: String,
    pub score: f64,
    pub severity: Severity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForensicRiskReport {
    pub case_id: String,
    pub risk_score: f64,
    pub risk_score_100: f64,
    pub severity: RiskLevel,
    pub total_points: f64,
    pub justifications: Vec<RiskJustification>,
    pub summary: String,
}
