// Rule engine
// Each rule is a pure function over one case's valid events and contributes
// a fixed severity/score per match; findings are replaced wholesale per run

use chrono::{Timelike, Utc};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::entities::{SuspiciousFinding, UnifiedEvent};
use crate::value_objects::Severity;

pub const OFF_HOURS_SCORE: f64 = 15.0;
pub const BURST_SCORE: f64 = 25.0;
pub const HIGH_VALUE_SCORE: f64 = 30.0;
pub const TAMPER_SCORE: f64 = 10.0;

pub const DEFAULT_HIGH_VALUE_THRESHOLD: f64 = 10_000.0;
pub const DEFAULT_BURST_THRESHOLD: usize = 10;
/// Bursts are sampled: at most this many events per offending user are
/// flagged.
pub const BURST_FLAG_CAP: usize = 5;

pub struct RuleEngine {
    high_value_threshold: f64,
    burst_threshold: usize,
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self {
            high_value_threshold: DEFAULT_HIGH_VALUE_THRESHOLD,
            burst_threshold: DEFAULT_BURST_THRESHOLD,
        }
    }
}

impl RuleEngine {
    pub fn new(high_value_threshold: f64, burst_threshold: usize) -> Self {
        Self {
            high_value_threshold,
            burst_threshold,
        }
    }

    pub fn run(&self, case_id: &str, events: &[UnifiedEvent]) -> Vec<SuspiciousFinding> {
        let mut findings = Vec::new();
        findings.extend(self.midnight_activity(case_id, events));
        findings.extend(self.transaction_burst(case_id, events));
        findings.extend(self.high_value_transfer(case_id, events));
        findings.extend(self.deleted_messages(case_id, events));
        findings
    }

    /// Flags any event in the 00:00-05:59 window.
    fn midnight_activity(&self, case_id: &str, events: &[UnifiedEvent]) -> Vec<SuspiciousFinding> {
        events
            .iter()
            .filter(|event| event.timestamp.hour() < 6)
            .map(|event| {
                build_finding(
                    case_id,
                    &event.event_id,
                    "Midnight Activity",
                    Severity::High,
                    OFF_HOURS_SCORE,
                    format!(
                        "Activity detected at {}:00 (off-hours)",
                        event.timestamp.hour()
                    ),
                )
            })
            .collect()
    }

    fn transaction_burst(&self, case_id: &str, events: &[UnifiedEvent]) -> Vec<SuspiciousFinding> {
        let mut by_user: BTreeMap<&str, Vec<&UnifiedEvent>> = BTreeMap::new();
        for event in events {
            if event.is_transactional() {
                by_user.entry(event.user_id.as_str()).or_default().push(event);
            }
        }

        let mut findings = Vec::new();
        for (user_id, transactions) in by_user {
            if transactions.len() > self.burst_threshold {
                for event in transactions.iter().take(BURST_FLAG_CAP) {
                    findings.push(build_finding(
                        case_id,
                        &event.event_id,
                        "Transaction Burst",
                        Severity::Critical,
                        BURST_SCORE,
                        format!(
                            "User {} made {} transactions (burst detected)",
                            user_id,
                            transactions.len()
                        ),
                    ));
                }
            }
        }
        findings
    }

    fn high_value_transfer(
        &self,
        case_id: &str,
        events: &[UnifiedEvent],
    ) -> Vec<SuspiciousFinding> {
        events
            .iter()
            .filter(|event| {
                event
                    .amount
                    .map(|amount| amount > self.high_value_threshold)
                    .unwrap_or(false)
            })
            .map(|event| {
                build_finding(
                    case_id,
                    &event.event_id,
                    "High Value Transfer",
                    Severity::Critical,
                    HIGH_VALUE_SCORE,
                    format!("High value transfer: {:.2}", event.amount.unwrap_or(0.0)),
                )
            })
            .collect()
    }

    /// Deletion markers in metadata hint at evidence tampering.
    fn deleted_messages(&self, case_id: &str, events: &[UnifiedEvent]) -> Vec<SuspiciousFinding> {
        events
            .iter()
            .filter(|event| is_deleted(event))
            .map(|event| {
                build_finding(
                    case_id,
                    &event.event_id,
                    "Deleted Messages",
                    Severity::Medium,
                    TAMPER_SCORE,
                    format!(
                        "{} was deleted - potential evidence tampering",
                        event.event_type
                    ),
                )
            })
            .collect()
    }
}

fn is_deleted(event: &UnifiedEvent) -> bool {
    let flag_true = |value: Option<&Value>| matches!(value, Some(Value::Bool(true)));
    let flag_one = |value: Option<&Value>| match value {
        Some(Value::Number(n)) => n.as_i64() == Some(1),
        Some(Value::String(s)) => s == "1",
        _ => false,
    };
    flag_true(event.metadata.get("deleted"))
        || flag_true(event.metadata.get("is_deleted"))
        || flag_one(event.metadata.get("deleted_flag"))
}

fn build_finding(
    case_id: &str,
    event_id: &str,
    rule_type: &str,
    severity: Severity,
    score_contribution: f64,
    description: String,
) -> SuspiciousFinding {
    SuspiciousFinding {
        id: Uuid::new_v4().to_string(),
        case_id: case_id.to_string(),
        event_id: event_id.to_string(),
        rule_type: rule_type.to_string(),
        severity,
        score_contribution,
        description,
        detected_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::Map;

    fn event(id: &str, user: &str, hour: u32, event_type: &str) -> UnifiedEvent {
        UnifiedEvent {
            event_id: id.to_string(),
            case_id: "case".to_string(),
            event_type: event_type.to_string(),
            user_id: user.to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, hour, 30, 0).unwrap(),
            source: "financial".to_string(),
            amount: None,
            receiver: None,
            metadata: Map::new(),
            is_valid: true,
            validation_errors: Vec::new(),
        }
    }

    #[test]
    fn clean_batch_produces_no_findings() {
        let events: Vec<UnifiedEvent> = (0..20)
            .map(|i| event(&format!("e{i}"), "alice", 10, "message"))
            .collect();
        let findings = RuleEngine::default().run("case", &events);
        assert!(findings.is_empty());
    }

    #[test]
    fn midnight_activity_flags_early_hours_only() {
        let events = vec![
            event("e1", "alice", 2, "message"),
            event("e2", "alice", 5, "message"),
            event("e3", "alice", 6, "message"),
            event("e4", "alice", 23, "message"),
        ];
        let findings = RuleEngine::default().run("case", &events);
        assert_eq!(findings.len(), 2);
        for finding in &findings {
            assert_eq!(finding.rule_type, "Midnight Activity");
            assert_eq!(finding.severity, Severity::High);
            assert_eq!(finding.score_contribution, OFF_HOURS_SCORE);
        }
    }

    #[test]
    fn burst_flags_first_five_of_fifteen_transactions() {
        let events: Vec<UnifiedEvent> = (0..15)
            .map(|i| event(&format!("e{i}"), "alice", 12, "transaction"))
            .collect();
        let findings = RuleEngine::default().run("case", &events);
        assert_eq!(findings.len(), BURST_FLAG_CAP);
        let flagged: Vec<&str> = findings.iter().map(|f| f.event_id.as_str()).collect();
        assert_eq!(flagged, vec!["e0", "e1", "e2", "e3", "e4"]);
        for finding in &findings {
            assert_eq!(finding.rule_type, "Transaction Burst");
            assert_eq!(finding.severity, Severity::Critical);
            assert_eq!(finding.score_contribution, 25.0);
            assert!(finding.description.contains("15 transactions"));
        }
    }

    #[test]
    fn burst_needs_more_than_threshold_transactions() {
        let events: Vec<UnifiedEvent> = (0..10)
            .map(|i| event(&format!("e{i}"), "alice", 12, "transfer"))
            .collect();
        let findings = RuleEngine::default().run("case", &events);
        assert!(findings.is_empty());
    }

    #[test]
    fn high_value_transfer_fires_above_threshold() {
        let mut flagged = event("e1", "alice", 12, "transaction");
        flagged.amount = Some(15_000.0);
        let mut below = event("e2", "alice", 12, "transaction");
        below.amount = Some(10_000.0);
        let findings = RuleEngine::default().run("case", &[flagged, below]);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].event_id, "e1");
        assert_eq!(findings[0].rule_type, "High Value Transfer");
        assert_eq!(findings[0].score_contribution, 30.0);
    }

    #[test]
    fn deleted_marker_variants_are_recognized() {
        let mut bool_flag = event("e1", "alice", 12, "message");
        bool_flag
            .metadata
            .insert("deleted".to_string(), Value::Bool(true));
        let mut numeric_flag = event("e2", "alice", 12, "message");
        numeric_flag
            .metadata
            .insert("deleted_flag".to_string(), Value::from(1));
        let mut string_flag = event("e3", "alice", 12, "message");
        string_flag
            .metadata
            .insert("deleted_flag".to_string(), Value::String("1".to_string()));
        let mut untouched = event("e4", "alice", 12, "message");
        untouched
            .metadata
            .insert("deleted".to_string(), Value::Bool(false));

        let findings =
            RuleEngine::default().run("case", &[bool_flag, numeric_flag, string_flag, untouched]);
        assert_eq!(findings.len(), 3);
        for finding in &findings {
            assert_eq!(finding.rule_type, "Deleted Messages");
            assert_eq!(finding.severity, Severity::Medium);
            assert_eq!(finding.score_contribution, TAMPER_SCORE);
        }
    }
}
