// Suspicious finding entity
// One row per rule match; several findings may reference the same event

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::Severity;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuspiciousFinding {
    pub id: String,
    pub case_id: String,
    pub event_id: String,
    pub rule_type: String,
    pub severity: Severity,
    pub score_contribution: f64,
    pub description: String,
    pub detected_at: DateTime<Utc>,
}
