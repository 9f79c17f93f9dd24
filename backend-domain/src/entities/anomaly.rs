// Anomaly result entity
// One row per event per detection run; a rerun replaces the case's rows

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyResult {
    pub id: String,
    pub case_id: String,
    pub event_id: String,
    pub anomaly_score: f64,
    pub is_anomaly: bool,
    pub model_version: String,
    pub baseline_model_used: bool,
    pub feature_snapshot: String,
    pub detected_at: DateTime<Utc>,
}
