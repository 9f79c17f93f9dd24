// Case entity and lifecycle states

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaseStatus {
    Created,
    Uploaded,
    Processing,
    Normalized,
    Analyzed,
    Reported,
    Failed,
}

impl CaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseStatus::Created => "CREATED",
            CaseStatus::Uploaded => "UPLOADED",
            CaseStatus::Processing => "PROCESSING",
            CaseStatus::Normalized => "NORMALIZED",
            CaseStatus::Analyzed => "ANALYZED",
            CaseStatus::Reported => "REPORTED",
            CaseStatus::Failed => "FAILED",
        }
    }
}

impl From<&str> for CaseStatus {
    fn from(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "UPLOADED" => CaseStatus::Uploaded,
            "PROCESSING" => CaseStatus::Processing,
            "NORMALIZED" => CaseStatus::Normalized,
            "ANALYZED" => CaseStatus::Analyzed,
            "REPORTED" => CaseStatus::Reported,
            "FAILED" => CaseStatus::Failed,
            _ => CaseStatus::Created,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseRecord {
    pub id: String,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub status: CaseStatus,
    pub records_count: u64,
    pub risk_score: f64,
    pub risk_level: String,
    pub last_analysis_run: Option<DateTime<Utc>>,
}
