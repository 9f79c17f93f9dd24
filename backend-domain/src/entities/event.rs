// Unified event entity
// Every heterogeneous input record is reconciled into this shape

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An arbitrary key/value record as it arrives from an upload, before any
/// schema inference has been applied.
pub type RawRecord = Map<String, Value>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedEvent {
    pub event_id: String,
    pub case_id: String,
    pub event_type: String,
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub amount: Option<f64>,
    pub receiver: Option<String>,
    pub metadata: Map<String, Value>,
    pub is_valid: bool,
    pub validation_errors: Vec<String>,
}

impl UnifiedEvent {
    pub fn is_transactional(&self) -> bool {
        matches!(self.event_type.as_str(), "transaction" | "transfer")
    }
}
