// Feature encoding for the anomaly model
// Fixed 5-dimensional numeric vector per event

use chrono::Timelike;
use serde_json::json;

use crate::entities::{RawRecord, UnifiedEvent};
use crate::services::normalizer::parse_timestamp;

pub const FEATURE_DIM: usize = 5;

pub type Features = [f64; FEATURE_DIM];

pub fn extract_features(event: &UnifiedEvent) -> Features {
    [
        event.amount.unwrap_or(0.0),
        f64::from(event.timestamp.hour()),
        event.metadata.len() as f64,
        if event.event_type == "transaction" { 1.0 } else { 0.0 },
        if event.event_type == "message" { 1.0 } else { 0.0 },
    ]
}

pub fn batch_features(events: &[UnifiedEvent]) -> Vec<Features> {
    events.iter().map(extract_features).collect()
}

pub fn feature_snapshot(features: &Features) -> String {
    json!({
        "amount": features[0],
        "hour": features[1] as i64,
        "metadata_size": features[2] as i64,
        "is_transaction": features[3] as i64,
        "is_message": features[4] as i64,
    })
    .to_string()
}

/// Feature vectors for the reference training dataset, whose records are raw
/// (not yet normalized): amount and timestamp are read directly, the whole
/// record counts as metadata, and the source field stands in for the type.
pub fn reference_features(records: &[RawRecord]) -> Vec<Features> {
    records
        .iter()
        .map(|record| {
            let amount = record
                .get("amount")
                .and_then(serde_json::Value::as_f64)
                .unwrap_or(0.0);
            let hour = record
                .get("timestamp")
                .and_then(parse_timestamp)
                .map(|ts| f64::from(ts.hour()))
                .unwrap_or(12.0);
            let kind = record
                .get("source")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("message");
            [
                amount,
                hour,
                record.len() as f64,
                if kind == "transaction" { 1.0 } else { 0.0 },
                if kind == "message" { 1.0 } else { 0.0 },
            ]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::{Map, Value};

    #[test]
    fn unified_event_encodes_five_dimensions() {
        let mut metadata = Map::new();
        metadata.insert("a".to_string(), Value::from(1));
        metadata.insert("b".to_string(), Value::from(2));
        let event = UnifiedEvent {
            event_id: "e1".to_string(),
            case_id: "case".to_string(),
            event_type: "transaction".to_string(),
            user_id: "alice".to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 14, 0, 0).unwrap(),
            source: "financial".to_string(),
            amount: Some(250.0),
            receiver: None,
            metadata,
            is_valid: true,
            validation_errors: Vec::new(),
        };
        let features = extract_features(&event);
        assert_eq!(features, [250.0, 14.0, 2.0, 1.0, 0.0]);
        let snapshot = feature_snapshot(&features);
        assert!(snapshot.contains("\"amount\":250.0"));
        assert!(snapshot.contains("\"hour\":14"));
    }

    #[test]
    fn reference_records_default_missing_fields() {
        let mut record = Map::new();
        record.insert("source".to_string(), Value::String("message".to_string()));
        let features = reference_features(&[record]);
        assert_eq!(features[0], [0.0, 12.0, 1.0, 0.0, 1.0]);
    }
}
