// Schema-inference normalization
// Maps arbitrary raw records onto the unified event schema with batch-level
// statistical imputation and an invalid-ratio gate

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

use crate::entities::{RawRecord, UnifiedEvent};
use crate::error::NormalizeError;

/// Batches with more than this fraction of invalid events are rejected whole.
pub const INVALID_RATIO_LIMIT: f64 = 0.5;

const MISSING_USER_ERROR: &str = "Missing user identifier";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Csv,
    Json,
    Txt,
}

impl SourceFormat {
    pub fn from_filename(filename: &str) -> Result<Self, NormalizeError> {
        let lower = filename.to_lowercase();
        if lower.ends_with(".csv") {
            Ok(SourceFormat::Csv)
        } else if lower.ends_with(".json") {
            Ok(SourceFormat::Json)
        } else if lower.ends_with(".txt") {
            Ok(SourceFormat::Txt)
        } else {
            Err(NormalizeError::UnsupportedFormat(filename.to_string()))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldCategory {
    Timestamp,
    User,
    Receiver,
    Amount,
    Kind,
    Source,
    Metadata,
}

/// Ordered keyword table for field-name classification. Evaluated top to
/// bottom, first matching category wins; unmatched names land in metadata.
const CLASSIFICATION_TABLE: &[(FieldCategory, &[&str])] = &[
    (
        FieldCategory::Timestamp,
        &["time", "date", "timestamp", "created", "updated", "at"],
    ),
    (
        FieldCategory::User,
        &["user", "from", "sender", "actor", "person", "name", "caller"],
    ),
    (
        FieldCategory::Receiver,
        &["to", "receiver", "recipient", "target", "callee"],
    ),
    (
        FieldCategory::Amount,
        &["amount", "value", "price", "cost", "sum", "total"],
    ),
    (
        FieldCategory::Kind,
        &["type", "event", "action", "activity", "category"],
    ),
    (FieldCategory::Source, &["source"]),
];

pub fn classify_field(name: &str) -> FieldCategory {
    let lower = name.to_lowercase();
    for (category, keywords) in CLASSIFICATION_TABLE {
        if keywords.iter().any(|keyword| lower.contains(keyword)) {
            return *category;
        }
    }
    FieldCategory::Metadata
}

/// A value is unusable when it is null, NaN, or a blank/placeholder string.
pub fn is_valid_value(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Number(n) => n.as_f64().map(f64::is_finite).unwrap_or(true),
        Value::String(s) => {
            let trimmed = s.trim();
            !trimmed.is_empty()
                && !matches!(trimmed.to_lowercase().as_str(), "nan" | "null" | "none")
        }
        _ => true,
    }
}

/// Deterministic index source for statistical imputation. Injectable so tests
/// can pin exact draws.
pub trait IndexPicker: Send + Sync {
    fn pick(&self, seed: u64, len: usize) -> usize;
}

/// SplitMix64 over the record's ordinal index; identical input bytes always
/// impute identical values.
pub struct SplitMixPicker;

impl IndexPicker for SplitMixPicker {
    fn pick(&self, seed: u64, len: usize) -> usize {
        let mut z = seed.wrapping_add(0x9E37_79B9_7F4A_7C15);
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^= z >> 31;
        (z % len as u64) as usize
    }
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct NormalizationStats {
    pub total: usize,
    pub invalid: usize,
    pub imputed_users: usize,
    pub imputed_receivers: usize,
    pub timestamp_fallbacks: usize,
}

#[derive(Debug)]
pub struct NormalizedBatch {
    pub events: Vec<UnifiedEvent>,
    pub stats: NormalizationStats,
}

impl NormalizedBatch {
    pub fn valid_count(&self) -> usize {
        self.stats.total - self.stats.invalid
    }
}

pub struct Normalizer {
    picker: Box<dyn IndexPicker>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Normalizer {
    pub fn new() -> Self {
        Self {
            picker: Box::new(SplitMixPicker),
        }
    }

    pub fn with_picker(picker: Box<dyn IndexPicker>) -> Self {
        Self { picker }
    }

    pub fn normalize(
        &self,
        case_id: &str,
        format: SourceFormat,
        content: &[u8],
        ingested_at: DateTime<Utc>,
    ) -> Result<NormalizedBatch, NormalizeError> {
        let raw_records = match format {
            SourceFormat::Csv => parse_csv(content),
            SourceFormat::Json => parse_json(content),
            SourceFormat::Txt => parse_txt(content),
        }
        .ok_or(NormalizeError::ParseFailure)?;
        if raw_records.is_empty() {
            return Err(NormalizeError::ParseFailure);
        }

        let population = ObservedPopulation::collect(&raw_records);
        let mut stats = NormalizationStats {
            total: raw_records.len(),
            ..NormalizationStats::default()
        };
        let mut events = Vec::with_capacity(raw_records.len());

        for (index, raw) in raw_records.iter().enumerate() {
            let mut draft = build_event(case_id, raw, ingested_at);
            if draft.timestamp_fallback {
                stats.timestamp_fallbacks += 1;
            }

            if !draft.user_resolved {
                if population.users.is_empty() {
                    draft.event.is_valid = false;
                    draft
                        .event
                        .validation_errors
                        .push(MISSING_USER_ERROR.to_string());
                } else {
                    let pick = self.picker.pick(index as u64, population.users.len());
                    draft.event.user_id = population.users[pick].clone();
                    stats.imputed_users += 1;
                }
            }

            if draft.event.receiver.is_none() && !population.receivers.is_empty() {
                let pick = self
                    .picker
                    .pick(index as u64 + 1000, population.receivers.len());
                draft.event.receiver = Some(population.receivers[pick].clone());
                stats.imputed_receivers += 1;
            }

            if draft.event.source == "unknown" {
                if let Some(source) = &population.top_source {
                    draft.event.source = source.clone();
                }
            }
            if draft.event.event_type == "unknown" {
                if let Some(kind) = &population.top_kind {
                    draft.event.event_type = kind.clone();
                }
            }

            if !draft.event.is_valid {
                stats.invalid += 1;
            }
            events.push(draft.event);
        }

        let ratio = stats.invalid as f64 / stats.total as f64;
        if ratio > INVALID_RATIO_LIMIT {
            return Err(NormalizeError::validation_gate(stats.invalid, stats.total));
        }

        Ok(NormalizedBatch { events, stats })
    }
}

struct DraftEvent {
    event: UnifiedEvent,
    user_resolved: bool,
    timestamp_fallback: bool,
}

fn build_event(case_id: &str, raw: &RawRecord, ingested_at: DateTime<Utc>) -> DraftEvent {
    let mut event_type = "unknown".to_string();
    let mut source = "unknown".to_string();
    let mut user_id: Option<String> = None;
    let mut receiver: Option<String> = None;
    let mut timestamp: Option<DateTime<Utc>> = None;
    let mut amount: Option<f64> = None;
    let mut metadata = Map::new();

    for (key, value) in raw {
        if !is_valid_value(value) {
            continue;
        }
        match classify_field(key) {
            FieldCategory::Timestamp => {
                if timestamp.is_none() {
                    timestamp = parse_timestamp(value);
                }
            }
            FieldCategory::User => {
                if user_id.is_none() {
                    user_id = Some(value_to_string(value));
                }
            }
            FieldCategory::Receiver => {
                if receiver.is_none() {
                    receiver = Some(value_to_string(value));
                }
            }
            FieldCategory::Amount => {
                if amount.is_none() {
                    amount = parse_amount(value);
                }
            }
            FieldCategory::Kind => {
                let key_lower = key.to_lowercase();
                if key_lower.contains("event") && event_type == "unknown" {
                    event_type = value_to_string(value).to_lowercase();
                } else if key_lower.contains("source") && source == "unknown" {
                    source = value_to_string(value).to_lowercase();
                } else if event_type == "unknown" {
                    event_type = value_to_string(value).to_lowercase();
                }
            }
            FieldCategory::Source => {
                if source == "unknown" {
                    source = value_to_string(value);
                }
            }
            FieldCategory::Metadata => {
                metadata.insert(key.clone(), value.clone());
            }
        }
    }

    let timestamp_fallback = timestamp.is_none();

    let mut user_resolved = user_id.is_some();
    if user_id.is_none() {
        for (key, value) in &metadata {
            if key.to_lowercase().contains("id") && is_valid_value(value) {
                user_id = Some(value_to_string(value));
                user_resolved = true;
                break;
            }
        }
    }
    let user_id = user_id.unwrap_or_else(|| fallback_user_id(raw));

    if source == "unknown" {
        source = match event_type.as_str() {
            "message" | "chat" => "messaging".to_string(),
            "call" | "voice" => "calls".to_string(),
            "transaction" | "payment" | "transfer" => "financial".to_string(),
            "email" => "email".to_string(),
            "login" | "access" => "system".to_string(),
            _ => source,
        };
        // Platform names in metadata override the event-type mapping.
        'scan: for (key, value) in &metadata {
            if !is_valid_value(value) {
                continue;
            }
            let key_lower = key.to_lowercase();
            let value_lower = value_to_string(value).to_lowercase();
            for platform in ["whatsapp", "telegram", "signal"] {
                if key_lower.contains(platform) || value_lower.contains(platform) {
                    source = platform.to_string();
                    break 'scan;
                }
            }
        }
    }

    DraftEvent {
        event: UnifiedEvent {
            event_id: Uuid::new_v4().to_string(),
            case_id: case_id.to_string(),
            event_type,
            user_id,
            timestamp: timestamp.unwrap_or(ingested_at),
            source,
            amount,
            receiver,
            metadata,
            is_valid: true,
            validation_errors: Vec::new(),
        },
        user_resolved,
        timestamp_fallback,
    }
}

/// Bounded pseudo id derived from the record contents; collisions are
/// expected and acceptable only as the very last resort.
fn fallback_user_id(raw: &RawRecord) -> String {
    let serialized = serde_json::to_string(raw).unwrap_or_default();
    let digest = Sha256::digest(serialized.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    format!("user_{:04}", u64::from_le_bytes(bytes) % 10_000)
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%m/%d/%Y", "%d-%m-%Y"];

/// Free-form timestamp parsing with a Unix-epoch-seconds fallback.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => DateTime::from_timestamp(n.as_f64()? as i64, 0),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(parsed) = DateTime::parse_from_rfc3339(s) {
                return Some(parsed.with_timezone(&Utc));
            }
            for format in DATETIME_FORMATS {
                if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
                    return Some(Utc.from_utc_datetime(&naive));
                }
            }
            for format in DATE_FORMATS {
                if let Ok(date) = NaiveDate::parse_from_str(s, format) {
                    return Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?));
                }
            }
            let seconds = s.parse::<f64>().ok()?;
            DateTime::from_timestamp(seconds as i64, 0)
        }
        _ => None,
    }
}

/// Currency symbols and thousands separators are stripped before parsing.
fn parse_amount(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned: String = s
                .chars()
                .filter(|c| !matches!(c, '$' | '€' | '£' | '₹' | ',' | ' '))
                .collect();
            cleaned.parse::<f64>().ok()
        }
        _ => None,
    }
}

struct ObservedPopulation {
    users: Vec<String>,
    receivers: Vec<String>,
    top_source: Option<String>,
    top_kind: Option<String>,
}

impl ObservedPopulation {
    /// First pass over the batch: gather every classified user/receiver value
    /// and the frequency of source/type values for imputation.
    fn collect(records: &[RawRecord]) -> Self {
        let mut users = BTreeSet::new();
        let mut receivers = BTreeSet::new();
        let mut sources: HashMap<String, usize> = HashMap::new();
        let mut kinds: HashMap<String, usize> = HashMap::new();

        for raw in records {
            for (key, value) in raw {
                if !is_valid_value(value) {
                    continue;
                }
                match classify_field(key) {
                    FieldCategory::User => {
                        users.insert(value_to_string(value));
                    }
                    FieldCategory::Receiver => {
                        receivers.insert(value_to_string(value));
                    }
                    FieldCategory::Source => {
                        *sources
                            .entry(value_to_string(value).to_lowercase())
                            .or_insert(0) += 1;
                    }
                    FieldCategory::Kind => {
                        let key_lower = key.to_lowercase();
                        let lowered = value_to_string(value).to_lowercase();
                        if key_lower.contains("event") {
                            *kinds.entry(lowered).or_insert(0) += 1;
                        } else if key_lower.contains("source") {
                            *sources.entry(lowered).or_insert(0) += 1;
                        }
                    }
                    _ => {}
                }
            }
        }

        Self {
            users: users.into_iter().collect(),
            receivers: receivers.into_iter().collect(),
            top_source: most_frequent(&sources),
            top_kind: most_frequent(&kinds),
        }
    }
}

/// Ties break toward the lexicographically smallest value so reruns are
/// stable.
fn most_frequent(counts: &HashMap<String, usize>) -> Option<String> {
    counts
        .iter()
        .filter(|(value, _)| value.as_str() != "unknown")
        .max_by(|(a_value, a_count), (b_value, b_count)| {
            a_count.cmp(b_count).then(b_value.cmp(a_value))
        })
        .map(|(value, _)| value.clone())
}

fn parse_csv(content: &[u8]) -> Option<Vec<RawRecord>> {
    let text = match std::str::from_utf8(content) {
        Ok(text) => text.to_string(),
        Err(_) => latin1_decode(content),
    };
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());
    let headers = reader.headers().ok()?.clone();
    let mut records = Vec::new();
    for row in reader.records() {
        let Ok(row) = row else { continue };
        let mut map = Map::new();
        for (index, field) in row.iter().enumerate() {
            let name = headers
                .get(index)
                .map(ToString::to_string)
                .unwrap_or_else(|| format!("column_{index}"));
            map.insert(name, infer_scalar(field));
        }
        records.push(map);
    }
    if records.is_empty() {
        None
    } else {
        Some(records)
    }
}

/// Secondary decoding retry for non-UTF-8 exports.
fn latin1_decode(content: &[u8]) -> String {
    content.iter().map(|&byte| byte as char).collect()
}

fn infer_scalar(field: &str) -> Value {
    let trimmed = field.trim();
    if let Ok(integer) = trimmed.parse::<i64>() {
        return Value::from(integer);
    }
    if let Ok(float) = trimmed.parse::<f64>() {
        if let Some(number) = serde_json::Number::from_f64(float) {
            return Value::Number(number);
        }
    }
    Value::String(field.to_string())
}

fn parse_json(content: &[u8]) -> Option<Vec<RawRecord>> {
    match serde_json::from_slice::<Value>(content) {
        Ok(Value::Object(map)) => {
            // Object-of-arrays: every nested array's elements become events,
            // tagged with the key they were extracted from.
            let mut events = Vec::new();
            for (key, value) in &map {
                if let Value::Array(items) = value {
                    for item in items {
                        if let Value::Object(obj) = item {
                            let mut obj = obj.clone();
                            if !obj.contains_key("source") && !obj.contains_key("source_type") {
                                obj.insert(
                                    "_extracted_from".to_string(),
                                    Value::String(key.clone()),
                                );
                            }
                            events.push(obj);
                        }
                    }
                }
            }
            if events.is_empty() {
                return Some(vec![map]);
            }
            Some(events)
        }
        Ok(Value::Array(items)) => Some(
            items
                .into_iter()
                .filter_map(|item| match item {
                    Value::Object(map) => Some(map),
                    _ => None,
                })
                .collect(),
        ),
        Ok(_) => None,
        Err(_) => parse_json_lines(content),
    }
}

fn parse_json_lines(content: &[u8]) -> Option<Vec<RawRecord>> {
    let text = std::str::from_utf8(content).ok()?;
    let mut events = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(line) {
            Ok(Value::Object(map)) => events.push(map),
            Ok(_) => continue,
            Err(_) => return None,
        }
    }
    if events.is_empty() {
        None
    } else {
        Some(events)
    }
}

fn parse_txt(content: &[u8]) -> Option<Vec<RawRecord>> {
    let text = std::str::from_utf8(content).ok()?;
    let first_line = text.trim().lines().next()?;
    if first_line.contains('\t') || first_line.contains(',') {
        return parse_csv(content);
    }
    let records: Vec<RawRecord> = text
        .trim()
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let mut map = Map::new();
            map.insert("raw_line".to_string(), Value::String(line.to_string()));
            map.insert("text".to_string(), Value::String(line.to_string()));
            map
        })
        .collect();
    if records.is_empty() {
        None
    } else {
        Some(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn record(pairs: &[(&str, Value)]) -> RawRecord {
        let mut map = Map::new();
        for (key, value) in pairs {
            map.insert(key.to_string(), value.clone());
        }
        map
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn classify_field_uses_first_matching_category() {
        assert_eq!(classify_field("timestamp"), FieldCategory::Timestamp);
        assert_eq!(classify_field("created_at"), FieldCategory::Timestamp);
        assert_eq!(classify_field("sender_id"), FieldCategory::User);
        assert_eq!(classify_field("recipient"), FieldCategory::Receiver);
        assert_eq!(classify_field("transfer_amount"), FieldCategory::Amount);
        assert_eq!(classify_field("event_type"), FieldCategory::Kind);
        assert_eq!(classify_field("source_type"), FieldCategory::Kind);
        assert_eq!(classify_field("source"), FieldCategory::Source);
        assert_eq!(classify_field("device_model"), FieldCategory::Metadata);
    }

    #[test]
    fn invalid_values_are_skipped() {
        assert!(!is_valid_value(&Value::Null));
        assert!(!is_valid_value(&Value::String("  ".to_string())));
        assert!(!is_valid_value(&Value::String("NaN".to_string())));
        assert!(!is_valid_value(&Value::String("null".to_string())));
        assert!(!is_valid_value(&Value::String("None".to_string())));
        assert!(is_valid_value(&Value::String("alice".to_string())));
        assert!(is_valid_value(&Value::from(0)));
    }

    #[test]
    fn timestamp_parsing_covers_common_shapes() {
        let iso = parse_timestamp(&Value::String("2024-03-01T10:30:00Z".to_string())).unwrap();
        assert_eq!(iso.hour(), 10);
        let spaced = parse_timestamp(&Value::String("2024-03-01 03:15:00".to_string())).unwrap();
        assert_eq!(spaced.hour(), 3);
        let date_only = parse_timestamp(&Value::String("2024-03-01".to_string())).unwrap();
        assert_eq!(date_only.hour(), 0);
        let epoch = parse_timestamp(&Value::from(1_709_287_800)).unwrap();
        assert_eq!(epoch.timestamp(), 1_709_287_800);
        let epoch_string = parse_timestamp(&Value::String("1709287800".to_string())).unwrap();
        assert_eq!(epoch_string.timestamp(), 1_709_287_800);
        assert!(parse_timestamp(&Value::String("not a date".to_string())).is_none());
    }

    #[test]
    fn amount_strips_currency_symbols_and_separators() {
        let raw = record(&[
            ("user_id", Value::String("u1".to_string())),
            ("amount", Value::String("$12,500.50".to_string())),
        ]);
        let draft = build_event("case", &raw, now());
        assert_eq!(draft.event.amount, Some(12_500.50));
    }

    #[test]
    fn event_type_key_beats_source_type_key() {
        let raw = record(&[
            ("user_id", Value::String("u1".to_string())),
            ("event_type", Value::String("Transaction".to_string())),
            ("source_type", Value::String("Banking".to_string())),
        ]);
        let draft = build_event("case", &raw, now());
        assert_eq!(draft.event.event_type, "transaction");
        assert_eq!(draft.event.source, "banking");
    }

    #[test]
    fn source_derived_from_event_type_then_platform_scan() {
        let raw = record(&[
            ("user_id", Value::String("u1".to_string())),
            ("event_type", Value::String("message".to_string())),
        ]);
        let draft = build_event("case", &raw, now());
        assert_eq!(draft.event.source, "messaging");

        let raw = record(&[
            ("user_id", Value::String("u1".to_string())),
            ("event_type", Value::String("message".to_string())),
            ("app", Value::String("WhatsApp Business".to_string())),
        ]);
        let draft = build_event("case", &raw, now());
        assert_eq!(draft.event.source, "whatsapp");
    }

    #[test]
    fn user_falls_back_to_metadata_id_keys() {
        let raw = record(&[
            ("device_id", Value::String("dev-42".to_string())),
            ("payload", Value::String("hello".to_string())),
        ]);
        let draft = build_event("case", &raw, now());
        assert!(draft.user_resolved);
        assert_eq!(draft.event.user_id, "dev-42");
    }

    #[test]
    fn timestamp_falls_back_to_ingestion_time() {
        let raw = record(&[("user_id", Value::String("u1".to_string()))]);
        let draft = build_event("case", &raw, now());
        assert!(draft.timestamp_fallback);
        assert_eq!(draft.event.timestamp, now());
    }

    #[test]
    fn csv_batch_normalizes_with_typed_amounts() {
        let content = b"user_id,amount,event_type,timestamp\n\
            alice,1500.0,transaction,2024-03-01T10:00:00Z\n\
            bob,200,transaction,2024-03-01T11:00:00Z\n";
        let batch = Normalizer::new()
            .normalize("case", SourceFormat::Csv, content, now())
            .unwrap();
        assert_eq!(batch.events.len(), 2);
        assert_eq!(batch.stats.invalid, 0);
        assert_eq!(batch.events[0].user_id, "alice");
        assert_eq!(batch.events[0].amount, Some(1500.0));
        assert_eq!(batch.events[1].amount, Some(200.0));
    }

    #[test]
    fn json_object_of_arrays_extracts_and_tags_all_arrays() {
        let content = br#"{"messages":[{"sender":"alice","text":"hi"}],"calls":[{"caller":"bob","duration":30}]}"#;
        let batch = Normalizer::new()
            .normalize("case", SourceFormat::Json, content, now())
            .unwrap();
        assert_eq!(batch.events.len(), 2);
        let users: Vec<&str> = batch.events.iter().map(|e| e.user_id.as_str()).collect();
        assert!(users.contains(&"alice"));
        assert!(users.contains(&"bob"));
    }

    #[test]
    fn line_delimited_json_is_a_fallback() {
        let content = b"{\"user\":\"alice\",\"event_type\":\"login\"}\n{\"user\":\"bob\",\"event_type\":\"login\"}\n";
        let batch = Normalizer::new()
            .normalize("case", SourceFormat::Json, content, now())
            .unwrap();
        assert_eq!(batch.events.len(), 2);
        assert_eq!(batch.events[0].source, "system");
    }

    #[test]
    fn txt_with_delimiters_parses_as_tabular() {
        let content = b"user,amount\nalice,50\n";
        let batch = Normalizer::new()
            .normalize("case", SourceFormat::Txt, content, now())
            .unwrap();
        assert_eq!(batch.events.len(), 1);
        assert_eq!(batch.events[0].user_id, "alice");
    }

    #[test]
    fn exhausted_cascade_is_a_parse_failure() {
        let err = Normalizer::new()
            .normalize("case", SourceFormat::Json, b"not json at all", now())
            .unwrap_err();
        assert!(matches!(err, NormalizeError::ParseFailure));
    }

    #[test]
    fn imputation_is_deterministic_across_runs() {
        let content = br#"[
            {"sender":"alice","event_type":"message"},
            {"sender":"bob","event_type":"message"},
            {"note":"no user here","ref_id":"nan","event_type":"message"},
            {"note":"still no user","ref_id":"nan","event_type":"message"}
        ]"#;
        let first = Normalizer::new()
            .normalize("case", SourceFormat::Json, content, now())
            .unwrap();
        let second = Normalizer::new()
            .normalize("case", SourceFormat::Json, content, now())
            .unwrap();
        let first_users: Vec<&str> = first.events.iter().map(|e| e.user_id.as_str()).collect();
        let second_users: Vec<&str> = second.events.iter().map(|e| e.user_id.as_str()).collect();
        assert_eq!(first_users, second_users);
        assert_eq!(first.stats.imputed_users, 2);
        for event in &first.events {
            assert!(["alice", "bob"].contains(&event.user_id.as_str()));
            assert!(event.is_valid);
        }
    }

    #[test]
    fn unresolved_source_and_type_take_most_frequent_values() {
        let content = br#"[
            {"sender":"alice","event_type":"transaction","source":"bank"},
            {"sender":"bob","event_type":"transaction","source":"bank"},
            {"sender":"carol","other_field":"x"}
        ]"#;
        let batch = Normalizer::new()
            .normalize("case", SourceFormat::Json, content, now())
            .unwrap();
        let carol = batch
            .events
            .iter()
            .find(|e| e.user_id == "carol")
            .unwrap();
        assert_eq!(carol.event_type, "transaction");
        assert_eq!(carol.source, "bank");
    }

    #[test]
    fn batch_with_over_half_invalid_is_rejected() {
        // 6 of 10 records carry no user field, no metadata id, and the pool
        // of observed users is empty.
        let mut lines = Vec::new();
        for i in 0..6 {
            lines.push(format!("{{\"payload\":\"junk {i}\"}}"));
        }
        for i in 0..4 {
            lines.push(format!("{{\"device_id\":\"dev-{i}\"}}"));
        }
        let content = lines.join("\n");
        let err = Normalizer::new()
            .normalize("case", SourceFormat::Json, content.as_bytes(), now())
            .unwrap_err();
        match err {
            NormalizeError::ValidationGate {
                invalid,
                total,
                percent,
            } => {
                assert_eq!(invalid, 6);
                assert_eq!(total, 10);
                assert!((percent - 60.0).abs() < f64::EPSILON);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("60.0%"));
    }

    #[test]
    fn half_invalid_exactly_is_not_rejected() {
        let content = "{\"payload\":\"junk\"}\n{\"device_id\":\"dev-1\"}";
        let batch = Normalizer::new()
            .normalize("case", SourceFormat::Json, content.as_bytes(), now())
            .unwrap();
        assert_eq!(batch.stats.invalid, 1);
        assert_eq!(batch.valid_count(), 1);
    }
}
