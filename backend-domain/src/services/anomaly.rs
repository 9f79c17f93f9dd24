// Anomaly scoring
// Scores each event's feature vector against the shared baseline model when
// one is available, or an ephemeral per-case model as a degraded fallback

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::{AnomalyResult, UnifiedEvent};
use crate::error::AnalysisError;
use crate::services::features::{batch_features, feature_snapshot, Features};
use crate::services::forest::IsolationForest;

pub const MODEL_VERSION: &str = "v1.0.0";
pub const MIN_SCORING_EVENTS: usize = 10;
pub const MIN_TRAINING_SAMPLES: usize = 100;
pub const CONTAMINATION: f64 = 0.1;

const N_TREES: usize = 100;
const MAX_SAMPLE_SIZE: usize = 256;

/// The persisted baseline artifact: a trained forest plus the outlier-score
/// threshold fixed at training time. Reused read-only across cases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineModel {
    pub version: String,
    pub contamination: f64,
    pub threshold: f64,
    pub forest: IsolationForest,
}

#[derive(Debug)]
pub struct ScoreOutcome {
    pub results: Vec<AnomalyResult>,
    pub anomalies_detected: usize,
    pub average_score: f64,
    pub baseline_model_used: bool,
    pub model_version: String,
}

/// Trains the shared baseline from reference feature vectors.
pub fn train_baseline(features: &[Features]) -> Result<BaselineModel, AnalysisError> {
    if features.len() < MIN_TRAINING_SAMPLES {
        return Err(AnalysisError::TrainingDataTooSmall {
            have: features.len(),
            need: MIN_TRAINING_SAMPLES,
        });
    }
    let mut forest = IsolationForest::new(N_TREES, MAX_SAMPLE_SIZE.min(features.len()));
    forest.fit(features)?;
    let scores: Vec<f64> = features
        .iter()
        .map(|sample| forest.outlier_score(sample))
        .collect();
    let threshold = quantile(scores, 1.0 - CONTAMINATION);
    Ok(BaselineModel {
        version: MODEL_VERSION.to_string(),
        contamination: CONTAMINATION,
        threshold,
        forest,
    })
}

/// Scores one case's valid events. `baseline` is the shared model snapshot;
/// without one an ephemeral model is fit on the case's own features and the
/// degraded mode is flagged on every result.
pub fn score_events(
    case_id: &str,
    events: &[UnifiedEvent],
    baseline: Option<&BaselineModel>,
) -> Result<ScoreOutcome, AnalysisError> {
    if events.len() < MIN_SCORING_EVENTS {
        return Err(AnalysisError::InsufficientData {
            have: events.len(),
            need: MIN_SCORING_EVENTS,
        });
    }

    let features = batch_features(events);
    let ephemeral;
    let (forest, threshold, baseline_model_used, model_version) = match baseline {
        Some(model) => (
            &model.forest,
            model.threshold,
            true,
            model.version.clone(),
        ),
        None => {
            let mut forest = IsolationForest::new(N_TREES, MAX_SAMPLE_SIZE.min(features.len()));
            forest.fit(&features)?;
            let scores: Vec<f64> = features
                .iter()
                .map(|sample| forest.outlier_score(sample))
                .collect();
            let threshold = quantile(scores, 1.0 - CONTAMINATION);
            ephemeral = forest;
            (&ephemeral, threshold, false, MODEL_VERSION.to_string())
        }
    };

    // Raw normality scores (mean path length: longer = more normal) are
    // min-max normalized within the batch, then inverted so that higher
    // values mean "more anomalous".
    let normality: Vec<f64> = features
        .iter()
        .map(|sample| forest.average_path_length(sample))
        .collect();
    let min = normality.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = normality.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;

    let detected_at = Utc::now();
    let mut results = Vec::with_capacity(events.len());
    let mut anomalies_detected = 0;
    let mut score_sum = 0.0;
    for (event, (sample, raw)) in events.iter().zip(features.iter().zip(normality.iter())) {
        let anomaly_score = if range.abs() < f64::EPSILON {
            0.0
        } else {
            1.0 - (raw - min) / range
        };
        let is_anomaly = forest.outlier_score(sample) > threshold;
        if is_anomaly {
            anomalies_detected += 1;
        }
        score_sum += anomaly_score;
        results.push(AnomalyResult {
            id: Uuid::new_v4().to_string(),
            case_id: case_id.to_string(),
            event_id: event.event_id.clone(),
            anomaly_score,
            is_anomaly,
            model_version: model_version.clone(),
            baseline_model_used,
            feature_snapshot: feature_snapshot(sample),
            detected_at,
        });
    }

    Ok(ScoreOutcome {
        average_score: score_sum / results.len() as f64,
        anomalies_detected,
        results,
        baseline_model_used,
        model_version,
    })
}

fn quantile(mut scores: Vec<f64>, q: f64) -> f64 {
    scores.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let index = ((scores.len() - 1) as f64 * q).floor() as usize;
    scores[index]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::Map;

    fn event(id: usize, amount: f64, hour: u32, event_type: &str) -> UnifiedEvent {
        UnifiedEvent {
            event_id: format!("e{id}"),
            case_id: "case".to_string(),
            event_type: event_type.to_string(),
            user_id: format!("user-{}", id % 4),
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap(),
            source: "financial".to_string(),
            amount: Some(amount),
            receiver: None,
            metadata: Map::new(),
            is_valid: true,
            validation_errors: Vec::new(),
        }
    }

    fn varied_events(n: usize) -> Vec<UnifiedEvent> {
        (0..n)
            .map(|i| {
                event(
                    i,
                    100.0 + (i % 7) as f64 * 20.0,
                    (i % 12) as u32 + 8,
                    if i % 2 == 0 { "transaction" } else { "message" },
                )
            })
            .collect()
    }

    #[test]
    fn fewer_than_ten_events_is_insufficient_data() {
        let events = varied_events(9);
        let err = score_events("case", &events, None).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::InsufficientData { have: 9, need: 10 }
        ));
    }

    #[test]
    fn scores_are_bounded_and_anomaly_count_matches_verdicts() {
        let mut events = varied_events(40);
        events.push(event(99, 95_000.0, 3, "transaction"));
        let outcome = score_events("case", &events, None).unwrap();
        assert_eq!(outcome.results.len(), 41);
        assert!(!outcome.baseline_model_used);
        for result in &outcome.results {
            assert!((0.0..=1.0).contains(&result.anomaly_score));
            assert_eq!(result.model_version, MODEL_VERSION);
            assert!(!result.baseline_model_used);
        }
        let verdicts = outcome.results.iter().filter(|r| r.is_anomaly).count();
        assert_eq!(verdicts, outcome.anomalies_detected);
    }

    #[test]
    fn baseline_model_is_preferred_and_flagged() {
        let reference = batch_features(&varied_events(150));
        let model = train_baseline(&reference).unwrap();
        let events = varied_events(20);
        let outcome = score_events("case", &events, Some(&model)).unwrap();
        assert!(outcome.baseline_model_used);
        for result in &outcome.results {
            assert!(result.baseline_model_used);
        }
    }

    #[test]
    fn degenerate_batches_report_zero_scores() {
        let events: Vec<UnifiedEvent> =
            (0..12).map(|i| event(i, 100.0, 10, "message")).collect();
        let outcome = score_events("case", &events, None).unwrap();
        for result in &outcome.results {
            assert_eq!(result.anomaly_score, 0.0);
            assert!(!result.is_anomaly);
        }
    }

    #[test]
    fn training_requires_minimum_samples() {
        let reference = batch_features(&varied_events(50));
        let err = train_baseline(&reference).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::TrainingDataTooSmall { have: 50, need: 100 }
        ));
    }
}
