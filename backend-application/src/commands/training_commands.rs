use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{AppError, AppState};
use backend_domain::services::anomaly::train_baseline;
use backend_domain::services::features::reference_features;
use backend_domain::RawRecord;

#[derive(Debug, Deserialize)]
struct TrainingDataset {
    #[serde(default)]
    events: Vec<RawRecord>,
}

#[derive(Debug, Serialize)]
pub struct TrainingReport {
    pub training_samples: usize,
    pub model_version: String,
    pub model_path: String,
}

/// Trains the shared baseline model from the reference dataset and publishes
/// it atomically. Concurrent training attempts serialize on the training
/// lock; a failed attempt leaves the prior model in place.
pub async fn train_baseline_model(
    state: &AppState,
    dataset_path: Option<&str>,
) -> Result<TrainingReport, AppError> {
    let _guard = state.training_lock.lock().await;

    let path = dataset_path.unwrap_or(&state.config.training_dataset_path);
    let content = tokio::fs::read(path)
        .await
        .map_err(|err| AppError::BadRequest(format!("training file {path}: {err}")))?;
    let dataset: TrainingDataset = serde_json::from_slice(&content)
        .map_err(|err| AppError::BadRequest(format!("training file {path}: {err}")))?;

    let features = reference_features(&dataset.events);
    let model = train_baseline(&features).map_err(|err| AppError::BadRequest(err.to_string()))?;

    state
        .model_store
        .save(&model)
        .await
        .map_err(AppError::Internal)?;
    let report = TrainingReport {
        training_samples: features.len(),
        model_version: model.version.clone(),
        model_path: state.config.model_path.clone(),
    };
    *state.baseline.write().await = Some(Arc::new(model));
    state.metrics.record_training();

    info!(
        samples = report.training_samples,
        version = %report.model_version,
        "baseline model trained and published"
    );
    Ok(report)
}
