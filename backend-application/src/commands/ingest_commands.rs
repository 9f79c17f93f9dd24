use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use crate::{AppError, AppState};
use backend_domain::services::normalizer::{NormalizationStats, Normalizer, SourceFormat};
use backend_domain::CaseStatus;

#[derive(Debug, Serialize)]
pub struct IngestReport {
    pub case_id: String,
    pub valid_events: usize,
    pub invalid_events: usize,
    pub stats: NormalizationStats,
}

/// Runs one upload through normalization and persists the unified events.
/// Parse failures and the invalid-ratio gate reject the whole batch and move
/// the case to Failed; a later upload re-enters from there.
pub async fn process_upload(
    state: &AppState,
    case_id: &str,
    filename: &str,
    content: &[u8],
) -> Result<IngestReport, AppError> {
    let case = state
        .case_repo
        .fetch_case(case_id)
        .await
        .map_err(AppError::Internal)?
        .ok_or_else(|| AppError::NotFound(format!("case {case_id}")))?;

    state
        .case_repo
        .update_status(case_id, CaseStatus::Processing)
        .await
        .map_err(AppError::Internal)?;

    let format = match SourceFormat::from_filename(filename) {
        Ok(format) => format,
        Err(err) => {
            state.metrics.record_upload_error();
            mark_failed(state, case_id).await?;
            return Err(AppError::BadRequest(err.to_string()));
        }
    };

    let batch = match Normalizer::new().normalize(case_id, format, content, Utc::now()) {
        Ok(batch) => batch,
        Err(err) => {
            warn!(case_id, error = %err, "normalization rejected upload");
            state.metrics.record_upload_error();
            state.metrics.record_rejected_batch();
            mark_failed(state, case_id).await?;
            return Err(AppError::BadRequest(err.to_string()));
        }
    };

    if let Err(err) = state.event_repo.insert_events(&batch.events).await {
        state.metrics.record_upload_error();
        mark_failed(state, case_id).await?;
        return Err(AppError::Internal(err));
    }

    let valid = batch.valid_count();
    state
        .case_repo
        .update_records_count(case_id, case.records_count + valid as u64)
        .await
        .map_err(AppError::Internal)?;
    state
        .case_repo
        .update_status(case_id, CaseStatus::Normalized)
        .await
        .map_err(AppError::Internal)?;

    state.metrics.record_upload(valid);
    info!(
        case_id,
        total = batch.stats.total,
        invalid = batch.stats.invalid,
        imputed_users = batch.stats.imputed_users,
        imputed_receivers = batch.stats.imputed_receivers,
        timestamp_fallbacks = batch.stats.timestamp_fallbacks,
        "upload normalized"
    );

    Ok(IngestReport {
        case_id: case_id.to_string(),
        valid_events: valid,
        invalid_events: batch.stats.invalid,
        stats: batch.stats,
    })
}

async fn mark_failed(state: &AppState, case_id: &str) -> Result<(), AppError> {
    state
        .case_repo
        .update_status(case_id, CaseStatus::Failed)
        .await
        .map_err(AppError::Internal)
}
