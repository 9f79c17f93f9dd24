use tracing::error;

use crate::{AppError, AppState};
use backend_domain::AnomalyResult;

pub async fn list_anomaly_results(
    state: &AppState,
    case_id: &str,
) -> Result<Vec<AnomalyResult>, AppError> {
    state
        .anomaly_repo
        .fetch_results(case_id)
        .await
        .map_err(|err| {
            error!("failed to fetch anomaly results: {}", err);
            AppError::Internal(err)
        })
}
