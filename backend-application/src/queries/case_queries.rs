use tracing::error;

use crate::{AppError, AppState};
use backend_domain::CaseRecord;

pub async fn get_case(state: &AppState, case_id: &str) -> Result<CaseRecord, AppError> {
    state
        .case_repo
        .fetch_case(case_id)
        .await
        .map_err(|err| {
            error!("failed to fetch case: {}", err);
            AppError::Internal(err)
        })?
        .ok_or_else(|| AppError::NotFound(format!("case {case_id}")))
}

pub async fn list_cases(state: &AppState) -> Result<Vec<CaseRecord>, AppError> {
    state.case_repo.list_cases().await.map_err(|err| {
        error!("failed to list cases: {}", err);
        AppError::Internal(err)
    })
}
