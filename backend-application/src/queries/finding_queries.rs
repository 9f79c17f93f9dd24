use tracing::error;

use crate::{AppError, AppState};
use backend_domain::SuspiciousFinding;

pub async fn list_findings(
    state: &AppState,
    case_id: &str,
) -> Result<Vec<SuspiciousFinding>, AppError> {
    state
        .finding_repo
        .fetch_findings(case_id)
        .await
        .map_err(|err| {
            error!("failed to fetch findings: {}", err);
            AppError::Internal(err)
        })
}
