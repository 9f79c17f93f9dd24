use chrono::Utc;
use uuid::Uuid;

use crate::{AppError, AppState};
use backend_domain::{CaseRecord, CaseStatus};

pub async fn create_case(
    state: &AppState,
    name: String,
    description: String,
) -> Result<CaseRecord, AppError> {
    if name.trim().is_empty() {
        return Err(AppError::BadRequest("case name must not be empty".to_string()));
    }
    let case = CaseRecord {
        id: Uuid::new_v4().to_string(),
        name,
        description,
        created_at: Utc::now(),
        status: CaseStatus::Created,
        records_count: 0,
        risk_score: 0.0,
        risk_level: "low".to_string(),
        last_analysis_run: None,
    };
    state
        .case_repo
        .insert_case(&case)
        .await
        .map_err(AppError::Internal)?;
    Ok(case)
}
