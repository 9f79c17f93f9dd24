use tracing::error;

use crate::{AppError, AppState};
use backend_domain::services::risk::calculate_forensic_risk;
use backend_domain::{CaseRiskSnapshot, ForensicRiskReport};

/// Latest persisted snapshot written by the linear aggregator.
pub async fn latest_snapshot(
    state: &AppState,
    case_id: &str,
) -> Result<CaseRiskSnapshot, AppError> {
    state
        .risk_repo
        .fetch_snapshot(case_id)
        .await
        .map_err(|err| {
            error!("failed to fetch risk snapshot: {}", err);
            AppError::Internal(err)
        })?
        .ok_or_else(|| AppError::NotFound(format!("risk snapshot for case {case_id}")))
}

/// Read-only alternate scoring policy; recomputed on demand from the three
/// persisted result sets and never written back.
pub async fn forensic_report(
    state: &AppState,
    case_id: &str,
) -> Result<ForensicRiskReport, AppError> {
    let findings = state
        .finding_repo
        .fetch_findings(case_id)
        .await
        .map_err(AppError::Internal)?;
    let anomalies = state
        .anomaly_repo
        .fetch_results(case_id)
        .await
        .map_err(AppError::Internal)?;
    let nodes = state
        .graph_repo
        .fetch_nodes(case_id)
        .await
        .map_err(AppError::Internal)?;
    Ok(calculate_forensic_risk(case_id, &findings, &anomalies, &nodes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{create_case, process_upload, run_analysis};
    use crate::test_support::test_state;

    #[tokio::test]
    async fn forensic_view_reads_persisted_results() {
        let (state, _store) = test_state();
        let case = create_case(&state, "probe".to_string(), String::new())
            .await
            .unwrap();
        let mut content = String::from("user_id,receiver,amount,event_type,timestamp\n");
        for i in 0..20 {
            content.push_str(&format!(
                "user-{},peer-{},{},transaction,2024-03-01T{:02}:00:00Z\n",
                i % 3,
                i % 5,
                200 + i * 10,
                8 + (i % 10)
            ));
        }
        content.push_str("user-0,peer-0,20000,transaction,2024-03-01T02:00:00Z\n");
        process_upload(&state, &case.id, "events.csv", content.as_bytes())
            .await
            .unwrap();
        run_analysis(&state, &case.id).await.unwrap();

        let report = forensic_report(&state, &case.id).await.unwrap();
        assert!(!report.justifications.is_empty());
        assert!(report.risk_score_100 < 100.0);
        let snapshot = latest_snapshot(&state, &case.id).await.unwrap();
        // The two policies are independent outputs over the same results.
        assert!((0.0..=100.0).contains(&snapshot.total_score));
    }

    #[tokio::test]
    async fn missing_snapshot_is_not_found() {
        let (state, _store) = test_state();
        let err = latest_snapshot(&state, "missing").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
