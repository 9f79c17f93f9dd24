use chrono::Utc;
use serde::Serialize;
use tracing::info;

use crate::{AppError, AppState};
use backend_domain::services::{anomaly, risk, GraphBuilder, RuleEngine};
use backend_domain::{CaseRiskSnapshot, CaseStatus, GraphSummary};

#[derive(Debug, Serialize)]
pub struct AnalysisReport {
    pub case_id: String,
    pub findings: usize,
    pub anomalies_detected: usize,
    pub average_anomaly_score: f64,
    pub baseline_model_used: bool,
    pub graph: GraphSummary,
    pub risk: CaseRiskSnapshot,
}

/// Runs the three detectors over the case's valid events and aggregates the
/// linear risk snapshot. Each detector replaces its own prior results, so
/// reruns are idempotent; the aggregator runs strictly after all three.
pub async fn run_analysis(state: &AppState, case_id: &str) -> Result<AnalysisReport, AppError> {
    state
        .case_repo
        .fetch_case(case_id)
        .await
        .map_err(AppError::Internal)?
        .ok_or_else(|| AppError::NotFound(format!("case {case_id}")))?;

    let events = state
        .event_repo
        .fetch_valid_events(case_id)
        .await
        .map_err(AppError::Internal)?;

    let engine = RuleEngine::new(
        state.config.high_value_threshold,
        state.config.burst_threshold,
    );
    let findings = engine.run(case_id, &events);
    state
        .finding_repo
        .replace_findings(case_id, &findings)
        .await
        .map_err(AppError::Internal)?;
    state.metrics.record_findings(findings.len());

    let graph = GraphBuilder::build(case_id, &events);
    state
        .graph_repo
        .replace_graph(case_id, &graph.nodes, &graph.edges)
        .await
        .map_err(AppError::Internal)?;

    // An InsufficientData verdict leaves the case state untouched; the
    // caller may retry once more data has been uploaded.
    let baseline = state.baseline_snapshot().await;
    let outcome = anomaly::score_events(case_id, &events, baseline.as_deref())
        .map_err(|err| AppError::BadRequest(err.to_string()))?;
    state
        .anomaly_repo
        .replace_results(case_id, &outcome.results)
        .await
        .map_err(AppError::Internal)?;
    state.metrics.record_anomalies(outcome.anomalies_detected);

    let computed_at = Utc::now();
    let snapshot = risk::aggregate_risk(
        case_id,
        &findings,
        &outcome.results,
        &graph.nodes,
        computed_at,
    );
    state
        .risk_repo
        .replace_snapshot(&snapshot)
        .await
        .map_err(AppError::Internal)?;
    state
        .case_repo
        .update_risk(
            case_id,
            snapshot.total_score,
            snapshot.risk_level.as_str(),
            computed_at,
        )
        .await
        .map_err(AppError::Internal)?;
    state
        .case_repo
        .update_status(case_id, CaseStatus::Analyzed)
        .await
        .map_err(AppError::Internal)?;
    state.metrics.record_analysis();

    info!(
        case_id,
        findings = findings.len(),
        anomalies = outcome.anomalies_detected,
        total_score = snapshot.total_score,
        risk_level = snapshot.risk_level.as_str(),
        "analysis complete"
    );

    Ok(AnalysisReport {
        case_id: case_id.to_string(),
        findings: findings.len(),
        anomalies_detected: outcome.anomalies_detected,
        average_anomaly_score: outcome.average_score,
        baseline_model_used: outcome.baseline_model_used,
        graph: graph.summary,
        risk: snapshot,
    })
}
