use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::entities::{
    AnomalyResult,
    CaseRecord,
    CaseRiskSnapshot,
    CaseStatus,
    GraphEdge,
    GraphNode,
    SuspiciousFinding,
    UnifiedEvent,
};

#[async_trait]
pub trait CaseRepository: Send + Sync {
    async fn insert_case(&self, case: &CaseRecord) -> anyhow::Result<()>;
    async fn fetch_case(&self, case_id: &str) -> anyhow::Result<Option<CaseRecord>>;
    async fn list_cases(&self) -> anyhow::Result<Vec<CaseRecord>>;
    async fn update_status(&self, case_id: &str, status: CaseStatus) -> anyhow::Result<()>;
    async fn update_records_count(&self, case_id: &str, count: u64) -> anyhow::Result<()>;
    async fn update_risk(
        &self,
        case_id: &str,
        score: f64,
        level: &str,
        run_at: DateTime<Utc>,
    ) -> anyhow::Result<()>;
}

#[async_trait]
pub trait EventRepository: Send + Sync {
    async fn ensure_schema(&self) -> anyhow::Result<()>;
    async fn insert_events(&self, events: &[UnifiedEvent]) -> anyhow::Result<()>;
    async fn fetch_events(&self, case_id: &str) -> anyhow::Result<Vec<UnifiedEvent>>;
    async fn fetch_valid_events(&self, case_id: &str) -> anyhow::Result<Vec<UnifiedEvent>>;
    async fn ping(&self) -> anyhow::Result<()>;
}

#[async_trait]
pub trait FindingRepository: Send + Sync {
    /// Clears the case's prior findings before inserting, so reruns are
    /// idempotent.
    async fn replace_findings(
        &self,
        case_id: &str,
        findings: &[SuspiciousFinding],
    ) -> anyhow::Result<()>;
    async fn fetch_findings(&self, case_id: &str) -> anyhow::Result<Vec<SuspiciousFinding>>;
}

#[async_trait]
pub trait AnomalyRepository: Send + Sync {
    async fn replace_results(
        &self,
        case_id: &str,
        results: &[AnomalyResult],
    ) -> anyhow::Result<()>;
    async fn fetch_results(&self, case_id: &str) -> anyhow::Result<Vec<AnomalyResult>>;
}

#[async_trait]
pub trait GraphRepository: Send + Sync {
    async fn replace_graph(
        &self,
        case_id: &str,
        nodes: &[GraphNode],
        edges: &[GraphEdge],
    ) -> anyhow::Result<()>;
    async fn fetch_nodes(&self, case_id: &str) -> anyhow::Result<Vec<GraphNode>>;
    async fn fetch_edges(&self, case_id: &str) -> anyhow::Result<Vec<GraphEdge>>;
}

#[async_trait]
pub trait RiskRepository: Send + Sync {
    async fn replace_snapshot(&self, snapshot: &CaseRiskSnapshot) -> anyhow::Result<()>;
    async fn fetch_snapshot(&self, case_id: &str) -> anyhow::Result<Option<CaseRiskSnapshot>>;
}
