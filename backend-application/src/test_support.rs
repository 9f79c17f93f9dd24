// In-memory port implementations for command/query tests

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex as AsyncMutex, RwLock};

use backend_domain::ports::{
    AnomalyRepository, CaseRepository, EventRepository, FindingRepository, GraphRepository,
    ModelStore, RiskRepository,
};
use backend_domain::services::BaselineModel;
use backend_domain::{
    AnomalyResult, CaseRecord, CaseRiskSnapshot, CaseStatus, GraphEdge, GraphNode, RuntimeConfig,
    SuspiciousFinding, UnifiedEvent,
};

use crate::{AppState, Metrics};

#[derive(Default)]
pub struct MemoryStore {
    cases: Mutex<HashMap<String, CaseRecord>>,
    events: Mutex<Vec<UnifiedEvent>>,
    findings: Mutex<Vec<SuspiciousFinding>>,
    anomalies: Mutex<Vec<AnomalyResult>>,
    nodes: Mutex<Vec<GraphNode>>,
    edges: Mutex<Vec<GraphEdge>>,
    snapshots: Mutex<HashMap<String, CaseRiskSnapshot>>,
    model: Mutex<Option<BaselineModel>>,
}

impl MemoryStore {
    pub fn case(&self, case_id: &str) -> CaseRecord {
        self.cases
            .lock()
            .unwrap()
            .get(case_id)
            .cloned()
            .expect("case exists")
    }

    pub fn events(&self, case_id: &str) -> Vec<UnifiedEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.case_id == case_id)
            .cloned()
            .collect()
    }

    pub fn findings(&self, case_id: &str) -> Vec<SuspiciousFinding> {
        self.findings
            .lock()
            .unwrap()
            .iter()
            .filter(|f| f.case_id == case_id)
            .cloned()
            .collect()
    }

    pub fn anomalies(&self, case_id: &str) -> Vec<AnomalyResult> {
        self.anomalies
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.case_id == case_id)
            .cloned()
            .collect()
    }

    pub fn snapshot(&self, case_id: &str) -> Option<CaseRiskSnapshot> {
        self.snapshots.lock().unwrap().get(case_id).cloned()
    }

    pub fn saved_model(&self) -> Option<BaselineModel> {
        self.model.lock().unwrap().clone()
    }
}

#[async_trait]
impl CaseRepository for MemoryStore {
    async fn insert_case(&self, case: &CaseRecord) -> anyhow::Result<()> {
        self.cases
            .lock()
            .unwrap()
            .insert(case.id.clone(), case.clone());
        Ok(())
    }

    async fn fetch_case(&self, case_id: &str) -> anyhow::Result<Option<CaseRecord>> {
        Ok(self.cases.lock().unwrap().get(case_id).cloned())
    }

    async fn list_cases(&self) -> anyhow::Result<Vec<CaseRecord>> {
        Ok(self.cases.lock().unwrap().values().cloned().collect())
    }

    async fn update_status(&self, case_id: &str, status: CaseStatus) -> anyhow::Result<()> {
        if let Some(case) = self.cases.lock().unwrap().get_mut(case_id) {
            case.status = status;
        }
        Ok(())
    }

    async fn update_records_count(&self, case_id: &str, count: u64) -> anyhow::Result<()> {
        if let Some(case) = self.cases.lock().unwrap().get_mut(case_id) {
            case.records_count = count;
        }
        Ok(())
    }

    async fn update_risk(
        &self,
        case_id: &str,
        score: f64,
        level: &str,
        run_at: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        if let Some(case) = self.cases.lock().unwrap().get_mut(case_id) {
            case.risk_score = score;
            case.risk_level = level.to_string();
            case.last_analysis_run = Some(run_at);
        }
        Ok(())
    }
}

#[async_trait]
impl EventRepository for MemoryStore {
    async fn ensure_schema(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn insert_events(&self, events: &[UnifiedEvent]) -> anyhow::Result<()> {
        self.events.lock().unwrap().extend_from_slice(events);
        Ok(())
    }

    async fn fetch_events(&self, case_id: &str) -> anyhow::Result<Vec<UnifiedEvent>> {
        Ok(self.events(case_id))
    }

    async fn fetch_valid_events(&self, case_id: &str) -> anyhow::Result<Vec<UnifiedEvent>> {
        Ok(self
            .events(case_id)
            .into_iter()
            .filter(|e| e.is_valid)
            .collect())
    }

    async fn ping(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

#[async_trait]
impl FindingRepository for MemoryStore {
    async fn replace_findings(
        &self,
        case_id: &str,
        findings: &[SuspiciousFinding],
    ) -> anyhow::Result<()> {
        let mut all = self.findings.lock().unwrap();
        all.retain(|f| f.case_id != case_id);
        all.extend_from_slice(findings);
        Ok(())
    }

    async fn fetch_findings(&self, case_id: &str) -> anyhow::Result<Vec<SuspiciousFinding>> {
        Ok(self.findings(case_id))
    }
}

#[async_trait]
impl AnomalyRepository for MemoryStore {
    async fn replace_results(
        &self,
        case_id: &str,
        results: &[AnomalyResult],
    ) -> anyhow::Result<()> {
        let mut all = self.anomalies.lock().unwrap();
        all.retain(|r| r.case_id != case_id);
        all.extend_from_slice(results);
        Ok(())
    }

    async fn fetch_results(&self, case_id: &str) -> anyhow::Result<Vec<AnomalyResult>> {
        Ok(self.anomalies(case_id))
    }
}

#[async_trait]
impl GraphRepository for MemoryStore {
    async fn replace_graph(
        &self,
        case_id: &str,
        nodes: &[GraphNode],
        edges: &[GraphEdge],
    ) -> anyhow::Result<()> {
        let mut all_nodes = self.nodes.lock().unwrap();
        all_nodes.retain(|n| n.case_id != case_id);
        all_nodes.extend_from_slice(nodes);
        let mut all_edges = self.edges.lock().unwrap();
        all_edges.retain(|e| e.case_id != case_id);
        all_edges.extend_from_slice(edges);
        Ok(())
    }

    async fn fetch_nodes(&self, case_id: &str) -> anyhow::Result<Vec<GraphNode>> {
        Ok(self
            .nodes
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.case_id == case_id)
            .cloned()
            .collect())
    }

    async fn fetch_edges(&self, case_id: &str) -> anyhow::Result<Vec<GraphEdge>> {
        Ok(self
            .edges
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.case_id == case_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl RiskRepository for MemoryStore {
    async fn replace_snapshot(&self, snapshot: &CaseRiskSnapshot) -> anyhow::Result<()> {
        self.snapshots
            .lock()
            .unwrap()
            .insert(snapshot.case_id.clone(), snapshot.clone());
        Ok(())
    }

    async fn fetch_snapshot(&self, case_id: &str) -> anyhow::Result<Option<CaseRiskSnapshot>> {
        Ok(self.snapshots.lock().unwrap().get(case_id).cloned())
    }
}

#[async_trait]
impl ModelStore for MemoryStore {
    async fn load(&self) -> anyhow::Result<Option<BaselineModel>> {
        Ok(self.model.lock().unwrap().clone())
    }

    async fn save(&self, model: &BaselineModel) -> anyhow::Result<()> {
        *self.model.lock().unwrap() = Some(model.clone());
        Ok(())
    }
}

pub fn test_state() -> (AppState, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::default());
    let state = AppState {
        config: RuntimeConfig {
            model_path: "/tmp/caseline-model.json".to_string(),
            training_dataset_path: "./training_dataset.json".to_string(),
            high_value_threshold: 10_000.0,
            burst_threshold: 10,
        },
        case_repo: store.clone(),
        event_repo: store.clone(),
        finding_repo: store.clone(),
        anomaly_repo: store.clone(),
        graph_repo: store.clone(),
        risk_repo: store.clone(),
        model_store: store.clone(),
        baseline: Arc::new(RwLock::new(None)),
        training_lock: Arc::new(AsyncMutex::new(())),
        metrics: Arc::new(Metrics::default()),
    };
    (state, store)
}
