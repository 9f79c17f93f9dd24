use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clickhouse::{Client, Row};
use serde::{Deserialize, Serialize};
use serde_json::Map;
use time::OffsetDateTime;

use backend_domain::ports::{
    AnomalyRepository, CaseRepository, EventRepository, FindingRepository, GraphRepository,
    RiskRepository,
};
use backend_domain::{
    AnomalyResult, CaseRecord, CaseRiskSnapshot, CaseStatus, GraphEdge, GraphNode, RiskLevel,
    Severity, SuspiciousFinding, UnifiedEvent,
};

use crate::utils::{chrono_to_offset, offset_to_chrono};

#[derive(Clone)]
pub struct ClickhouseRepo {
    client: Client,
    database: String,
}

impl ClickhouseRepo {
    pub fn new(client: Client, database: String) -> Self {
        Self { client, database }
    }

    async fn delete_by_case(&self, table: &str, case_id: &str) -> Result<()> {
        let query = format!("ALTER TABLE {table} DELETE WHERE case_id = '{case_id}'");
        self.client.query(&query).execute().await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Row)]
struct CaseRow {
    id: String,
    name: String,
    description: String,
    #[serde(with = "clickhouse::serde::time::datetime64::millis")]
    created_at: OffsetDateTime,
    status: String,
    records_count: u64,
    risk_score: f64,
    risk_level: String,
    #[serde(with = "clickhouse::serde::time::datetime64::millis::option")]
    last_analysis_run: Option<OffsetDateTime>,
}

impl From<&CaseRecord> for CaseRow {
    fn from(case: &CaseRecord) -> Self {
        Self {
            id: case.id.clone(),
            name: case.name.clone(),
            description: case.description.clone(),
            created_at: chrono_to_offset(case.created_at),
            status: case.status.as_str().to_string(),
            records_count: case.records_count,
            risk_score: case.risk_score,
            risk_level: case.risk_level.clone(),
            last_analysis_run: case.last_analysis_run.map(chrono_to_offset),
        }
    }
}

impl From<CaseRow> for CaseRecord {
    fn from(row: CaseRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            created_at: offset_to_chrono(row.created_at),
            status: CaseStatus::from(row.status.as_str()),
            records_count: row.records_count,
            risk_score: row.risk_score,
            risk_level: row.risk_level,
            last_analysis_run: row.last_analysis_run.map(offset_to_chrono),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Row)]
struct UnifiedEventRow {
    event_id: String,
    case_id: String,
    event_type: String,
    user_id: String,
    #[serde(with = "clickhouse::serde::time::datetime64::millis")]
    timestamp: OffsetDateTime,
    source: String,
    amount: Option<f64>,
    receiver: Option<String>,
    metadata: String,
    is_valid: u8,
    validation_errors: String,
}

impl From<&UnifiedEvent> for UnifiedEventRow {
    fn from(event: &UnifiedEvent) -> Self {
        Self {
            event_id: event.event_id.clone(),
            case_id: event.case_id.clone(),
            event_type: event.event_type.clone(),
            user_id: event.user_id.clone(),
            timestamp: chrono_to_offset(event.timestamp),
            source: event.source.clone(),
            amount: event.amount,
            receiver: event.receiver.clone(),
            metadata: serde_json::Value::Object(event.metadata.clone()).to_string(),
            is_valid: u8::from(event.is_valid),
            validation_errors: serde_json::to_string(&event.validation_errors)
                .unwrap_or_else(|_| "[]".to_string()),
        }
    }
}

impl From<UnifiedEventRow> for UnifiedEvent {
    fn from(row: UnifiedEventRow) -> Self {
        let metadata = serde_json::from_str::<serde_json::Value>(&row.metadata)
            .ok()
            .and_then(|value| match value {
                serde_json::Value::Object(map) => Some(map),
                _ => None,
            })
            .unwrap_or_else(Map::new);
        let validation_errors =
            serde_json::from_str(&row.validation_errors).unwrap_or_default();
        Self {
            event_id: row.event_id,
            case_id: row.case_id,
            event_type: row.event_type,
            user_id: row.user_id,
            timestamp: offset_to_chrono(row.timestamp),
            source: row.source,
            amount: row.amount,
            receiver: row.receiver,
            metadata,
            is_valid: row.is_valid != 0,
            validation_errors,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Row)]
struct FindingRow {
    id: String,
    case_id: String,
    event_id: String,
    rule_type: String,
    severity: String,
    score_contribution: f64,
    description: String,
    #[serde(with = "clickhouse::serde::time::datetime64::millis")]
    detected_at: OffsetDateTime,
}

impl From<&SuspiciousFinding> for FindingRow {
    fn from(finding: &SuspiciousFinding) -> Self {
        Self {
            id: finding.id.clone(),
            case_id: finding.case_id.clone(),
            event_id: finding.event_id.clone(),
            rule_type: finding.rule_type.clone(),
            severity: finding.severity.as_str().to_string(),
            score_contribution: finding.score_contribution,
            description: finding.description.clone(),
            detected_at: chrono_to_offset(finding.detected_at),
        }
    }
}

impl From<FindingRow> for SuspiciousFinding {
    fn from(row: FindingRow) -> Self {
        Self {
            id: row.id,
            case_id: row.case_id,
            event_id: row.event_id,
            rule_type: row.rule_type,
            severity: Severity::from(row.severity.as_str()),
            score_contribution: row.score_contribution,
            description: row.description,
            detected_at: offset_to_chrono(row.detected_at),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Row)]
struct AnomalyRow {
    id: String,
    case_id: String,
    event_id: String,
    anomaly_score: f64,
    is_anomaly: u8,
    model_version: String,
    baseline_model_used: u8,
    feature_snapshot: String,
    #[serde(with = "clickhouse::serde::time::datetime64::millis")]
    detected_at: OffsetDateTime,
}

impl From<&AnomalyResult> for AnomalyRow {
    fn from(result: &AnomalyResult) -> Self {
        Self {
            id: result.id.clone(),
            case_id: result.case_id.clone(),
            event_id: result.event_id.clone(),
            anomaly_score: result.anomaly_score,
            is_anomaly: u8::from(result.is_anomaly),
            model_version: result.model_version.clone(),
            baseline_model_used: u8::from(result.baseline_model_used),
            feature_snapshot: result.feature_snapshot.clone(),
            detected_at: chrono_to_offset(result.detected_at),
        }
    }
}

impl From<AnomalyRow> for AnomalyResult {
    fn from(row: AnomalyRow) -> Self {
        Self {
            id: row.id,
            case_id: row.case_id,
            event_id: row.event_id,
            anomaly_score: row.anomaly_score,
            is_anomaly: row.is_anomaly != 0,
            model_version: row.model_version,
            baseline_model_used: row.baseline_model_used != 0,
            feature_snapshot: row.feature_snapshot,
            detected_at: offset_to_chrono(row.detected_at),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Row)]
struct GraphNodeRow {
    case_id: String,
    node_id: String,
    node_type: String,
    centrality: f64,
    label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Row)]
struct GraphEdgeRow {
    case_id: String,
    source: String,
    target: String,
    edge_type: String,
    weight: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Row)]
struct CaseRiskRow {
    case_id: String,
    total_score: f64,
    risk_level: String,
    rule_score: f64,
    anomaly_score: f64,
    graph_score: f64,
    #[serde(with = "clickhouse::serde::time::datetime64::millis")]
    computed_at: OffsetDateTime,
}

#[async_trait]
impl EventRepository for ClickhouseRepo {
    async fn ensure_schema(&self) -> Result<()> {
        let create_db = format!("CREATE DATABASE IF NOT EXISTS {}", self.database);
        self.client.query(&create_db).execute().await?;

        let create_cases = r#"
CREATE TABLE IF NOT EXISTS cases (
    id String,
    name String,
    description String,
    created_at DateTime64(3),
    status String,
    records_count UInt64,
    risk_score Float64,
    risk_level String,
    last_analysis_run Nullable(DateTime64(3))
) ENGINE = MergeTree
ORDER BY (created_at, id)
"#;
        self.client.query(create_cases).execute().await?;

        let create_events = r#"
CREATE TABLE IF NOT EXISTS unified_events (
    event_id String,
    case_id String,
    event_type String,
    user_id String,
    timestamp DateTime64(3),
    source String,
    amount Nullable(Float64),
    receiver Nullable(String),
    metadata String,
    is_valid UInt8,
    validation_errors String
) ENGINE = MergeTree
ORDER BY (case_id, timestamp, event_id)
"#;
        self.client.query(create_events).execute().await?;

        let create_findings = r#"
CREATE TABLE IF NOT EXISTS suspicious_events (
    id String,
    case_id String,
    event_id String,
    rule_type String,
    severity String,
    score_contribution Float64,
    description String,
    detected_at DateTime64(3)
) ENGINE = MergeTree
ORDER BY (case_id, detected_at, id)
"#;
        self.client.query(create_findings).execute().await?;

        let create_anomalies = r#"
CREATE TABLE IF NOT EXISTS anomaly_results (
    id String,
    case_id String,
    event_id String,
    anomaly_score Float64,
    is_anomaly UInt8,
    model_version String,
    baseline_model_used UInt8,
    feature_snapshot String,
    detected_at DateTime64(3)
) ENGINE = MergeTree
ORDER BY (case_id, detected_at, id)
"#;
        self.client.query(create_anomalies).execute().await?;

        let create_nodes = r#"
CREATE TABLE IF NOT EXISTS graph_nodes (
    case_id String,
    node_id String,
    node_type String,
    centrality Float64,
    label String
) ENGINE = MergeTree
ORDER BY (case_id, node_id)
"#;
        self.client.query(create_nodes).execute().await?;

        let create_edges = r#"
CREATE TABLE IF NOT EXISTS graph_edges (
    case_id String,
    source String,
    target String,
    edge_type String,
    weight UInt64
) ENGINE = MergeTree
ORDER BY (case_id, source, target)
"#;
        self.client.query(create_edges).execute().await?;

        let create_risk = r#"
CREATE TABLE IF NOT EXISTS case_risk (
    case_id String,
    total_score Float64,
    risk_level String,
    rule_score Float64,
    anomaly_score Float64,
    graph_score Float64,
    computed_at DateTime64(3)
) ENGINE = MergeTree
ORDER BY (case_id, computed_at)
"#;
        self.client.query(create_risk).execute().await?;
        Ok(())
    }

    async fn insert_events(&self, events: &[UnifiedEvent]) -> Result<()> {
        let mut insert = self.client.insert("unified_events")?;
        for event in events {
            insert.write(&UnifiedEventRow::from(event)).await?;
        }
        insert.end().await?;
        Ok(())
    }

    async fn fetch_events(&self, case_id: &str) -> Result<Vec<UnifiedEvent>> {
        let query = format!(
            "SELECT event_id, case_id, event_type, user_id, timestamp, source, amount, receiver, metadata, is_valid, validation_errors \
             FROM unified_events WHERE case_id = '{case_id}' ORDER BY timestamp, event_id"
        );
        let rows = self
            .client
            .query(&query)
            .fetch_all::<UnifiedEventRow>()
            .await?;
        Ok(rows.into_iter().map(UnifiedEvent::from).collect())
    }

    async fn fetch_valid_events(&self, case_id: &str) -> Result<Vec<UnifiedEvent>> {
        let query = format!(
            "SELECT event_id, case_id, event_type, user_id, timestamp, source, amount, receiver, metadata, is_valid, validation_errors \
             FROM unified_events WHERE case_id = '{case_id}' AND is_valid = 1 ORDER BY timestamp, event_id"
        );
        let rows = self
            .client
            .query(&query)
            .fetch_all::<UnifiedEventRow>()
            .await?;
        Ok(rows.into_iter().map(UnifiedEvent::from).collect())
    }

    async fn ping(&self) -> Result<()> {
        self.client.query("SELECT 1").execute().await?;
        Ok(())
    }
}

#[async_trait]
impl CaseRepository for ClickhouseRepo {
    async fn insert_case(&self, case: &CaseRecord) -> Result<()> {
        let mut insert = self.client.insert("cases")?;
        insert.write(&CaseRow::from(case)).await?;
        insert.end().await?;
        Ok(())
    }

    async fn fetch_case(&self, case_id: &str) -> Result<Option<CaseRecord>> {
        let query = format!(
            "SELECT id, name, description, created_at, status, records_count, risk_score, risk_level, last_analysis_run \
             FROM cases WHERE id = '{case_id}' LIMIT 1"
        );
        let row = self.client.query(&query).fetch_optional::<CaseRow>().await?;
        Ok(row.map(CaseRecord::from))
    }

    async fn list_cases(&self) -> Result<Vec<CaseRecord>> {
        let query = "SELECT id, name, description, created_at, status, records_count, risk_score, risk_level, last_analysis_run \
             FROM cases ORDER BY created_at DESC";
        let rows = self.client.query(query).fetch_all::<CaseRow>().await?;
        Ok(rows.into_iter().map(CaseRecord::from).collect())
    }

    async fn update_status(&self, case_id: &str, status: CaseStatus) -> Result<()> {
        let query = format!(
            "ALTER TABLE cases UPDATE status = '{}' WHERE id = '{case_id}'",
            status.as_str()
        );
        self.client.query(&query).execute().await?;
        Ok(())
    }

    async fn update_records_count(&self, case_id: &str, count: u64) -> Result<()> {
        let query =
            format!("ALTER TABLE cases UPDATE records_count = {count} WHERE id = '{case_id}'");
        self.client.query(&query).execute().await?;
        Ok(())
    }

    async fn update_risk(
        &self,
        case_id: &str,
        score: f64,
        level: &str,
        run_at: DateTime<Utc>,
    ) -> Result<()> {
        let query = format!(
            "ALTER TABLE cases UPDATE risk_score = {score}, risk_level = '{level}', \
             last_analysis_run = fromUnixTimestamp64Milli({}) WHERE id = '{case_id}'",
            run_at.timestamp_millis()
        );
        self.client.query(&query).execute().await?;
        Ok(())
    }
}

#[async_trait]
impl FindingRepository for ClickhouseRepo {
    async fn replace_findings(
        &self,
        case_id: &str,
        findings: &[SuspiciousFinding],
    ) -> Result<()> {
        self.delete_by_case("suspicious_events", case_id).await?;
        let mut insert = self.client.insert("suspicious_events")?;
        for finding in findings {
            insert.write(&FindingRow::from(finding)).await?;
        }
        insert.end().await?;
        Ok(())
    }

    async fn fetch_findings(&self, case_id: &str) -> Result<Vec<SuspiciousFinding>> {
        let query = format!(
            "SELECT id, case_id, event_id, rule_type, severity, score_contribution, description, detected_at \
             FROM suspicious_events WHERE case_id = '{case_id}' ORDER BY detected_at, id"
        );
        let rows = self.client.query(&query).fetch_all::<FindingRow>().await?;
        Ok(rows.into_iter().map(SuspiciousFinding::from).collect())
    }
}

#[async_trait]
impl AnomalyRepository for ClickhouseRepo {
    async fn replace_results(&self, case_id: &str, results: &[AnomalyResult]) -> Result<()> {
        self.delete_by_case("anomaly_results", case_id).await?;
        let mut insert = self.client.insert("anomaly_results")?;
        for result in results {
            insert.write(&AnomalyRow::from(result)).await?;
        }
        insert.end().await?;
        Ok(())
    }

    async fn fetch_results(&self, case_id: &str) -> Result<Vec<AnomalyResult>> {
        let query = format!(
            "SELECT id, case_id, event_id, anomaly_score, is_anomaly, model_version, baseline_model_used, feature_snapshot, detected_at \
             FROM anomaly_results WHERE case_id = '{case_id}' ORDER BY detected_at, id"
        );
        let rows = self.client.query(&query).fetch_all::<AnomalyRow>().await?;
        Ok(rows.into_iter().map(AnomalyResult::from).collect())
    }
}

#[async_trait]
impl GraphRepository for ClickhouseRepo {
    async fn replace_graph(
        &self,
        case_id: &str,
        nodes: &[GraphNode],
        edges: &[GraphEdge],
    ) -> Result<()> {
        self.delete_by_case("graph_nodes", case_id).await?;
        self.delete_by_case("graph_edges", case_id).await?;

        let mut insert = self.client.insert("graph_nodes")?;
        for node in nodes {
            insert
                .write(&GraphNodeRow {
                    case_id: node.case_id.clone(),
                    node_id: node.node_id.clone(),
                    node_type: node.node_type.clone(),
                    centrality: node.centrality,
                    label: node.label.clone(),
                })
                .await?;
        }
        insert.end().await?;

        let mut insert = self.client.insert("graph_edges")?;
        for edge in edges {
            insert
                .write(&GraphEdgeRow {
                    case_id: edge.case_id.clone(),
                    source: edge.source.clone(),
                    target: edge.target.clone(),
                    edge_type: edge.edge_type.clone(),
                    weight: edge.weight,
                })
                .await?;
        }
        insert.end().await?;
        Ok(())
    }

    async fn fetch_nodes(&self, case_id: &str) -> Result<Vec<GraphNode>> {
        let query = format!(
            "SELECT case_id, node_id, node_type, centrality, label \
             FROM graph_nodes WHERE case_id = '{case_id}' ORDER BY centrality DESC, node_id"
        );
        let rows = self
            .client
            .query(&query)
            .fetch_all::<GraphNodeRow>()
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| GraphNode {
                case_id: row.case_id,
                node_id: row.node_id,
                node_type: row.node_type,
                centrality: row.centrality,
                label: row.label,
            })
            .collect())
    }

    async fn fetch_edges(&self, case_id: &str) -> Result<Vec<GraphEdge>> {
        let query = format!(
            "SELECT case_id, source, target, edge_type, weight \
             FROM graph_edges WHERE case_id = '{case_id}' ORDER BY source, target"
        );
        let rows = self
            .client
            .query(&query)
            .fetch_all::<GraphEdgeRow>()
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| GraphEdge {
                case_id: row.case_id,
                source: row.source,
                target: row.target,
                edge_type: row.edge_type,
                weight: row.weight,
            })
            .collect())
    }
}

#[async_trait]
impl RiskRepository for ClickhouseRepo {
    async fn replace_snapshot(&self, snapshot: &CaseRiskSnapshot) -> Result<()> {
        self.delete_by_case("case_risk", &snapshot.case_id).await?;
        let mut insert = self.client.insert("case_risk")?;
        insert
            .write(&CaseRiskRow {
                case_id: snapshot.case_id.clone(),
                total_score: snapshot.total_score,
                risk_level: snapshot.risk_level.as_str().to_string(),
                rule_score: snapshot.rule_score,
                anomaly_score: snapshot.anomaly_score,
                graph_score: snapshot.graph_score,
                computed_at: chrono_to_offset(snapshot.computed_at),
            })
            .await?;
        insert.end().await?;
        Ok(())
    }

    async fn fetch_snapshot(&self, case_id: &str) -> Result<Option<CaseRiskSnapshot>> {
        let query = format!(
            "SELECT case_id, total_score, risk_level, rule_score, anomaly_score, graph_score, computed_at \
             FROM case_risk WHERE case_id = '{case_id}' ORDER BY computed_at DESC LIMIT 1"
        );
        let row = self
            .client
            .query(&query)
            .fetch_optional::<CaseRiskRow>()
            .await?;
        Ok(row.map(|row| CaseRiskSnapshot {
            case_id: row.case_id,
            total_score: row.total_score,
            risk_level: RiskLevel::from(row.risk_level.as_str()),
            rule_score: row.rule_score,
            anomaly_score: row.anomaly_score,
            graph_score: row.graph_score,
            computed_at: offset_to_chrono(row.computed_at),
        }))
    }
}
