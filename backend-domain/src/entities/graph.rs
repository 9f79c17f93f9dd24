// Relationship graph entities

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    pub case_id: String,
    pub node_id: String,
    pub node_type: String,
    pub centrality: f64,
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdge {
    pub case_id: String,
    pub source: String,
    pub target: String,
    pub edge_type: String,
    pub weight: u64,
}

/// Aggregate view returned to the caller after a build; only the nodes and
/// edges clearing the adaptive centrality band are persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSummary {
    pub nodes: usize,
    pub edges: usize,
    pub density: f64,
    pub total_nodes: usize,
    pub threshold: f64,
}
